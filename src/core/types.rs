// src/core/types.rs
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Index of a word inside the model vocabulary and its vector tables.
pub type WordId = usize;

/// A normalized comment that passed the minimum-length filter.
pub type Comment = Vec<String>;

/// Canonical rendering used for archive files, snapshot directories and glossaries.
pub const WINDOW_KEY_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Minute-resolution UTC name of a window. Orders chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WindowKey(NaiveDateTime);

impl WindowKey {
    pub fn from_timestamp(secs: i64) -> Option<Self> {
        let start = DateTime::from_timestamp(secs - secs.rem_euclid(60), 0)?;
        Some(Self(start.naive_utc()))
    }

    pub fn parse(s: &str) -> Option<Self> {
        NaiveDateTime::parse_from_str(s, WINDOW_KEY_FORMAT).ok().map(Self)
    }

    pub fn timestamp(&self) -> i64 {
        self.0.and_utc().timestamp()
    }
}

impl fmt::Display for WindowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(WINDOW_KEY_FORMAT))
    }
}

impl Serialize for WindowKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WindowKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        WindowKey::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid window key '{raw}'")))
    }
}

/// All comments whose source timestamp falls in
/// `[window_start, window_start + width)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// Epoch seconds of the first record that opened the window.
    pub window_start: i64,
    pub comments: Vec<Comment>,
}

impl Batch {
    pub fn new(window_start: i64) -> Self {
        Self { window_start, comments: Vec::new() }
    }

    /// The window's key. Stream records outside chrono's date range are
    /// rejected as malformed before they can open a window, so batches from
    /// the batcher always have an exact key; the `MIN` fallback only covers
    /// hand-built batches.
    pub fn key(&self) -> WindowKey {
        WindowKey::from_timestamp(self.window_start)
            .unwrap_or(WindowKey(NaiveDateTime::MIN))
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }
}

/// Vocabulary metadata for one retained word.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordEntry {
    pub word: String,
    /// Total occurrences seen across every vocabulary extension.
    pub count: u64,
    /// Occurrences contributed per window (keyed by window start).
    pub provenance: BTreeMap<i64, u64>,
    /// Words learned outside any window (e.g. the base model) are never pruned.
    pub pinned: bool,
}

impl WordEntry {
    pub fn new(word: &str) -> Self {
        Self {
            word: word.to_string(),
            count: 0,
            provenance: BTreeMap::new(),
            pinned: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_key_renders_canonical_minutes() {
        // 2018-01-15 12:34:56 UTC
        let key = WindowKey::from_timestamp(1_516_019_696).unwrap();
        assert_eq!(key.to_string(), "2018-01-15 12:34");
        assert_eq!(WindowKey::parse("2018-01-15 12:34"), Some(key));
        assert_eq!(key.timestamp(), 1_516_019_640);
    }

    #[test]
    fn window_keys_order_like_their_strings() {
        let a = WindowKey::parse("2018-01-15 00:00").unwrap();
        let b = WindowKey::parse("2018-01-15 12:00").unwrap();
        assert!(a < b);
        assert!(a.to_string() < b.to_string());
    }

    #[test]
    fn batch_json_shape() {
        let batch = Batch {
            window_start: 1_516_019_696,
            comments: vec![vec!["hello".into(), "world".into()]],
        };
        let json = serde_json::to_value(&batch).unwrap();
        assert_eq!(json["window_start"], 1_516_019_696);
        assert_eq!(json["comments"][0][1], "world");
    }
}

// File: src/config.rs
//! Pipeline and trainer parameters.
//!
//! Defaults mirror a twelve-hour window, a week of retention and a glossary
//! that only explains words seen more than a hundred times.

use crate::error::{Result, SlangError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Comments carrying this marker are produced by moderation bots.
pub const DEFAULT_BOT_MARKER: &str = "*[I am a bot]";

const MAX_RETENTION_YEARS: i64 = 1000;
/// Keeps `window_start - span` well inside chrono's date range.
const MAX_RETENTION_SPAN_SECS: i64 = MAX_RETENTION_YEARS * 366 * 24 * 3600;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Width of one window, in hours.
    pub window_hours: f64,
    /// Retention horizon K: the archive keeps K - 1 windows.
    pub retention_windows: usize,
    /// Comments with fewer tokens are discarded.
    pub minimum_words: usize,
    /// Unknown words must occur more often than this to be explained.
    pub min_occurrence: u64,
    pub similarity_threshold: f32,
    /// Neighbours queried and kept per glossary entry.
    pub top_n: usize,
    pub bot_marker: String,
    /// Forget the vocabulary contributed by evicted windows.
    pub prune_evicted_vocabulary: bool,
    pub storage_root: PathBuf,
    pub trainer: TrainerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_hours: 12.0,
            retention_windows: 7,
            minimum_words: 20,
            min_occurrence: 100,
            similarity_threshold: 0.6,
            top_n: 1000,
            bot_marker: DEFAULT_BOT_MARKER.to_string(),
            prune_evicted_vocabulary: false,
            storage_root: PathBuf::from("data"),
            trainer: TrainerConfig::default(),
        }
    }
}

/// Embedding hyper-parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub dimensions: usize,
    pub context_window: usize,
    /// Negative samples drawn per positive pair.
    pub negative: usize,
    pub epochs: usize,
    pub learning_rate: f32,
    pub min_learning_rate: f32,
    /// New words need this many occurrences in one extension to be retained.
    pub min_count: u64,
    /// Subsampling threshold for frequent words; 0 disables it.
    pub sample: f64,
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            dimensions: 100,
            context_window: 5,
            negative: 5,
            epochs: 5,
            learning_rate: 0.025,
            min_learning_rate: 0.0001,
            min_count: 5,
            sample: 1e-3,
            seed: 1,
        }
    }
}

impl PipelineConfig {
    /// Reads a JSON config; missing fields fall back to their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| SlangError::storage(path, e))?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Saturates for out-of-range `window_hours`; `validate` rejects those.
    pub fn window_width_secs(&self) -> i64 {
        (self.window_hours * 3600.0).round() as i64
    }

    fn checked_retention_span(&self) -> Option<i64> {
        let windows = i64::try_from(self.retention_windows).ok()?;
        windows.checked_sub(1)?.checked_mul(self.window_width_secs())
    }

    /// Seconds between a window and the one it evicts: (K - 1) * width.
    pub fn retention_span_secs(&self) -> i64 {
        self.checked_retention_span().unwrap_or(i64::MAX)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.window_hours.is_finite() || self.window_width_secs() < 60 {
            return Err(SlangError::config("window must be at least one minute wide"));
        }
        if self.retention_windows < 2 {
            return Err(SlangError::config("retention_windows must be at least 2"));
        }
        match self.checked_retention_span() {
            Some(span) if span <= MAX_RETENTION_SPAN_SECS => {}
            _ => {
                return Err(SlangError::config(format!(
                    "retention span of {} windows of {} hours exceeds {} years",
                    self.retention_windows, self.window_hours, MAX_RETENTION_YEARS
                )))
            }
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(SlangError::config("similarity_threshold must lie in [0, 1]"));
        }
        if self.top_n == 0 {
            return Err(SlangError::config("top_n must be positive"));
        }
        self.trainer.validate()
    }
}

impl TrainerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.dimensions == 0 || self.epochs == 0 || self.context_window == 0 {
            return Err(SlangError::config(
                "dimensions, epochs and context_window must be positive",
            ));
        }
        if self.learning_rate <= 0.0 || self.min_learning_rate < 0.0 {
            return Err(SlangError::config("learning rates must be positive"));
        }
        Ok(())
    }
}

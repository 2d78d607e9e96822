// File: src/batcher.rs
use crate::config::PipelineConfig;
use crate::core::tokenizer::TextProcessor;
use crate::core::types::{Batch, WindowKey};
use crate::error::{Result, SlangError};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One raw comment from the stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRecord {
    /// Epoch seconds.
    pub created_utc: i64,
    pub body: String,
}

impl StreamRecord {
    pub fn new(created_utc: i64, body: impl Into<String>) -> Self {
        Self { created_utc, body: body.into() }
    }

    /// Parses `{"created_utc": <int|float|numeric string>, "body": <string>, ...}`.
    pub fn parse_line(line: &str, line_no: usize) -> Result<Self> {
        let value: Value =
            serde_json::from_str(line).map_err(|e| SlangError::parse(line_no, e.to_string()))?;
        let created_utc = match value.get("created_utc") {
            Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().and_then(whole_seconds)),
            Some(Value::String(s)) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(whole_seconds))
            }
            _ => None,
        }
        .ok_or_else(|| SlangError::parse(line_no, "missing or invalid created_utc"))?;
        if WindowKey::from_timestamp(created_utc).is_none() {
            return Err(SlangError::parse(
                line_no,
                format!("created_utc {created_utc} is outside the representable date range"),
            ));
        }
        let body = value
            .get("body")
            .and_then(Value::as_str)
            .ok_or_else(|| SlangError::parse(line_no, "missing or invalid body"))?;
        Ok(Self::new(created_utc, body))
    }
}

/// Float timestamps are accepted only when they hold a whole number of seconds
/// that fits in an `i64`.
fn whole_seconds(f: f64) -> Option<i64> {
    // 2^63 itself is not representable, hence the strict upper bound.
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.is_finite() && f.fract() == 0.0 && in_range).then(|| f as i64)
}

/// Reads one JSON object per line.
pub struct JsonLinesSource<R> {
    lines: Lines<R>,
    line_no: usize,
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self { lines: reader.lines(), line_no: 0 }
    }
}

impl JsonLinesSource<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| SlangError::storage(path, e))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

/// Opens every file up front and yields their records in order.
pub fn stream_files(paths: &[PathBuf]) -> Result<impl Iterator<Item = Result<StreamRecord>>> {
    let sources = paths
        .iter()
        .map(|p| JsonLinesSource::<BufReader<File>>::open(p))
        .collect::<Result<Vec<_>>>()?;
    Ok(sources.into_iter().flatten())
}

impl<R: BufRead> Iterator for JsonLinesSource<R> {
    type Item = Result<StreamRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line_no += 1;
            match line {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => return Some(StreamRecord::parse_line(&line, self.line_no)),
                Err(e) => return Some(Err(SlangError::parse(self.line_no, e.to_string()))),
            }
        }
    }
}

/// Counters for records the batcher saw but did not batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatcherStats {
    pub records: usize,
    pub comments: usize,
    pub too_short: usize,
    pub bot: usize,
    pub malformed: usize,
    pub out_of_order: usize,
    pub batches: usize,
}

/// Groups a time-ordered record stream into consecutive windows.
///
/// Lazy: the next batch is only computed when asked for. A window opens at the
/// first record that does not fit the previous one, so windows are not aligned
/// to any grid and gaps in the stream produce no empty batches.
pub struct WindowedBatcher<I> {
    source: I,
    processor: TextProcessor,
    width: i64,
    minimum_words: usize,
    bot_marker: String,
    open: Option<Batch>,
    stats: BatcherStats,
}

impl<I> WindowedBatcher<I>
where
    I: Iterator<Item = Result<StreamRecord>>,
{
    pub fn new(source: I, width_secs: i64, minimum_words: usize, bot_marker: impl Into<String>) -> Self {
        Self {
            source,
            processor: TextProcessor::new(),
            width: width_secs,
            minimum_words,
            bot_marker: bot_marker.into(),
            open: None,
            stats: BatcherStats::default(),
        }
    }

    pub fn from_config(source: I, config: &PipelineConfig) -> Self {
        Self::new(
            source,
            config.window_width_secs(),
            config.minimum_words,
            config.bot_marker.clone(),
        )
    }

    pub fn stats(&self) -> &BatcherStats {
        &self.stats
    }

    fn is_bot(&self, body: &str) -> bool {
        !self.bot_marker.is_empty() && body.contains(&self.bot_marker)
    }

    /// Tokenizes and applies the length filter.
    fn admit(&mut self, body: &str) -> Option<Vec<String>> {
        let tokens = self.processor.clean_text(body);
        if tokens.len() >= self.minimum_words {
            self.stats.comments += 1;
            Some(tokens)
        } else {
            self.stats.too_short += 1;
            None
        }
    }

    /// Hands back a finished window unless every comment in it was filtered out.
    fn finish(&mut self, batch: Batch) -> Option<Batch> {
        if batch.is_empty() {
            debug!(window = %batch.key(), "skipping empty window");
            return None;
        }
        self.stats.batches += 1;
        debug!(window = %batch.key(), comments = batch.comments.len(), "window closed");
        Some(batch)
    }
}

impl<I> Iterator for WindowedBatcher<I>
where
    I: Iterator<Item = Result<StreamRecord>>,
{
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        loop {
            let record = match self.source.next() {
                Some(Ok(record)) => record,
                Some(Err(e)) => {
                    self.stats.malformed += 1;
                    warn!(error = %e, "skipping malformed record");
                    continue;
                }
                None => {
                    let last = self.open.take()?;
                    return self.finish(last);
                }
            };
            self.stats.records += 1;

            if self.is_bot(&record.body) {
                self.stats.bot += 1;
                continue;
            }

            let window_start = self.open.as_ref().map(|b| b.window_start);
            match window_start {
                Some(start) if record.created_utc < start => {
                    self.stats.out_of_order += 1;
                    warn!(
                        timestamp = record.created_utc,
                        window_start = start,
                        "rejecting out-of-order record"
                    );
                }
                Some(start)
                    if record
                        .created_utc
                        .checked_sub(start)
                        .is_some_and(|elapsed| elapsed < self.width) =>
                {
                    if let Some(tokens) = self.admit(&record.body) {
                        if let Some(open) = self.open.as_mut() {
                            open.comments.push(tokens);
                        }
                    }
                }
                _ => {
                    let mut fresh = Batch::new(record.created_utc);
                    if let Some(tokens) = self.admit(&record.body) {
                        fresh.comments.push(tokens);
                    }
                    if let Some(finished) = self.open.replace(fresh) {
                        if let Some(batch) = self.finish(finished) {
                            return Some(batch);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_BOT_MARKER;
    use std::io::Cursor;

    const HOUR: i64 = 3600;
    const T0: i64 = 1_515_974_400; // 2018-01-15 00:00 UTC

    fn ok(ts: i64, body: &str) -> Result<StreamRecord> {
        Ok(StreamRecord::new(ts, body))
    }

    fn batcher(records: Vec<Result<StreamRecord>>, min_words: usize) -> WindowedBatcher<std::vec::IntoIter<Result<StreamRecord>>> {
        WindowedBatcher::new(records.into_iter(), 12 * HOUR, min_words, DEFAULT_BOT_MARKER)
    }

    #[test]
    fn groups_records_into_half_open_windows() {
        let records = vec![
            ok(T0, "a b"),
            ok(T0 + 5 * HOUR, "c d"),
            ok(T0 + 12 * HOUR - 1, "e f"),
            ok(T0 + 12 * HOUR, "g h"),
            ok(T0 + 30 * HOUR, "i j"),
        ];
        let batches: Vec<Batch> = batcher(records, 1).collect();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].window_start, T0);
        assert_eq!(batches[0].comments.len(), 3);
        assert_eq!(batches[1].window_start, T0 + 12 * HOUR);
        assert_eq!(batches[2].window_start, T0 + 30 * HOUR);
        assert_eq!(batches[2].comments, vec![vec!["i".to_string(), "j".to_string()]]);
    }

    #[test]
    fn timestamps_stay_inside_their_window() {
        let stamps: Vec<i64> = (0..200).map(|i| T0 + i * 977).collect();
        let records = stamps.iter().map(|&t| ok(t, "word")).collect();
        let batches: Vec<Batch> = batcher(records, 1).collect();

        // Every record is admitted, so comments line up with the stamps in order.
        let mut cursor = stamps.iter();
        for pair in batches.windows(2) {
            assert!(pair[0].window_start < pair[1].window_start);
        }
        for batch in &batches {
            for _ in &batch.comments {
                let t = *cursor.next().unwrap();
                assert!(t >= batch.window_start && t < batch.window_start + 12 * HOUR);
            }
        }
    }

    #[test]
    fn short_comments_are_excluded() {
        let records = vec![ok(T0, "one two three"), ok(T0 + 1, "only two"), ok(T0 + 2, "x y z w")];
        let mut batcher = batcher(records, 3);
        let batch = batcher.next().unwrap();
        assert_eq!(batch.comments.len(), 2);
        assert!(batch.comments.iter().all(|c| c.len() >= 3));
        assert_eq!(batcher.stats().too_short, 1);
    }

    #[test]
    fn bot_comments_never_open_a_window() {
        let records = vec![
            ok(T0, "*[I am a bot] beep boop"),
            ok(T0 + 13 * HOUR, "*[I am a bot] beep boop"),
            ok(T0 + 14 * HOUR, "hello there"),
        ];
        let mut batcher = batcher(records, 1);
        let batches: Vec<Batch> = batcher.by_ref().collect();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].window_start, T0 + 14 * HOUR);
        assert_eq!(batcher.stats().bot, 2);
    }

    #[test]
    fn malformed_and_out_of_order_records_are_skipped() {
        let records = vec![
            ok(T0 + HOUR, "first words"),
            Err(SlangError::parse(2, "bad json")),
            ok(T0, "too early"),
            ok(T0 + 2 * HOUR, "second words"),
        ];
        let mut batcher = batcher(records, 1);
        let batches: Vec<Batch> = batcher.by_ref().collect();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].comments.len(), 2);
        assert_eq!(batcher.stats().malformed, 1);
        assert_eq!(batcher.stats().out_of_order, 1);
    }

    #[test]
    fn windows_without_surviving_comments_are_not_emitted() {
        let records = vec![ok(T0, "x"), ok(T0 + 13 * HOUR, "long enough words"), ok(T0 + 26 * HOUR, "y")];
        let batches: Vec<Batch> = batcher(records, 2).collect();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].window_start, T0 + 13 * HOUR);
    }

    #[test]
    fn out_of_range_timestamp_is_malformed_and_does_not_block_the_stream() {
        let input = concat!(
            r#"{"created_utc": 1515974400, "body": "a b"}"#, "\n",
            r#"{"created_utc": 1e300, "body": "c d"}"#, "\n",
            r#"{"created_utc": 1515974401, "body": "e f"}"#, "\n",
            r#"{"created_utc": 1515974402, "body": "g h"}"#, "\n",
        );
        let source = JsonLinesSource::new(Cursor::new(input));
        let mut batcher = WindowedBatcher::new(source, 12 * HOUR, 1, DEFAULT_BOT_MARKER);
        let batches: Vec<Batch> = batcher.by_ref().collect();

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].window_start, T0);
        assert_eq!(batches[0].key().to_string(), "2018-01-15 00:00");
        assert_eq!(batches[0].comments.len(), 3);
        assert_eq!(batcher.stats().malformed, 1);
        assert_eq!(batcher.stats().out_of_order, 0);
    }

    #[test]
    fn fractional_and_non_finite_timestamps_are_rejected() {
        for raw in ["1515974400.5", r#""1515974400.5""#, r#""NaN""#, r#""inf""#, "9.3e18", r#""-1e300""#] {
            let line = format!(r#"{{"created_utc": {raw}, "body": "x"}}"#);
            assert!(
                matches!(StreamRecord::parse_line(&line, 1), Err(SlangError::Parse { line: 1, .. })),
                "accepted {raw}"
            );
        }
    }

    #[test]
    fn huge_gap_after_negative_start_opens_a_new_window() {
        let records = vec![ok(-100, "a b"), ok(i64::MAX - 1, "c d")];
        let batches: Vec<Batch> = batcher(records, 1).collect();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].window_start, -100);
        assert_eq!(batches[1].window_start, i64::MAX - 1);
    }

    #[test]
    fn json_lines_accept_numeric_and_string_timestamps() {
        let input = concat!(
            r#"{"created_utc": 1515974400, "body": "a"}"#, "\n",
            "\n",
            r#"{"created_utc": "1515974401", "body": "b"}"#, "\n",
            r#"{"created_utc": 1515974402.0, "body": "c"}"#, "\n",
            r#"{"body": "no time"}"#, "\n",
            "not json\n",
        );
        let parsed: Vec<Result<StreamRecord>> = JsonLinesSource::new(Cursor::new(input)).collect();
        assert_eq!(parsed.len(), 5);
        assert_eq!(parsed[0].as_ref().unwrap(), &StreamRecord::new(T0, "a"));
        assert_eq!(parsed[1].as_ref().unwrap().created_utc, T0 + 1);
        assert_eq!(parsed[2].as_ref().unwrap().created_utc, T0 + 2);
        assert!(matches!(parsed[3], Err(SlangError::Parse { line: 5, .. })));
        assert!(matches!(parsed[4], Err(SlangError::Parse { line: 6, .. })));
    }
}

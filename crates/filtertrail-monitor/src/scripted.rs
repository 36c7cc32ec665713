// ABOUTME: A deterministic SnapshotSource that replays prepared frames, from memory or a JSON-lines feed.
// ABOUTME: Each is_alive call starts a new tick; the last frame is held once the script runs out.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::methods::{EstimateChain, FixedEstimate, SampledEstimate, StatusTextEstimate};
use crate::source::{RawFilter, SnapshotSource, SourceError};

fn default_alive() -> bool {
    true
}

/// A sample of rows taken by the sampling method: how many were visible out of how many read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSample {
    pub visible: u64,
    pub sampled: u64,
}

/// What the source looks like during one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptFrame {
    #[serde(default)]
    pub headers: BTreeMap<usize, String>,
    #[serde(default)]
    pub filters: BTreeMap<String, RawFilter>,
    /// One result per direct counting method; `null` marks a method that failed.
    #[serde(default)]
    pub estimates: Vec<Option<u64>>,
    #[serde(default)]
    pub status_text: Option<String>,
    #[serde(default)]
    pub sample: Option<RowSample>,
    #[serde(default)]
    pub total_rows: Option<u64>,
    /// An offline frame fails every read and refuses to reconnect.
    #[serde(default = "default_alive")]
    pub alive: bool,
}

impl ScriptFrame {
    pub fn new(headers: &[&str], estimates: &[u64]) -> Self {
        Self {
            headers: headers
                .iter()
                .enumerate()
                .map(|(i, name)| (i + 1, name.to_string()))
                .collect(),
            filters: BTreeMap::new(),
            estimates: estimates.iter().copied().map(Some).collect(),
            status_text: None,
            sample: None,
            total_rows: None,
            alive: true,
        }
    }

    pub fn offline() -> Self {
        Self {
            alive: false,
            ..Self::new(&[], &[])
        }
    }

    pub fn with_filter(mut self, column: &str, column_index: usize, values: &[&str]) -> Self {
        self.filters.insert(
            column.to_string(),
            RawFilter {
                values: values.iter().map(|v| v.to_string()).collect(),
                column_index,
            },
        );
        self
    }

    pub fn with_total(mut self, total_rows: u64) -> Self {
        self.total_rows = Some(total_rows);
        self
    }

    pub fn with_failed_method(mut self) -> Self {
        self.estimates.push(None);
        self
    }

    pub fn with_status_text(mut self, text: &str) -> Self {
        self.status_text = Some(text.to_string());
        self
    }

    pub fn with_sample(mut self, visible: u64, sampled: u64) -> Self {
        self.sample = Some(RowSample { visible, sampled });
        self
    }

    /// The estimation methods this frame answers for: the direct methods, then
    /// the status bar, then sampling.
    pub fn estimate_chain(&self) -> EstimateChain {
        let mut chain = EstimateChain::new();
        for (i, value) in self.estimates.iter().enumerate() {
            chain = chain.with_method(FixedEstimate::new(&format!("method {}", i + 1), *value));
        }
        if let Some(text) = &self.status_text {
            chain = chain.with_method(StatusTextEstimate::new(text));
        }
        if let Some(sample) = self.sample {
            chain = chain.with_method(SampledEstimate::new(sample.visible, sample.sampled, self.total_rows));
        }
        chain
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("feed line {line}: {source}")]
    Json {
        line: usize,
        source: serde_json::Error,
    },

    #[error("feed contains no frames")]
    Empty,
}

/// Replays frames in order.
pub struct ScriptedSource {
    label: String,
    frames: Vec<ScriptFrame>,
    /// Index of the current frame; `None` before the first tick.
    cursor: Mutex<Option<usize>>,
    reconnects: AtomicUsize,
    releases: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(frames: Vec<ScriptFrame>) -> Self {
        Self {
            label: "scripted source".to_string(),
            frames,
            cursor: Mutex::new(None),
            reconnects: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    /// Load frames from a file with one JSON object per line. Blank lines and
    /// lines starting with `#` are skipped.
    pub fn from_jsonl(path: &Path) -> Result<Self, FeedError> {
        let contents = std::fs::read_to_string(path)?;
        let mut frames = Vec::new();
        for (i, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let frame = serde_json::from_str(line).map_err(|source| FeedError::Json {
                line: i + 1,
                source,
            })?;
            frames.push(frame);
        }
        if frames.is_empty() {
            return Err(FeedError::Empty);
        }
        Ok(Self::new(frames).with_label(&path.display().to_string()))
    }

    pub fn reconnect_count(&self) -> usize {
        self.reconnects.load(Ordering::SeqCst)
    }

    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    fn current(&self) -> Option<ScriptFrame> {
        let cursor = self.cursor.lock().map(|c| *c).unwrap_or(None);
        self.frames.get(cursor.unwrap_or(0)).cloned()
    }

    fn live_frame(&self) -> Result<ScriptFrame, SourceError> {
        match self.current() {
            Some(frame) if frame.alive => Ok(frame),
            _ => Err(SourceError::Unavailable(format!("{} is offline", self.label))),
        }
    }
}

#[async_trait]
impl SnapshotSource for ScriptedSource {
    async fn read_headers(&self) -> Result<BTreeMap<usize, String>, SourceError> {
        Ok(self.live_frame()?.headers)
    }

    async fn read_filters(&self) -> Result<BTreeMap<String, RawFilter>, SourceError> {
        Ok(self.live_frame()?.filters)
    }

    async fn read_row_count_estimates(&self) -> Result<Vec<u64>, SourceError> {
        let frame = self.live_frame()?;
        Ok(frame.estimate_chain().estimates().await)
    }

    async fn is_alive(&self) -> bool {
        if let Ok(mut cursor) = self.cursor.lock() {
            let last = self.frames.len().saturating_sub(1);
            *cursor = Some(cursor.map_or(0, |i| (i + 1).min(last)));
        }
        self.current().is_some_and(|frame| frame.alive)
    }

    async fn reconnect(&self) -> Result<(), SourceError> {
        self.reconnects.fetch_add(1, Ordering::SeqCst);
        self.live_frame().map(|_| ())
    }

    async fn read_total_rows(&self) -> Result<Option<u64>, SourceError> {
        Ok(self.live_frame()?.total_rows)
    }

    async fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn frames_advance_per_tick_and_hold_the_last() {
        let source = ScriptedSource::new(vec![
            ScriptFrame::new(&["Id"], &[100]),
            ScriptFrame::new(&["Id"], &[40]),
        ]);

        assert!(source.is_alive().await);
        assert_eq!(source.read_row_count_estimates().await.unwrap(), vec![100]);
        assert!(source.is_alive().await);
        assert_eq!(source.read_row_count_estimates().await.unwrap(), vec![40]);
        assert!(source.is_alive().await);
        assert_eq!(source.read_row_count_estimates().await.unwrap(), vec![40]);
    }

    #[tokio::test]
    async fn estimates_run_through_the_method_chain() {
        let frame = ScriptFrame::new(&["Id"], &[0, 40])
            .with_failed_method()
            .with_status_text("42 of 100 records found")
            .with_sample(11, 22)
            .with_total(100);
        let source = ScriptedSource::new(vec![frame]);

        assert!(source.is_alive().await);
        assert_eq!(source.read_row_count_estimates().await.unwrap(), vec![40, 42, 50]);
    }

    #[tokio::test]
    async fn offline_frames_fail_reads_and_reconnects() {
        let source = ScriptedSource::new(vec![ScriptFrame::offline()]);
        assert!(!source.is_alive().await);
        assert!(source.read_filters().await.is_err());
        assert!(source.reconnect().await.is_err());
        assert_eq!(source.reconnect_count(), 1);
    }

    #[tokio::test]
    async fn jsonl_feed_loads_frames() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# two ticks").unwrap();
        writeln!(
            file,
            r#"{{"headers": {{"1": "Id", "2": "Region"}}, "estimates": [100], "total_rows": 100}}"#
        )
        .unwrap();
        writeln!(file).unwrap();
        writeln!(
            file,
            r#"{{"filters": {{"Region": {{"values": ["East"], "column_index": 2}}}}, "estimates": [40, null], "status_text": "41 records found"}}"#
        )
        .unwrap();

        let source = ScriptedSource::from_jsonl(file.path()).unwrap();
        assert!(source.is_alive().await);
        assert_eq!(source.read_headers().await.unwrap().len(), 2);
        assert_eq!(source.read_total_rows().await.unwrap(), Some(100));
        assert!(source.is_alive().await);
        assert_eq!(source.read_filters().await.unwrap()["Region"].column_index, 2);
        assert_eq!(source.read_row_count_estimates().await.unwrap(), vec![40, 41]);
    }

    #[test]
    fn jsonl_feed_reports_bad_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"estimates": [1]}}"#).unwrap();
        writeln!(file, "not json").unwrap();

        match ScriptedSource::from_jsonl(file.path()) {
            Err(FeedError::Json { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected a json error, got {:?}", other.err()),
        }
    }

    #[test]
    fn empty_feed_is_rejected() {
        let file = NamedTempFile::new().unwrap();
        assert!(matches!(
            ScriptedSource::from_jsonl(file.path()),
            Err(FeedError::Empty)
        ));
    }
}

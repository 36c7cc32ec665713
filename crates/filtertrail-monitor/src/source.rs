// ABOUTME: Defines the SnapshotSource trait implemented by adapters for live tabular data sources.
// ABOUTME: Also defines RawFilter (a filter as the source reports it) and SourceError.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A column filter as reported by the source, before header labelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFilter {
    pub values: Vec<String>,
    pub column_index: usize,
}

/// Errors a source can report. Any of them means "no data this tick".
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("source read failed: {0}")]
    Failed(String),

    #[error("source timed out")]
    Timeout,
}

/// Adapter over the external tabular application. Implementations translate
/// its automation protocol into plain headers, filters and row counts.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// 1-based column index to header text.
    async fn read_headers(&self) -> Result<BTreeMap<usize, String>, SourceError>;

    /// Active filters keyed by the source's column name.
    async fn read_filters(&self) -> Result<BTreeMap<String, RawFilter>, SourceError>;

    /// One estimate per measurement method that produced a value.
    async fn read_row_count_estimates(&self) -> Result<Vec<u64>, SourceError>;

    async fn is_alive(&self) -> bool;

    /// Re-establish the connection after `is_alive` reported false.
    async fn reconnect(&self) -> Result<(), SourceError> {
        Err(SourceError::Unavailable(
            "source does not support reconnecting".to_string(),
        ))
    }

    /// Total non-empty rows in the primary key column, if the source can tell.
    async fn read_total_rows(&self) -> Result<Option<u64>, SourceError> {
        Ok(None)
    }

    /// Called once when monitoring stops.
    async fn release(&self) {}

    /// Label used in status messages, e.g. the workbook and sheet name.
    fn describe(&self) -> String {
        "data source".to_string()
    }
}

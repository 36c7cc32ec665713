// ABOUTME: High-level storage manager for the filtertrail home directory layout.
// ABOUTME: Creates the trail and exports directories, opens the log store, and writes report files.

use std::fs;
use std::path::{Path, PathBuf};

use filtertrail_core::export::{build_filter_table, build_flow_graph, render_dot, render_markdown};
use filtertrail_core::state::TrailState;
use thiserror::Error;

use crate::log::{EventLogStore, atomic_write};

/// Errors that can occur during storage management operations.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store error: {0}")]
    Store(#[from] crate::log::StoreError),
}

/// Files written by [`StorageManager::write_exports`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ExportPaths {
    pub dot: PathBuf,
    pub graph_json: PathBuf,
    pub table_markdown: PathBuf,
}

/// Owns the on-disk layout: `<home>/trail/` for the log, `<home>/exports/` for reports.
#[derive(Debug, Clone)]
pub struct StorageManager {
    home: PathBuf,
}

impl StorageManager {
    /// Create the manager, creating the home, trail and exports directories.
    pub fn new(home: PathBuf) -> Result<Self, ManagerError> {
        fs::create_dir_all(home.join("trail"))?;
        fs::create_dir_all(home.join("exports"))?;
        Ok(Self { home })
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn trail_dir(&self) -> PathBuf {
        self.home.join("trail")
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.home.join("exports")
    }

    pub fn log_store(&self) -> EventLogStore {
        EventLogStore::in_dir(&self.trail_dir())
    }

    /// Write `flow.dot`, `flow.json` and `table.md` for the whole log.
    pub fn write_exports(&self, state: &TrailState) -> Result<ExportPaths, ManagerError> {
        let exports_dir = self.exports_dir();
        fs::create_dir_all(&exports_dir)?;

        let graph = build_flow_graph(&state.events, 0, &state.headers.primary_key_name());
        let table = build_filter_table(&state.events, 0);

        let paths = ExportPaths {
            dot: exports_dir.join("flow.dot"),
            graph_json: exports_dir.join("flow.json"),
            table_markdown: exports_dir.join("table.md"),
        };

        atomic_write(&paths.dot, render_dot(&graph).as_bytes())?;
        atomic_write(
            &paths.graph_json,
            serde_json::to_string_pretty(&graph)?.as_bytes(),
        )?;
        atomic_write(
            &paths.table_markdown,
            render_markdown(&table, "Filter Values by Column at Each Step").as_bytes(),
        )?;

        tracing::info!(dir = %exports_dir.display(), events = state.events.len(), "wrote report exports");
        Ok(paths)
    }
}

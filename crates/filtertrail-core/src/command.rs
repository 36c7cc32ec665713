// ABOUTME: Commands accepted by the trail actor and the outcomes it replies with.
// ABOUTME: Every mutation of the trail, from poll ticks to renames, travels through these types.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::event::FilterEvent;
use crate::relabel::StepRename;
use crate::snapshot::Snapshot;

/// A request to the trail actor.
#[derive(Debug, Clone)]
pub enum Command {
    /// First snapshot of a monitoring session.
    BeginSession { snapshot: Snapshot },
    /// A regular poll tick.
    Observe { snapshot: Snapshot },
    /// Header row re-read after a reconnect.
    RefreshHeaders { headers: BTreeMap<usize, String> },
    RenameStep {
        event_index: usize,
        new_name: String,
    },
    RenameColumn {
        original_name: String,
        new_name: String,
    },
    SetPrimaryKey { column_index: usize },
    RenamePrimaryKey { new_name: String },
    /// Persist the log if anything is unsaved.
    Save,
    Reset,
}

/// What a command did. `persisted` is false when storage failed; the change
/// is kept in memory and retried on the next save.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommandOutcome {
    Appended {
        events: Vec<FilterEvent>,
        persisted: bool,
    },
    StepRenamed {
        rename: StepRename,
        persisted: bool,
    },
    ColumnRenamed {
        original_name: String,
        new_name: String,
        occurrences: usize,
        persisted: bool,
    },
    HeadersUpdated,
    Saved { persisted: bool },
    Reset { persisted: bool },
}

impl CommandOutcome {
    pub fn persisted(&self) -> bool {
        match self {
            CommandOutcome::Appended { persisted, .. }
            | CommandOutcome::StepRenamed { persisted, .. }
            | CommandOutcome::ColumnRenamed { persisted, .. }
            | CommandOutcome::Saved { persisted }
            | CommandOutcome::Reset { persisted } => *persisted,
            CommandOutcome::HeadersUpdated => true,
        }
    }

    /// Events appended by this command, if any.
    pub fn appended(&self) -> &[FilterEvent] {
        match self {
            CommandOutcome::Appended { events, .. } => events,
            _ => &[],
        }
    }
}

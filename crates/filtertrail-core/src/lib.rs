// ABOUTME: Core library for filtertrail, containing the filter-event model and the engines built on it.
// ABOUTME: Covers row count reconciliation, filter diffing, relabeling, derived views, and the trail actor.

pub mod actor;
pub mod command;
pub mod diff;
pub mod event;
pub mod export;
pub mod headers;
pub mod persist;
pub mod reconcile;
pub mod relabel;
pub mod snapshot;
pub mod state;

pub use actor::{ActorError, TrailHandle, TrailNotice, spawn};
pub use command::{Command, CommandOutcome};
pub use diff::{CountChange, DiffOutcome, DiffThresholds, FilterDiff, detect_change, diff_filters};
pub use event::{FilterAction, FilterEntry, FilterEvent};
pub use headers::HeaderCache;
pub use persist::{LogPersistence, MemoryPersistence, PersistError};
pub use reconcile::{RowCountReconciler, reconcile};
pub use relabel::{RelabelError, StepRename};
pub use snapshot::{FilterMap, FilterPredicate, Snapshot};
pub use state::TrailState;

// ABOUTME: Persistence layer for filtertrail, storing the event log as JSON with a backup copy.
// ABOUTME: Provides atomic log writes, tolerant loading of older log shapes, and report exports.

pub mod legacy;
pub mod log;
pub mod manager;

pub use legacy::{NormalizeReport, normalize_events};
pub use log::{EventLogStore, LoadReport, LoadSource, SaveReport, StoreError};
pub use manager::{ExportPaths, ManagerError, StorageManager};

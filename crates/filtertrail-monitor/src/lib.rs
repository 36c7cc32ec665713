// ABOUTME: Monitoring runtime for filtertrail: reads snapshots from a live source on a fixed cadence.
// ABOUTME: Defines the SnapshotSource seam, row count estimation methods, and the cooperative poller.

pub mod capture;
pub mod methods;
pub mod poller;
pub mod scripted;
pub mod source;

pub use capture::capture_snapshot;
pub use methods::{EstimateChain, FixedEstimate, RowCountMethod, SampledEstimate, StatusTextEstimate};
pub use poller::{MonitorConfig, MonitorHandle, MonitorStatus, spawn_monitor};
pub use scripted::{FeedError, RowSample, ScriptFrame, ScriptedSource};
pub use source::{RawFilter, SnapshotSource, SourceError};

// ABOUTME: Shared application state for the filtertrail HTTP server.
// ABOUTME: Holds the trail actor handle, the storage manager, and the monitor status receiver.

use std::sync::Arc;

use filtertrail_core::TrailHandle;
use filtertrail_monitor::MonitorStatus;
use filtertrail_store::StorageManager;
use tokio::sync::watch;

/// Shared application state accessible by all Axum handlers.
pub struct AppState {
    pub trail: TrailHandle,
    pub storage: StorageManager,
    pub monitor_status: watch::Receiver<MonitorStatus>,
}

/// Type alias for the Arc-wrapped state used with Axum's State extractor.
pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(
        trail: TrailHandle,
        storage: StorageManager,
        monitor_status: watch::Receiver<MonitorStatus>,
    ) -> Self {
        Self {
            trail,
            storage,
            monitor_status,
        }
    }

    /// State for a server with no poller attached; status reads `Idle`.
    pub fn without_monitor(trail: TrailHandle, storage: StorageManager) -> Self {
        let (_tx, rx) = watch::channel(MonitorStatus::Idle);
        Self::new(trail, storage, rx)
    }
}

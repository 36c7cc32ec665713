// ABOUTME: The persistence seam between the trail actor and the event log store.
// ABOUTME: Defines LogPersistence and an in-memory implementation with injectable failures.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use thiserror::Error;

use crate::event::FilterEvent;

/// A save or reset that did not reach any storage location.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("persistence failed: {0}")]
pub struct PersistError(pub String);

/// Durable storage for the whole event log. Every call writes the full sequence.
pub trait LogPersistence: Send + Sync {
    fn save(&self, events: &[FilterEvent]) -> Result<(), PersistError>;
    fn reset(&self) -> Result<(), PersistError>;
}

/// Keeps the last saved log in memory. Used where no files are wanted.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    saved: Mutex<Vec<FilterEvent>>,
    failing: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent calls fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn saved(&self) -> Vec<FilterEvent> {
        self.saved
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn store(&self, events: &[FilterEvent]) -> Result<(), PersistError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PersistError("storage unavailable".to_string()));
        }
        let mut guard = self
            .saved
            .lock()
            .map_err(|_| PersistError("storage lock poisoned".to_string()))?;
        *guard = events.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl LogPersistence for MemoryPersistence {
    fn save(&self, events: &[FilterEvent]) -> Result<(), PersistError> {
        self.store(events)
    }

    fn reset(&self) -> Result<(), PersistError> {
        self.store(&[])
    }
}

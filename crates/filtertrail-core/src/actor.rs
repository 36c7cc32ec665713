// ABOUTME: Async actor that is the single writer of the filter trail, driven over tokio channels.
// ABOUTME: Provides TrailHandle for sending commands, subscribing to notices, and reading state.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{RwLock, broadcast, mpsc, oneshot};

use crate::command::{Command, CommandOutcome};
use crate::event::FilterEvent;
use crate::persist::LogPersistence;
use crate::relabel::RelabelError;
use crate::state::TrailState;

/// Errors returned to callers of the trail actor.
#[derive(Debug, Error)]
pub enum ActorError {
    #[error(transparent)]
    Relabel(#[from] RelabelError),

    #[error("unknown primary key column: {0}")]
    InvalidPrimaryKey(usize),

    #[error("actor channel closed")]
    ChannelClosed,
}

/// Broadcast to subscribers after each mutation of the trail.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrailNotice {
    Appended {
        event_index: usize,
        event: FilterEvent,
    },
    StepRenamed {
        event_index: usize,
        original_name: String,
        new_name: String,
    },
    ColumnRenamed {
        original_name: String,
        new_name: String,
        occurrences: usize,
    },
    HeadersChanged,
    Reset,
}

type CommandMessage = (Command, oneshot::Sender<Result<CommandOutcome, ActorError>>);

/// Public handle for interacting with the trail actor. Cheap to clone.
#[derive(Clone)]
pub struct TrailHandle {
    cmd_tx: mpsc::Sender<CommandMessage>,
    notice_tx: broadcast::Sender<TrailNotice>,
    state: Arc<RwLock<TrailState>>,
}

impl TrailHandle {
    /// Send a command to the actor and await its outcome.
    pub async fn send_command(&self, cmd: Command) -> Result<CommandOutcome, ActorError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send((cmd, tx))
            .await
            .map_err(|_| ActorError::ChannelClosed)?;
        rx.await.map_err(|_| ActorError::ChannelClosed)?
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrailNotice> {
        self.notice_tx.subscribe()
    }

    /// Shared read access to the trail state.
    pub async fn read_state(&self) -> tokio::sync::RwLockReadGuard<'_, TrailState> {
        self.state.read().await
    }
}

/// Spawn the trail actor. Commands are processed one at a time, so appends,
/// renames and resets never interleave.
pub fn spawn(initial_state: TrailState, persistence: Arc<dyn LogPersistence>) -> TrailHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel::<CommandMessage>(64);
    let (notice_tx, _) = broadcast::channel::<TrailNotice>(256);
    let state = Arc::new(RwLock::new(initial_state));

    let handle = TrailHandle {
        cmd_tx,
        notice_tx: notice_tx.clone(),
        state: Arc::clone(&state),
    };

    let actor = TrailActor {
        state,
        cmd_rx,
        notice_tx,
        persistence,
        dirty: false,
    };
    tokio::spawn(actor.run());

    handle
}

struct TrailActor {
    state: Arc<RwLock<TrailState>>,
    cmd_rx: mpsc::Receiver<CommandMessage>,
    notice_tx: broadcast::Sender<TrailNotice>,
    persistence: Arc<dyn LogPersistence>,
    /// Set when the in-memory log differs from what storage last accepted.
    dirty: bool,
}

impl TrailActor {
    async fn run(mut self) {
        while let Some((cmd, reply_tx)) = self.cmd_rx.recv().await {
            let result = self.process_command(cmd).await;
            let _ = reply_tx.send(result);
        }
        tracing::debug!("trail actor stopped");
    }

    async fn process_command(&mut self, cmd: Command) -> Result<CommandOutcome, ActorError> {
        let now = Utc::now();
        let mut notices = Vec::new();

        let outcome = match cmd {
            Command::BeginSession { snapshot } => {
                let mut state = self.state.write().await;
                let offset = state.events.len();
                let events = state.begin_session(&snapshot, now);
                notices.extend(appended_notices(offset, &events));
                let persisted =
                    persist_log(&*self.persistence, &mut self.dirty, !events.is_empty(), &state.events);
                CommandOutcome::Appended { events, persisted }
            }
            Command::Observe { snapshot } => {
                let mut state = self.state.write().await;
                let offset = state.events.len();
                let events = state.observe(&snapshot, now);
                notices.extend(appended_notices(offset, &events));
                let persisted =
                    persist_log(&*self.persistence, &mut self.dirty, !events.is_empty(), &state.events);
                CommandOutcome::Appended { events, persisted }
            }
            Command::RefreshHeaders { headers } => {
                let mut state = self.state.write().await;
                state.refresh_headers(&headers);
                notices.push(TrailNotice::HeadersChanged);
                CommandOutcome::HeadersUpdated
            }
            Command::RenameStep {
                event_index,
                new_name,
            } => {
                let mut state = self.state.write().await;
                let rename = state.rename_step(event_index, &new_name)?;
                let persisted =
                    persist_log(&*self.persistence, &mut self.dirty, true, &state.events);
                notices.push(TrailNotice::StepRenamed {
                    event_index,
                    original_name: rename.original_name.clone(),
                    new_name: rename.new_name.clone(),
                });
                tracing::info!(
                    event_index,
                    from = %rename.original_name,
                    to = %rename.new_name,
                    "renamed step"
                );
                CommandOutcome::StepRenamed { rename, persisted }
            }
            Command::RenameColumn {
                original_name,
                new_name,
            } => {
                let mut state = self.state.write().await;
                let occurrences = state.rename_column(&original_name, &new_name)?;
                let persisted =
                    persist_log(&*self.persistence, &mut self.dirty, true, &state.events);
                let new_name = new_name.trim().to_string();
                notices.push(TrailNotice::ColumnRenamed {
                    original_name: original_name.clone(),
                    new_name: new_name.clone(),
                    occurrences,
                });
                tracing::info!(from = %original_name, to = %new_name, occurrences, "renamed column");
                CommandOutcome::ColumnRenamed {
                    original_name,
                    new_name,
                    occurrences,
                    persisted,
                }
            }
            Command::SetPrimaryKey { column_index } => {
                let mut state = self.state.write().await;
                if !state.headers.set_primary_key(column_index) {
                    return Err(ActorError::InvalidPrimaryKey(column_index));
                }
                notices.push(TrailNotice::HeadersChanged);
                CommandOutcome::HeadersUpdated
            }
            Command::RenamePrimaryKey { new_name } => {
                let new_name = new_name.trim();
                if new_name.is_empty() {
                    return Err(RelabelError::EmptyName.into());
                }
                let mut state = self.state.write().await;
                state.headers.rename_primary_key(new_name);
                notices.push(TrailNotice::HeadersChanged);
                CommandOutcome::HeadersUpdated
            }
            Command::Save => {
                let state = self.state.read().await;
                let persisted =
                    persist_log(&*self.persistence, &mut self.dirty, false, &state.events);
                CommandOutcome::Saved { persisted }
            }
            Command::Reset => {
                let mut state = self.state.write().await;
                state.reset();
                let persisted = match self.persistence.reset() {
                    Ok(()) => {
                        self.dirty = false;
                        true
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to reset stored trail");
                        self.dirty = true;
                        false
                    }
                };
                notices.push(TrailNotice::Reset);
                tracing::info!("filter trail reset");
                CommandOutcome::Reset { persisted }
            }
        };

        for notice in notices {
            let _ = self.notice_tx.send(notice);
        }

        Ok(outcome)
    }
}

/// Write the whole log when `changed` or when an earlier write failed.
/// Returns whether storage now reflects memory.
fn persist_log(
    persistence: &dyn LogPersistence,
    dirty: &mut bool,
    changed: bool,
    events: &[FilterEvent],
) -> bool {
    if changed {
        *dirty = true;
    }
    if !*dirty {
        return true;
    }
    match persistence.save(events) {
        Ok(()) => {
            *dirty = false;
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, events = events.len(), "failed to persist filter trail");
            false
        }
    }
}

fn appended_notices(offset: usize, events: &[FilterEvent]) -> impl Iterator<Item = TrailNotice> + '_ {
    events
        .iter()
        .enumerate()
        .map(move |(i, event)| TrailNotice::Appended {
            event_index: offset + i,
            event: event.clone(),
        })
}

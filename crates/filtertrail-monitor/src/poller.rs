// ABOUTME: Background poller that captures a snapshot every tick and feeds it to the trail actor.
// ABOUTME: Publishes its status over a watch channel and stops cooperatively with a final save.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use filtertrail_core::actor::{ActorError, TrailHandle};
use filtertrail_core::command::Command;
use filtertrail_core::headers::DEFAULT_MAX_COLUMNS;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::capture::capture_snapshot;
use crate::source::SnapshotSource;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);
pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    pub save_interval: Duration,
    pub max_columns: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            save_interval: DEFAULT_SAVE_INTERVAL,
            max_columns: DEFAULT_MAX_COLUMNS,
        }
    }
}

/// The poller's latest state, suitable for a status line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MonitorStatus {
    /// No monitor has been started.
    Idle,
    Starting {
        source: String,
    },
    Monitoring {
        source: String,
        ticks: u64,
        events_appended: usize,
        last_tick: DateTime<Utc>,
    },
    /// The last tick produced no data.
    Skipped {
        source: String,
        reason: String,
    },
    Stopped,
}

impl MonitorStatus {
    pub fn message(&self) -> String {
        match self {
            MonitorStatus::Idle => "Not monitoring".to_string(),
            MonitorStatus::Starting { source } => format!("Connecting to {}...", source),
            MonitorStatus::Monitoring {
                source,
                events_appended,
                ..
            } => format!(
                "Monitoring {} ({} change(s) recorded)",
                source, events_appended
            ),
            MonitorStatus::Skipped { source, reason } => format!("{}: {}", source, reason),
            MonitorStatus::Stopped => "Monitoring stopped".to_string(),
        }
    }
}

/// Controls a running poller.
pub struct MonitorHandle {
    stop_tx: watch::Sender<bool>,
    status_rx: watch::Receiver<MonitorStatus>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn status(&self) -> MonitorStatus {
        self.status_rx.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<MonitorStatus> {
        self.status_rx.clone()
    }

    /// Signal the poller to stop and wait for its final save.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "monitor task failed");
        }
    }
}

/// Start polling `source` into the trail.
pub fn spawn_monitor(
    source: Arc<dyn SnapshotSource>,
    trail: TrailHandle,
    config: MonitorConfig,
) -> MonitorHandle {
    let (stop_tx, stop_rx) = watch::channel(false);
    let (status_tx, status_rx) = watch::channel(MonitorStatus::Starting {
        source: source.describe(),
    });

    let poller = Poller {
        source,
        trail,
        config,
        stop_rx,
        status_tx,
        session_started: false,
        connected: true,
        ticks: 0,
        events_appended: 0,
    };
    let task = tokio::spawn(poller.run());

    MonitorHandle {
        stop_tx,
        status_rx,
        task,
    }
}

/// What a tick asks of the loop.
enum TickFlow {
    Continue,
    /// The trail actor is gone; nothing more can be recorded.
    Halt,
}

struct Poller {
    source: Arc<dyn SnapshotSource>,
    trail: TrailHandle,
    config: MonitorConfig,
    stop_rx: watch::Receiver<bool>,
    status_tx: watch::Sender<MonitorStatus>,
    session_started: bool,
    connected: bool,
    ticks: u64,
    events_appended: usize,
}

impl Poller {
    async fn run(mut self) {
        let source = self.source.describe();
        tracing::info!(source = %source, "monitoring started");

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_save = Instant::now();

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = self.stop_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            if *self.stop_rx.borrow() {
                break;
            }

            if let TickFlow::Halt = self.tick().await {
                break;
            }

            if last_save.elapsed() >= self.config.save_interval {
                self.save().await;
                last_save = Instant::now();
            }
        }

        self.save().await;
        self.source.release().await;
        let _ = self.status_tx.send(MonitorStatus::Stopped);
        tracing::info!(source = %source, ticks = self.ticks, "monitoring stopped");
    }

    async fn tick(&mut self) -> TickFlow {
        if !self.source.is_alive().await {
            if let Err(e) = self.source.reconnect().await {
                self.connected = false;
                self.skip(format!("disconnected: {}", e));
                return TickFlow::Continue;
            }
            tracing::info!(source = %self.source.describe(), "reconnected to source");
            self.connected = true;
            if let TickFlow::Halt = self.refresh_headers().await {
                return TickFlow::Halt;
            }
        } else if !self.connected {
            self.connected = true;
            if let TickFlow::Halt = self.refresh_headers().await {
                return TickFlow::Halt;
            }
        }

        let snapshot = match capture_snapshot(&*self.source, self.config.max_columns).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.skip(e.to_string());
                return TickFlow::Continue;
            }
        };
        tracing::debug!(
            filters = snapshot.filters.len(),
            estimates = ?snapshot.row_count_estimates,
            "captured snapshot"
        );

        let cmd = if self.session_started {
            Command::Observe { snapshot }
        } else {
            Command::BeginSession { snapshot }
        };

        match self.trail.send_command(cmd).await {
            Ok(outcome) => {
                self.session_started = true;
                self.ticks += 1;
                self.events_appended += outcome.appended().len();
                let _ = self.status_tx.send(MonitorStatus::Monitoring {
                    source: self.source.describe(),
                    ticks: self.ticks,
                    events_appended: self.events_appended,
                    last_tick: Utc::now(),
                });
                TickFlow::Continue
            }
            Err(ActorError::ChannelClosed) => {
                tracing::error!("trail actor is gone, stopping monitor");
                TickFlow::Halt
            }
            Err(e) => {
                self.skip(e.to_string());
                TickFlow::Continue
            }
        }
    }

    async fn refresh_headers(&mut self) -> TickFlow {
        let headers = match self.source.read_headers().await {
            Ok(headers) => headers,
            Err(e) => {
                tracing::warn!(error = %e, "could not re-read headers");
                return TickFlow::Continue;
            }
        };
        match self.trail.send_command(Command::RefreshHeaders { headers }).await {
            Err(ActorError::ChannelClosed) => TickFlow::Halt,
            _ => TickFlow::Continue,
        }
    }

    async fn save(&self) {
        match self.trail.send_command(Command::Save).await {
            Ok(outcome) if !outcome.persisted() => {
                tracing::warn!("periodic save did not reach storage");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "periodic save failed"),
        }
    }

    fn skip(&self, reason: String) {
        tracing::debug!(reason = %reason, "skipping tick");
        let _ = self.status_tx.send(MonitorStatus::Skipped {
            source: self.source.describe(),
            reason,
        });
    }
}

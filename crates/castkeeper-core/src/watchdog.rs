//! Liveness watchdog: one instance per direction (worker watches dashboard,
//! dashboard watches worker).
//!
//! A peer is restarted only when all of these hold:
//! - no process with the peer's marker is running,
//! - its heartbeat is stale or missing,
//! - its last declared state is not `planned_exit`.
//!
//! After a restart the watchdog waits for a newer heartbeat (or one staleness
//! threshold) before it would restart again, so consecutive ticks never spawn
//! duplicates.

use crate::heartbeat::{
    classify_liveness, HeartbeatPublisher, HeartbeatStore, LifecycleState, Liveness, ProcessRole,
};
use crate::process::ProcessRegistry;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use std::thread::JoinHandle;

/// What a single tick observed or did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    Healthy,
    /// Heartbeat stale or missing but the process exists; left alone.
    AliveButStale,
    /// Peer declared `planned_exit`; never restarted.
    CleanExit,
    /// A restart was issued recently and the peer has not reported yet.
    RestartPending,
    Restarted { killed: usize, pid: u32 },
    RestartFailed(String),
}

#[derive(Debug, Clone)]
struct PendingRestart {
    issued_at: DateTime<Utc>,
    last_seen: Option<DateTime<Utc>>,
}

pub struct Watchdog {
    peer: ProcessRole,
    marker: String,
    command: Vec<String>,
    threshold: Duration,
    interval: std::time::Duration,
    store: HeartbeatStore,
    registry: Arc<dyn ProcessRegistry>,
    pending: Option<PendingRestart>,
}

impl Watchdog {
    pub fn new(
        peer: ProcessRole,
        marker: impl Into<String>,
        command: Vec<String>,
        store: HeartbeatStore,
        registry: Arc<dyn ProcessRegistry>,
    ) -> Self {
        Self {
            peer,
            marker: marker.into(),
            command,
            threshold: Duration::seconds(90),
            interval: std::time::Duration::from_secs(30),
            store,
            registry,
            pending: None,
        }
    }

    pub fn with_threshold(mut self, threshold: Duration) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_interval(mut self, interval: std::time::Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn tick(&mut self, now: DateTime<Utc>) -> WatchOutcome {
        let record = self.store.read(self.peer);
        let liveness = classify_liveness(record.as_ref(), self.threshold, now);
        let running = self.registry.is_running(&self.marker);

        if let Some(pending) = &self.pending {
            let reported = match (&record, pending.last_seen) {
                (Some(r), Some(seen)) => r.timestamp > seen,
                (Some(_), None) => true,
                (None, _) => false,
            };
            if reported || now - pending.issued_at >= self.threshold {
                self.pending = None;
            }
        }

        if running {
            return if liveness == Liveness::Healthy {
                WatchOutcome::Healthy
            } else {
                WatchOutcome::AliveButStale
            };
        }
        if liveness == Liveness::Healthy {
            return WatchOutcome::Healthy;
        }
        if record
            .as_ref()
            .is_some_and(|r| r.state == LifecycleState::PlannedExit)
        {
            return WatchOutcome::CleanExit;
        }
        if self.pending.is_some() {
            return WatchOutcome::RestartPending;
        }

        tracing::warn!(
            peer = %self.peer,
            liveness = ?liveness,
            "peer crashed: not running and heartbeat {}",
            if liveness == Liveness::Unknown { "missing" } else { "stale" }
        );
        let killed = self.registry.terminate_all(&self.marker);
        match self.registry.spawn(&self.command) {
            Ok(pid) => {
                self.pending = Some(PendingRestart {
                    issued_at: now,
                    last_seen: record.map(|r| r.timestamp),
                });
                tracing::info!(peer = %self.peer, pid, killed, "peer restarted");
                WatchOutcome::Restarted { killed, pid }
            }
            Err(e) => {
                tracing::error!(peer = %self.peer, error = %e, "peer restart failed");
                WatchOutcome::RestartFailed(e.to_string())
            }
        }
    }

    /// Run forever on a named thread. `own` is this process's heartbeat,
    /// refreshed on every tick.
    pub fn spawn(mut self, own: Option<Arc<HeartbeatPublisher>>) -> std::io::Result<JoinHandle<()>> {
        let name = format!("watchdog-{}", self.peer);
        std::thread::Builder::new().name(name).spawn(move || loop {
            if let Some(publisher) = &own {
                if let Err(e) = publisher.beat() {
                    tracing::warn!(role = %publisher.role(), error = %e, "heartbeat write failed");
                }
            }
            let outcome = self.tick(Utc::now());
            tracing::debug!(peer = %self.peer, ?outcome, "watchdog tick");
            std::thread::sleep(self.interval);
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

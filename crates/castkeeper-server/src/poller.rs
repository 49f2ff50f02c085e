//! Background status loop. Runs on its own thread because every input it
//! reads (production tool, hosting service, chat) is a blocking call.

use crate::state::SharedView;
use castkeeper_core::broadcast::{ScheduleStore, ScheduledBroadcast};
use castkeeper_core::clock::Clock;
use castkeeper_core::config::Config;
use castkeeper_core::heartbeat::{ExitFlag, HeartbeatStore, ProcessRole};
use castkeeper_core::notify::RemoteSignalSource;
use castkeeper_core::production::{ProductionTool, SceneProbe};
use castkeeper_core::status::{StatusEngine, StatusSettings, StatusView, WorkerView};
use castkeeper_core::youtube::LifecycleStatusSource;
use chrono::{Duration, Utc};
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;

/// External collaborators the poller reads from.
pub struct Sources {
    pub clock: Arc<dyn Clock>,
    pub tool: Arc<dyn ProductionTool>,
    pub status: Arc<dyn LifecycleStatusSource>,
    pub remote: Arc<dyn RemoteSignalSource>,
}

pub struct Poller {
    engine: StatusEngine,
    probe: SceneProbe,
    clock: Arc<dyn Clock>,
    status: Arc<dyn LifecycleStatusSource>,
    remote: Arc<dyn RemoteSignalSource>,
    schedule: ScheduleStore,
    heartbeats: HeartbeatStore,
    exit_flag: ExitFlag,
    staleness: Duration,
    lookahead: Duration,
    interval: std::time::Duration,
    view: SharedView,
}

impl Poller {
    pub fn new(config: &Config, root: &Path, sources: Sources, view: SharedView) -> Self {
        Self {
            engine: StatusEngine::new(StatusSettings::from_config(&config.dashboard, &config.obs)),
            probe: SceneProbe::new(sources.tool),
            clock: sources.clock,
            status: sources.status,
            remote: sources.remote,
            schedule: ScheduleStore::new(config.data_dir(root)),
            heartbeats: HeartbeatStore::new(config.status_dir(root)),
            exit_flag: ExitFlag::new(&config.flags_dir(root)),
            staleness: config.heartbeat.staleness(),
            lookahead: castkeeper_core::config::span_hours(config.dashboard.lookahead_hours),
            interval: std::time::Duration::from_secs(config.dashboard.poll_interval_seconds.max(1)),
            view,
        }
    }

    fn schedule_window(&self) -> Vec<ScheduledBroadcast> {
        let now = self.clock.now();
        // Yesterday onwards, so a broadcast running past midnight stays visible.
        match self
            .schedule
            .between(now - Duration::days(1), now + self.lookahead)
        {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(error = %e, "could not load schedule");
                Vec::new()
            }
        }
    }

    /// Compute one view and publish it.
    pub fn tick(&mut self) -> StatusView {
        let schedule = self.schedule_window();
        let scene = self.probe.current_scene();
        let remote = self.remote.latest();
        let now = self.clock.now();

        let mut view = self.engine.evaluate(
            now,
            &schedule,
            scene.as_deref(),
            self.status.as_ref(),
            remote,
        );
        let worker = self.heartbeats.read(ProcessRole::Worker);
        view.worker = Some(WorkerView::from_heartbeat(
            worker.as_ref(),
            self.exit_flag.is_set(),
            self.staleness,
            Utc::now(),
        ));

        *self.view.write().unwrap_or_else(|e| e.into_inner()) = view.clone();
        view
    }

    pub fn spawn(mut self) -> std::io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("status-poller".into())
            .spawn(move || loop {
                let view = self.tick();
                tracing::debug!(status = %view.text, confirmed = view.confirmed, "status updated");
                self.clock.sleep(self.interval);
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

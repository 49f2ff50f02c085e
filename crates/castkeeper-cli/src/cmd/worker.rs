use crate::services;
use anyhow::Context;
use castkeeper_core::broadcast::ScheduleStore;
use castkeeper_core::clock::SystemClock;
use castkeeper_core::heartbeat::{ExitFlag, ProcessRole};
use castkeeper_core::process::InstanceLock;
use castkeeper_core::worker::Worker;
use std::path::Path;
use std::time::Duration;

pub fn run(root: &Path, no_watchdog: bool) -> anyhow::Result<()> {
    let config = services::load_runtime_config(root)?;
    let lock = InstanceLock::acquire(config.worker.lock_port)?;
    tracing::debug!(port = lock.port(), "worker instance lock held");

    let (notifications, _) = services::telegram(&config, root);
    let result = (|| {
        let publisher = services::publisher(&config, root, ProcessRole::Worker);
        if no_watchdog {
            let interval = Duration::from_secs(config.heartbeat.worker_watch_interval_seconds.max(1));
            services::spawn_heartbeat(publisher.clone(), interval)?;
        } else {
            services::watchdog(&config, root, ProcessRole::Dashboard)
                .spawn(Some(publisher.clone()))
                .context("failed to start dashboard watchdog")?;
        }

        let tool = services::production_tool(&config, root)?;
        let schedule = ScheduleStore::new(config.data_dir(root));
        let exit_flag = ExitFlag::new(&config.flags_dir(root));
        let summary = Worker::new(
            &config,
            &SystemClock,
            &tool,
            &schedule,
            &publisher,
            &exit_flag,
            &notifications,
        )
        .run_day();

        tracing::info!(
            executed = summary.executed_count(),
            delays = summary.delays.len(),
            "worker done"
        );
        Ok::<_, anyhow::Error>(())
    })();

    if let Err(e) = &result {
        notifications.error(&format!("#Error\nworker stopped: {e:#}"));
    }
    result
}

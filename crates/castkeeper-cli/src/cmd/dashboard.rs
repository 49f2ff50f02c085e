use crate::services;
use anyhow::Context;
use castkeeper_core::clock::SystemClock;
use castkeeper_core::heartbeat::{LifecycleState, ProcessRole};
use castkeeper_server::poller::{Poller, Sources};
use castkeeper_server::state::AppState;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub fn run(root: &Path, port: Option<u16>, no_watchdog: bool) -> anyhow::Result<()> {
    let config = services::load_runtime_config(root)?;
    let (notifications, remote) = services::telegram(&config, root);

    let result = (|| {
        let publisher = services::publisher(&config, root, ProcessRole::Dashboard);
        publisher
            .declare(LifecycleState::Active, None)
            .context("failed to write dashboard heartbeat")?;
        if no_watchdog {
            let interval =
                Duration::from_secs(config.heartbeat.dashboard_watch_interval_seconds.max(1));
            services::spawn_heartbeat(publisher.clone(), interval)?;
        } else {
            services::watchdog(&config, root, ProcessRole::Worker)
                .spawn(Some(publisher.clone()))
                .context("failed to start worker watchdog")?;
        }

        // Blocking clients are built here, before the runtime exists, and
        // live on the poller thread from then on.
        let sources = Sources {
            clock: Arc::new(SystemClock),
            tool: Arc::new(services::production_tool(&config, root)?),
            status: services::lifecycle_source(&config, root),
            remote,
        };
        let state = AppState::new(root, config.clone());
        Poller::new(&config, root, sources, state.view.clone())
            .spawn()
            .context("failed to start status poller")?;

        let bind = config.dashboard.bind.clone();
        let port = port.unwrap_or(config.dashboard.port);
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::bind((bind.as_str(), port))
                .await
                .with_context(|| format!("failed to bind {bind}:{port}"))?;
            castkeeper_server::serve_on(state, listener, async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("shutdown requested");
            })
            .await
        })?;

        // A deliberate stop: the worker's watchdog must not revive us.
        publisher
            .declare(LifecycleState::PlannedExit, None)
            .context("failed to write dashboard heartbeat")?;
        Ok::<_, anyhow::Error>(())
    })();

    if let Err(e) = &result {
        notifications.error(&format!("#Error\ndashboard stopped: {e:#}"));
    }
    result
}

//! Construction of the real collaborators from config. Everything here builds
//! blocking HTTP clients, so it must run outside any async runtime.

use anyhow::Context;
use castkeeper_core::config::{Config, WarnLevel};
use castkeeper_core::heartbeat::{HeartbeatPublisher, HeartbeatStore, ProcessRole};
use castkeeper_core::notify::{LogNotifier, NoRemote, Notifications, Notifier, RemoteSignalSource};
use castkeeper_core::obs::ObsTool;
use castkeeper_core::paths;
use castkeeper_core::process::SystemProcessRegistry;
use castkeeper_core::telegram::TelegramClient;
use castkeeper_core::watchdog::Watchdog;
use castkeeper_core::youtube::{LifecycleStatusSource, NoStatusSource, YouTubeStatusClient};
use std::path::Path;
use std::sync::Arc;

pub fn load_config(root: &Path) -> anyhow::Result<Config> {
    let config = Config::load_or_default(root)
        .with_context(|| format!("failed to load {}", paths::config_path(root).display()))?;
    for w in config.validate() {
        tracing::warn!(level = ?w.level, "{}", w.message);
    }
    Ok(config)
}

/// Config for the worker and dashboard. Error-level findings refuse the
/// start; `config check` lists them.
pub fn load_runtime_config(root: &Path) -> anyhow::Result<Config> {
    let config = load_config(root)?;
    ensure_startable(&config)?;
    Ok(config)
}

fn ensure_startable(config: &Config) -> anyhow::Result<()> {
    let errors: Vec<_> = config
        .validate()
        .into_iter()
        .filter(|w| w.level == WarnLevel::Error)
        .map(|w| w.message)
        .collect();
    if !errors.is_empty() {
        anyhow::bail!(
            "config has {} error(s), refusing to start: {}",
            errors.len(),
            errors.join("; ")
        );
    }
    Ok(())
}

pub fn production_tool(config: &Config, root: &Path) -> anyhow::Result<ObsTool> {
    ObsTool::from_config(&config.obs, root).context("failed to set up OBS connection")
}

/// Chat notifier and remote signal. Falls back to log-only when no chat is
/// configured or its credentials cannot be read.
pub fn telegram(
    config: &Config,
    root: &Path,
) -> (Notifications, Arc<dyn RemoteSignalSource>) {
    let client = match TelegramClient::from_config(&config.telegram, root) {
        Ok(client) => client.map(Arc::new),
        Err(e) => {
            tracing::warn!(error = %e, "telegram disabled");
            None
        }
    };
    match client {
        Some(client) => {
            let notifier: Arc<dyn Notifier> = client.clone();
            (
                Notifications::new(notifier, &config.telegram),
                client as Arc<dyn RemoteSignalSource>,
            )
        }
        None => (
            Notifications::new(Arc::new(LogNotifier), &config.telegram),
            Arc::new(NoRemote),
        ),
    }
}

pub fn lifecycle_source(config: &Config, root: &Path) -> Arc<dyn LifecycleStatusSource> {
    let Some(token_file) = &config.youtube.token_file else {
        tracing::warn!("no youtube.token_file configured: live status will stay unknown");
        return Arc::new(NoStatusSource);
    };
    match YouTubeStatusClient::new(&config.youtube, paths::resolve(root, token_file)) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::warn!(error = %e, "youtube status client disabled");
            Arc::new(NoStatusSource)
        }
    }
}

pub fn publisher(config: &Config, root: &Path, role: ProcessRole) -> Arc<HeartbeatPublisher> {
    Arc::new(HeartbeatPublisher::new(
        HeartbeatStore::new(config.status_dir(root)),
        role,
    ))
}

/// Keep `publisher` fresh without supervising a peer (`--no-watchdog`).
pub fn spawn_heartbeat(
    publisher: Arc<HeartbeatPublisher>,
    interval: std::time::Duration,
) -> std::io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name(format!("heartbeat-{}", publisher.role()))
        .spawn(move || loop {
            if let Err(e) = publisher.beat() {
                tracing::warn!(error = %e, "heartbeat write failed");
            }
            std::thread::sleep(interval);
        })
}

/// Command that restarts `role`: the configured one, or this executable with
/// the matching subcommand. The subcommand directly follows the executable
/// so the default markers (`castkeeper worker`) match the command line.
pub fn peer_command(config: &Config, root: &Path, role: ProcessRole) -> Vec<String> {
    let configured = match role {
        ProcessRole::Worker => &config.processes.worker_command,
        ProcessRole::Dashboard => &config.processes.dashboard_command,
    };
    if !configured.is_empty() {
        return configured.clone();
    }
    let exe = std::env::current_exe()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "castkeeper".to_string());
    vec![
        exe,
        role.as_str().to_string(),
        "--root".to_string(),
        root.display().to_string(),
    ]
}

/// Watchdog over `peer`, ticking at that direction's configured interval.
pub fn watchdog(config: &Config, root: &Path, peer: ProcessRole) -> Watchdog {
    let (marker, interval) = match peer {
        ProcessRole::Worker => (
            &config.processes.worker_marker,
            config.heartbeat.dashboard_watch_interval_seconds,
        ),
        ProcessRole::Dashboard => (
            &config.processes.dashboard_marker,
            config.heartbeat.worker_watch_interval_seconds,
        ),
    };
    Watchdog::new(
        peer,
        marker.clone(),
        peer_command(config, root, peer),
        HeartbeatStore::new(config.status_dir(root)),
        Arc::new(SystemProcessRegistry::new()),
    )
    .with_threshold(config.heartbeat.staleness())
    .with_interval(std::time::Duration::from_secs(interval.max(1)))
}

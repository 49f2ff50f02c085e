use castkeeper_core::config::Config;
use castkeeper_core::heartbeat::{ExitFlag, HeartbeatStore};
use castkeeper_core::status::StatusView;
use chrono::Local;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Last computed status, written by the poller thread and read by handlers.
pub type SharedView = Arc<RwLock<StatusView>>;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub view: SharedView,
    pub heartbeats: HeartbeatStore,
    pub exit_flag: ExitFlag,
}

impl AppState {
    pub fn new(root: &Path, config: Config) -> Self {
        let heartbeats = HeartbeatStore::new(config.status_dir(root));
        let exit_flag = ExitFlag::new(&config.flags_dir(root));
        Self {
            view: Arc::new(RwLock::new(StatusView::starting(Local::now().naive_local()))),
            config: Arc::new(config),
            heartbeats,
            exit_flag,
        }
    }

    /// Snapshot of the current view. A poisoned lock still yields the last
    /// value written.
    pub fn current_view(&self) -> StatusView {
        self.view
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use castkeeper_core::heartbeat::ProcessRole;

    #[test]
    fn new_state_starts_with_placeholder_view() {
        let state = AppState::new(Path::new("/tmp/castkeeper"), Config::default());
        assert!(state
            .heartbeats
            .path(ProcessRole::Worker)
            .starts_with("/tmp/castkeeper"));
        assert_eq!(state.current_view().text, "starting up");
    }

    #[test]
    fn clones_share_the_view() {
        let state = AppState::new(Path::new("/tmp/castkeeper"), Config::default());
        let other = state.clone();
        state.view.write().unwrap().text = "live".into();
        assert_eq!(other.current_view().text, "live");
    }
}

use chrono::{Datelike, NaiveDate};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// File and directory names
// ---------------------------------------------------------------------------

pub const CONFIG_FILE: &str = "config.yaml";

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_STATUS_DIR: &str = "status";
pub const DEFAULT_FLAGS_DIR: &str = "runtime_flags";

pub const WORKER_HEARTBEAT_FILE: &str = "worker_heartbeat.json";
pub const DASHBOARD_HEARTBEAT_FILE: &str = "dashboard_heartbeat.json";
pub const WORKER_DONE_FLAG: &str = "worker_done.flag";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Make `path` absolute relative to `root`. Absolute paths pass through.
pub fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Per-month schedule file, e.g. `data/streams_2026-10.yaml`.
pub fn schedule_path(data_dir: &Path, date: NaiveDate) -> PathBuf {
    data_dir.join(format!(
        "streams_{:04}-{:02}.yaml",
        date.year(),
        date.month()
    ))
}

pub fn exit_flag_path(flags_dir: &Path) -> PathBuf {
    flags_dir.join(WORKER_DONE_FLAG)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_path_is_per_month() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        let path = schedule_path(Path::new("/srv/data"), date);
        assert_eq!(path, PathBuf::from("/srv/data/streams_2026-03.yaml"));
    }

    #[test]
    fn resolve_keeps_absolute_paths() {
        let root = Path::new("/srv/castkeeper");
        assert_eq!(resolve(root, Path::new("/var/status")), PathBuf::from("/var/status"));
        assert_eq!(
            resolve(root, Path::new("status")),
            PathBuf::from("/srv/castkeeper/status")
        );
    }
}

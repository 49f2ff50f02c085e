//! Heartbeat records shared between the worker and the dashboard.
//!
//! Each process owns exactly one record and overwrites it atomically; the peer
//! only reads it. Staleness is derived from the timestamp, never from the file
//! being absent.

use crate::broadcast::BroadcastRef;
use crate::error::Result;
use crate::io::{atomic_write, remove_if_exists};
use crate::paths;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// ProcessRole / LifecycleState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessRole {
    Worker,
    Dashboard,
}

impl ProcessRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessRole::Worker => "worker",
            ProcessRole::Dashboard => "dashboard",
        }
    }

    pub fn peer(self) -> ProcessRole {
        match self {
            ProcessRole::Worker => ProcessRole::Dashboard,
            ProcessRole::Dashboard => ProcessRole::Worker,
        }
    }

    fn file_name(self) -> &'static str {
        match self {
            ProcessRole::Worker => paths::WORKER_HEARTBEAT_FILE,
            ProcessRole::Dashboard => paths::DASHBOARD_HEARTBEAT_FILE,
        }
    }
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state a process declares about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Active,
    /// The process is stopping on purpose; its peer must not restart it.
    PlannedExit,
}

impl LifecycleState {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Active => "active",
            LifecycleState::PlannedExit => "planned_exit",
        }
    }
}

// ---------------------------------------------------------------------------
// HeartbeatRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatRecord {
    pub timestamp: DateTime<Utc>,
    pub state: LifecycleState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_broadcast: Option<BroadcastRef>,
}

// ---------------------------------------------------------------------------
// HeartbeatStore
// ---------------------------------------------------------------------------

/// File-backed, last-writer-wins heartbeat records under `status_dir`.
#[derive(Debug, Clone)]
pub struct HeartbeatStore {
    status_dir: PathBuf,
}

impl HeartbeatStore {
    pub fn new(status_dir: impl Into<PathBuf>) -> Self {
        Self {
            status_dir: status_dir.into(),
        }
    }

    pub fn path(&self, role: ProcessRole) -> PathBuf {
        self.status_dir.join(role.file_name())
    }

    /// Overwrite `role`'s record with the current time.
    pub fn write(
        &self,
        role: ProcessRole,
        state: LifecycleState,
        next_broadcast: Option<BroadcastRef>,
    ) -> Result<HeartbeatRecord> {
        let record = HeartbeatRecord {
            timestamp: Utc::now(),
            state,
            next_broadcast,
        };
        self.write_record(role, &record)?;
        Ok(record)
    }

    pub fn write_record(&self, role: ProcessRole, record: &HeartbeatRecord) -> Result<()> {
        let data = serde_json::to_vec_pretty(record)?;
        atomic_write(&self.path(role), &data)
    }

    /// `None` when the record is missing or cannot be parsed.
    pub fn read(&self, role: ProcessRole) -> Option<HeartbeatRecord> {
        let path = self.path(role);
        let data = std::fs::read(&path).ok()?;
        match serde_json::from_slice(&data) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "unparsable heartbeat");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Liveness classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Liveness {
    Healthy,
    Stale,
    Unknown,
}

impl Liveness {
    pub fn as_str(self) -> &'static str {
        match self {
            Liveness::Healthy => "healthy",
            Liveness::Stale => "stale",
            Liveness::Unknown => "unknown",
        }
    }
}

pub fn classify_liveness(
    record: Option<&HeartbeatRecord>,
    threshold: Duration,
    now: DateTime<Utc>,
) -> Liveness {
    match record {
        None => Liveness::Unknown,
        Some(r) if now - r.timestamp < threshold => Liveness::Healthy,
        Some(_) => Liveness::Stale,
    }
}

/// Worker health as shown on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PeerHealth {
    Running,
    ExitedCleanly,
    Crashed,
}

impl PeerHealth {
    pub fn as_str(self) -> &'static str {
        match self {
            PeerHealth::Running => "running",
            PeerHealth::ExitedCleanly => "exited-cleanly",
            PeerHealth::Crashed => "crashed",
        }
    }
}

impl fmt::Display for PeerHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn peer_health(
    record: Option<&HeartbeatRecord>,
    exit_flag_set: bool,
    threshold: Duration,
    now: DateTime<Utc>,
) -> PeerHealth {
    if classify_liveness(record, threshold, now) == Liveness::Healthy {
        return PeerHealth::Running;
    }
    let planned = record.is_some_and(|r| r.state == LifecycleState::PlannedExit);
    if planned || exit_flag_set {
        PeerHealth::ExitedCleanly
    } else {
        PeerHealth::Crashed
    }
}

// ---------------------------------------------------------------------------
// ExitFlag
// ---------------------------------------------------------------------------

/// Sentinel file marking that the last worker run ended on its normal path.
#[derive(Debug, Clone)]
pub struct ExitFlag {
    path: PathBuf,
}

impl ExitFlag {
    pub fn new(flags_dir: &Path) -> Self {
        Self {
            path: paths::exit_flag_path(flags_dir),
        }
    }

    pub fn clear(&self) -> Result<()> {
        remove_if_exists(&self.path)
    }

    pub fn set(&self) -> Result<()> {
        let note = format!("worker finished its day run at {}\n", Utc::now().to_rfc3339());
        atomic_write(&self.path, note.as_bytes())
    }

    pub fn is_set(&self) -> bool {
        self.path.exists()
    }
}

// ---------------------------------------------------------------------------
// HeartbeatPublisher
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Declared {
    state: LifecycleState,
    next_broadcast: Option<BroadcastRef>,
}

/// Writes this process's own heartbeat.
///
/// Keeps the last declared state so periodic beats from the watchdog thread
/// repeat it; once `PlannedExit` is declared a beat never reverts it to
/// `Active`.
#[derive(Debug)]
pub struct HeartbeatPublisher {
    store: HeartbeatStore,
    role: ProcessRole,
    declared: Mutex<Declared>,
}

impl HeartbeatPublisher {
    pub fn new(store: HeartbeatStore, role: ProcessRole) -> Self {
        Self {
            store,
            role,
            declared: Mutex::new(Declared {
                state: LifecycleState::Active,
                next_broadcast: None,
            }),
        }
    }

    pub fn role(&self) -> ProcessRole {
        self.role
    }

    /// Record a new lifecycle state and write it immediately.
    pub fn declare(&self, state: LifecycleState, next: Option<BroadcastRef>) -> Result<()> {
        let mut declared = self.declared.lock().unwrap_or_else(|e| e.into_inner());
        declared.state = state;
        declared.next_broadcast = next;
        self.store
            .write(self.role, declared.state, declared.next_broadcast.clone())?;
        Ok(())
    }

    /// Rewrite the last declared state with a fresh timestamp.
    pub fn beat(&self) -> Result<()> {
        let declared = self.declared.lock().unwrap_or_else(|e| e.into_inner());
        self.store
            .write(self.role, declared.state, declared.next_broadcast.clone())?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use tempfile::TempDir;

    fn record_at(timestamp: DateTime<Utc>, state: LifecycleState) -> HeartbeatRecord {
        HeartbeatRecord {
            timestamp,
            state,
            next_broadcast: None,
        }
    }

    #[test]
    fn write_then_read_returns_record() {
        let dir = TempDir::new().unwrap();
        let store = HeartbeatStore::new(dir.path());
        let next = BroadcastRef {
            date: "2026-10-19".parse().unwrap(),
            time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            key: "abcd".into(),
            title: "Hochamt".into(),
            watch_url: "https://youtube.com/live/xyz".into(),
        };
        let written = store
            .write(ProcessRole::Worker, LifecycleState::Active, Some(next.clone()))
            .unwrap();
        let read = store.read(ProcessRole::Worker).unwrap();
        assert_eq!(read, written);
        assert_eq!(read.next_broadcast, Some(next));
        assert!(store.read(ProcessRole::Dashboard).is_none());
    }

    #[test]
    fn unparsable_record_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let store = HeartbeatStore::new(dir.path());
        std::fs::write(store.path(ProcessRole::Worker), b"2026-10-19T10:00:00").unwrap();
        assert!(store.read(ProcessRole::Worker).is_none());
    }

    #[test]
    fn classify_healthy_stale_unknown() {
        let now = Utc::now();
        let threshold = Duration::seconds(90);
        let fresh = record_at(now - Duration::seconds(10), LifecycleState::Active);
        let old = record_at(now - Duration::seconds(120), LifecycleState::Active);
        assert_eq!(classify_liveness(Some(&fresh), threshold, now), Liveness::Healthy);
        assert_eq!(classify_liveness(Some(&old), threshold, now), Liveness::Stale);
        assert_eq!(classify_liveness(None, threshold, now), Liveness::Unknown);
    }

    #[test]
    fn classify_is_stale_exactly_at_threshold() {
        let now = Utc::now();
        let r = record_at(now - Duration::seconds(90), LifecycleState::Active);
        assert_eq!(
            classify_liveness(Some(&r), Duration::seconds(90), now),
            Liveness::Stale
        );
    }

    #[test]
    fn classify_never_recovers_without_new_write() {
        let written = Utc::now();
        let r = record_at(written, LifecycleState::Active);
        let threshold = Duration::seconds(90);
        let mut seen_stale = false;
        for secs in (0..600).step_by(7) {
            let liveness = classify_liveness(Some(&r), threshold, written + Duration::seconds(secs));
            if seen_stale {
                assert_eq!(liveness, Liveness::Stale, "reverted at +{secs}s");
            }
            seen_stale |= liveness == Liveness::Stale;
        }
        assert!(seen_stale);
    }

    #[test]
    fn peer_health_lines() {
        let now = Utc::now();
        let threshold = Duration::seconds(90);
        let fresh = record_at(now, LifecycleState::Active);
        let old_active = record_at(now - Duration::minutes(5), LifecycleState::Active);
        let old_planned = record_at(now - Duration::minutes(5), LifecycleState::PlannedExit);

        assert_eq!(peer_health(Some(&fresh), false, threshold, now), PeerHealth::Running);
        assert_eq!(
            peer_health(Some(&old_planned), false, threshold, now),
            PeerHealth::ExitedCleanly
        );
        assert_eq!(
            peer_health(Some(&old_active), true, threshold, now),
            PeerHealth::ExitedCleanly
        );
        assert_eq!(
            peer_health(Some(&old_active), false, threshold, now),
            PeerHealth::Crashed
        );
        assert_eq!(peer_health(None, false, threshold, now), PeerHealth::Crashed);
    }

    #[test]
    fn exit_flag_lifecycle() {
        let dir = TempDir::new().unwrap();
        let flag = ExitFlag::new(dir.path());
        assert!(!flag.is_set());
        flag.set().unwrap();
        assert!(flag.is_set());
        flag.clear().unwrap();
        assert!(!flag.is_set());
        flag.clear().unwrap();
    }

    #[test]
    fn publisher_beat_keeps_planned_exit() {
        let dir = TempDir::new().unwrap();
        let store = HeartbeatStore::new(dir.path());
        let publisher = HeartbeatPublisher::new(store.clone(), ProcessRole::Worker);

        publisher.beat().unwrap();
        assert_eq!(
            store.read(ProcessRole::Worker).unwrap().state,
            LifecycleState::Active
        );

        publisher.declare(LifecycleState::PlannedExit, None).unwrap();
        publisher.beat().unwrap();
        assert_eq!(
            store.read(ProcessRole::Worker).unwrap().state,
            LifecycleState::PlannedExit
        );
    }
}

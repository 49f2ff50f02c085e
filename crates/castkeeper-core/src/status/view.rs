use crate::broadcast::{BroadcastRef, ScheduledBroadcast};
use crate::heartbeat::{peer_health, HeartbeatRecord, PeerHealth};
use crate::notify::RemoteSignal;
use crate::youtube::LifecycleStatus;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusColor {
    Positive,
    Neutral,
    Informational,
    Warning,
}

impl StatusColor {
    pub fn css(self) -> &'static str {
        match self {
            StatusColor::Positive => "#2e9d4f",
            StatusColor::Neutral => "#8a8a8a",
            StatusColor::Informational => "#2f6fb5",
            StatusColor::Warning => "#d98b1c",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraHint {
    /// Confirmed live and on the on-air scene: an operator should steer the camera.
    Manual,
    Automatic,
}

impl CameraHint {
    pub fn text(self) -> &'static str {
        match self {
            CameraHint::Manual => "manual: take camera control",
            CameraHint::Automatic => "automatic mode",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateView {
    pub title: String,
    pub starts_at: NaiveDateTime,
    pub location: String,
    pub watch_url: String,
    pub broadcast_id: Option<String>,
}

impl CandidateView {
    pub fn of(broadcast: &ScheduledBroadcast) -> Self {
        Self {
            title: broadcast.title.clone(),
            starts_at: broadcast.starts_at(),
            location: broadcast.location.clone(),
            watch_url: broadcast.watch_url.clone(),
            broadcast_id: broadcast.broadcast_id(),
        }
    }
}

/// Worker process health as read from its heartbeat.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerView {
    pub health: PeerHealth,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub next_broadcast: Option<BroadcastRef>,
}

impl WorkerView {
    pub fn from_heartbeat(
        record: Option<&HeartbeatRecord>,
        exit_flag_set: bool,
        threshold: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            health: peer_health(record, exit_flag_set, threshold, now),
            last_heartbeat: record.map(|r| r.timestamp),
            next_broadcast: record.and_then(|r| r.next_broadcast.clone()),
        }
    }
}

/// Everything the status page shows, computed once per poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusView {
    pub generated_at: NaiveDateTime,
    pub text: String,
    pub color: StatusColor,
    pub candidate: Option<CandidateView>,
    pub confirmed: bool,
    pub scene: Option<String>,
    /// External lifecycle status, when it was queried this tick.
    pub external: Option<LifecycleStatus>,
    pub error_window_until: Option<NaiveDateTime>,
    pub camera: CameraHint,
    pub remote: RemoteSignal,
    pub worker: Option<WorkerView>,
}

impl StatusView {
    /// Shown until the first poll completes.
    pub fn starting(now: NaiveDateTime) -> Self {
        Self {
            generated_at: now,
            text: "starting up".to_string(),
            color: StatusColor::Neutral,
            candidate: None,
            confirmed: false,
            scene: None,
            external: None,
            error_window_until: None,
            camera: CameraHint::Automatic,
            remote: RemoteSignal::Unknown,
            worker: None,
        }
    }
}

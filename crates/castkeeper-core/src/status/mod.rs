//! Live status derivation for the dashboard.
//!
//! [`StatusEngine`] reconciles the hosting service's lifecycle status, the
//! production tool's current scene and the schedule into one [`StatusView`].
//! A confirmed broadcast stays "live" through transient lookup failures for
//! the length of the error window.

pub mod view;

use crate::broadcast::ScheduledBroadcast;
use crate::config::{span_hours, span_minutes, span_seconds, DashboardConfig, ObsConfig};
use crate::notify::RemoteSignal;
use crate::youtube::{LifecycleStatus, LifecycleStatusSource};
use chrono::{Duration, NaiveDateTime};
use std::collections::{HashMap, HashSet};
pub use view::{CameraHint, CandidateView, StatusColor, StatusView, WorkerView};

/// How long a recently-ended entry is remembered after its deadline.
const RECENTLY_ENDED_RETENTION_HOURS: i64 = 24;

#[derive(Debug, Clone)]
pub struct StatusSettings {
    pub scene_live: String,
    pub lead: Duration,
    pub grace: Duration,
    pub long_grace: Duration,
    pub clear_after: Duration,
    pub error_window: Duration,
    pub lookahead: Duration,
}

impl StatusSettings {
    pub fn from_config(dashboard: &DashboardConfig, obs: &ObsConfig) -> Self {
        Self {
            scene_live: obs.scene_live.clone(),
            lead: span_minutes(dashboard.lead_minutes),
            grace: span_seconds(dashboard.grace_seconds),
            long_grace: span_seconds(dashboard.long_grace_seconds),
            clear_after: span_minutes(dashboard.clear_after_minutes),
            error_window: span_minutes(dashboard.error_window_minutes),
            lookahead: span_hours(dashboard.lookahead_hours),
        }
    }
}

/// Key a broadcast is tracked under: its hosting id, or its identity when the
/// watch URL carries none.
fn tracking_key(b: &ScheduledBroadcast) -> String {
    b.broadcast_id()
        .unwrap_or_else(|| format!("{}|{}", b.starts_at(), b.title))
}

pub struct StatusEngine {
    settings: StatusSettings,
    confirmed: HashSet<String>,
    error_window: Option<NaiveDateTime>,
    active: Option<ScheduledBroadcast>,
    recently_ended: HashMap<String, NaiveDateTime>,
    evictions: u64,
}

impl StatusEngine {
    pub fn new(settings: StatusSettings) -> Self {
        Self {
            settings,
            confirmed: HashSet::new(),
            error_window: None,
            active: None,
            recently_ended: HashMap::new(),
            evictions: 0,
        }
    }

    pub fn is_confirmed(&self, broadcast: &ScheduledBroadcast) -> bool {
        self.confirmed.contains(&tracking_key(broadcast))
    }

    pub fn error_window(&self) -> Option<NaiveDateTime> {
        self.error_window
    }

    /// Confirmations withdrawn so far (status turned non-live or the error
    /// window ran out).
    pub fn eviction_count(&self) -> u64 {
        self.evictions
    }

    fn candidate(&self, now: NaiveDateTime, schedule: &[ScheduledBroadcast]) -> Option<ScheduledBroadcast> {
        if let Some(active) = &self.active {
            if self.confirmed.contains(&tracking_key(active)) {
                return Some(active.clone());
            }
        }
        let oldest_delta = -(self.settings.long_grace + self.settings.clear_after);
        let mut eligible: Vec<_> = schedule
            .iter()
            .filter(|b| b.starts_at() <= now + self.settings.lookahead)
            .filter(|b| b.starts_at() - self.settings.lead - now >= oldest_delta)
            .filter(|b| {
                self.recently_ended
                    .get(&tracking_key(b))
                    .map_or(true, |deadline| now < *deadline)
            })
            .collect();
        eligible.sort_by_key(|b| b.starts_at());
        eligible.first().map(|b| (*b).clone())
    }

    fn evict(&mut self, key: &str, reason: &str) {
        if self.confirmed.remove(key) {
            self.evictions += 1;
            tracing::info!(broadcast = key, reason, "live confirmation withdrawn");
        }
        if self
            .active
            .as_ref()
            .is_some_and(|a| tracking_key(a) == key)
        {
            self.active = None;
        }
    }

    /// Run one tick. `scene` is `None` when the production tool could not be
    /// reached.
    pub fn evaluate(
        &mut self,
        now: NaiveDateTime,
        schedule: &[ScheduledBroadcast],
        scene: Option<&str>,
        source: &dyn LifecycleStatusSource,
        remote: RemoteSignal,
    ) -> StatusView {
        let retention = Duration::hours(RECENTLY_ENDED_RETENTION_HOURS);
        self.recently_ended
            .retain(|_, deadline| now < *deadline + retention);

        let candidate = self.candidate(now, schedule);
        let key = candidate.as_ref().map(tracking_key);
        let on_air = scene.is_some_and(|s| s == self.settings.scene_live);
        let was_confirmed = key.as_ref().is_some_and(|k| self.confirmed.contains(k));

        let mut external = None;
        if let (Some(b), Some(k)) = (&candidate, &key) {
            if on_air || was_confirmed {
                let status = match b.broadcast_id() {
                    Some(id) => source.lifecycle_status(&id),
                    None => LifecycleStatus::Unknown,
                };
                external = Some(status);

                if on_air && status == LifecycleStatus::Live {
                    if self.confirmed.insert(k.clone()) {
                        tracing::info!(broadcast = %b.label(), "confirmed live");
                    }
                    self.active = Some(b.clone());
                    self.error_window = None;
                } else if was_confirmed && status.is_definitive_not_live() {
                    self.evict(k, "hosting service reports not live");
                    self.error_window = None;
                    self.recently_ended
                        .insert(k.clone(), now + self.settings.clear_after);
                } else if status != LifecycleStatus::Live && self.error_window.is_none() {
                    let deadline = now + self.settings.error_window;
                    tracing::warn!(
                        broadcast = %b.label(),
                        %status,
                        until = %deadline,
                        "live status not confirmed, holding"
                    );
                    self.error_window = Some(deadline);
                }
            }
        }

        if let Some(deadline) = self.error_window {
            if now > deadline {
                if let Some(k) = &key {
                    self.evict(k, "error window expired");
                }
                self.error_window = None;
            }
        }

        let confirmed = key.as_ref().is_some_and(|k| self.confirmed.contains(k));
        let recently_ended = key.as_ref().is_some_and(|k| {
            self.recently_ended
                .get(k)
                .is_some_and(|deadline| now < *deadline)
        });
        let (text, color) = self.decide(now, candidate.as_ref(), confirmed, recently_ended);

        StatusView {
            generated_at: now,
            text,
            color,
            candidate: candidate.as_ref().map(CandidateView::of),
            confirmed,
            scene: scene.map(str::to_string),
            external,
            error_window_until: self.error_window,
            camera: if confirmed && on_air {
                CameraHint::Manual
            } else {
                CameraHint::Automatic
            },
            remote,
            worker: None,
        }
    }

    fn decide(
        &self,
        now: NaiveDateTime,
        candidate: Option<&ScheduledBroadcast>,
        confirmed: bool,
        recently_ended: bool,
    ) -> (String, StatusColor) {
        let ended = ("ended, clearing soon".to_string(), StatusColor::Warning);
        if recently_ended {
            return ended;
        }
        if confirmed {
            return ("live".to_string(), StatusColor::Positive);
        }
        let Some(candidate) = candidate else {
            return ("no scheduled broadcast".to_string(), StatusColor::Neutral);
        };
        let delta = candidate.starts_at() - self.settings.lead - now;
        if delta > Duration::zero() {
            let minutes = (delta.num_milliseconds() + 59_999) / 60_000;
            return (
                format!("starting in {minutes} minutes"),
                StatusColor::Informational,
            );
        }
        if delta >= -self.settings.grace {
            return (
                "waiting for host confirmation".to_string(),
                StatusColor::Informational,
            );
        }
        if delta >= -self.settings.long_grace {
            return ("likely live".to_string(), StatusColor::Positive);
        }
        ended
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticStatusSource;
    use chrono::NaiveTime;

    const ON_AIR: &str = "Gottesdienst";

    fn at(s: &str) -> NaiveDateTime {
        format!("2026-10-19T{s}").parse().unwrap()
    }

    fn broadcast(time: &str, id: &str) -> ScheduledBroadcast {
        ScheduledBroadcast {
            date: "2026-10-19".parse().unwrap(),
            time: NaiveTime::parse_from_str(time, "%H:%M").unwrap(),
            title: format!("Messe {id}"),
            location: "St. Gisela".into(),
            ingest_url: "rtmp://x".into(),
            ingest_key: "k".into(),
            watch_url: format!("https://youtube.com/live/{id}"),
        }
    }

    fn engine() -> StatusEngine {
        StatusEngine::new(StatusSettings::from_config(
            &DashboardConfig::default(),
            &ObsConfig::default(),
        ))
    }

    #[test]
    fn starting_in_five_minutes() {
        let mut engine = engine();
        let source = StaticStatusSource::default();
        let view = engine.evaluate(
            at("09:50:00"),
            &[broadcast("10:00", "abc")],
            Some("Beginn"),
            &source,
            RemoteSignal::Unknown,
        );
        assert_eq!(view.text, "starting in 5 minutes");
        assert_eq!(view.color, StatusColor::Informational);
        assert_eq!(source.query_count(), 0, "not on air: no external query");
    }

    #[test]
    fn partial_minutes_round_up() {
        let mut engine = engine();
        let source = StaticStatusSource::default();
        let view = engine.evaluate(
            at("09:50:30"),
            &[broadcast("10:00", "abc")],
            None,
            &source,
            RemoteSignal::Unknown,
        );
        assert_eq!(view.text, "starting in 5 minutes");
    }

    #[test]
    fn fractional_seconds_round_up() {
        let source = StaticStatusSource::default();
        let schedule = [broadcast("10:00", "abc")];
        let cases = [
            ("09:54:59.500", "starting in 1 minutes"),
            ("09:54:00.001", "starting in 1 minutes"),
            ("09:53:59.999", "starting in 2 minutes"),
        ];
        for (now, text) in cases {
            let view = engine().evaluate(at(now), &schedule, None, &source, RemoteSignal::Unknown);
            assert_eq!(view.text, text, "at {now}");
        }
    }

    #[test]
    fn delta_bands_without_confirmation() {
        let schedule = [broadcast("10:00", "abc")];
        let source = StaticStatusSource::default();
        let cases = [
            ("09:55:00", "waiting for host confirmation", StatusColor::Informational),
            ("09:57:00", "waiting for host confirmation", StatusColor::Informational),
            ("09:57:01", "likely live", StatusColor::Positive),
            ("10:40:00", "likely live", StatusColor::Positive),
            ("10:40:01", "ended, clearing soon", StatusColor::Warning),
        ];
        for (now, text, color) in cases {
            let view = engine().evaluate(at(now), &schedule, None, &source, RemoteSignal::Unknown);
            assert_eq!((view.text.as_str(), view.color), (text, color), "at {now}");
        }
    }

    #[test]
    fn nothing_scheduled_is_neutral() {
        let view = engine().evaluate(
            at("12:00:00"),
            &[],
            Some(ON_AIR),
            &StaticStatusSource::default(),
            RemoteSignal::Off,
        );
        assert_eq!(view.text, "no scheduled broadcast");
        assert_eq!(view.color, StatusColor::Neutral);
        assert_eq!(view.remote, RemoteSignal::Off);
    }

    #[test]
    fn broadcast_beyond_lookahead_is_not_a_candidate() {
        let tomorrow = ScheduledBroadcast {
            date: "2026-10-20".parse().unwrap(),
            ..broadcast("12:00", "abc")
        };
        let view = engine().evaluate(
            at("10:00:00"),
            &[tomorrow],
            None,
            &StaticStatusSource::default(),
            RemoteSignal::Unknown,
        );
        assert!(view.candidate.is_none());
    }

    #[test]
    fn live_then_ended_downgrades_to_clearing() {
        let mut engine = engine();
        let schedule = [broadcast("10:00", "abc")];
        let source = StaticStatusSource::default();
        source.set("abc", LifecycleStatus::Live);

        let view = engine.evaluate(at("10:02:00"), &schedule, Some(ON_AIR), &source, RemoteSignal::On);
        assert_eq!(view.text, "live");
        assert_eq!(view.color, StatusColor::Positive);
        assert_eq!(view.camera, CameraHint::Manual);
        assert!(engine.is_confirmed(&schedule[0]));

        source.set("abc", LifecycleStatus::Ended);
        let view = engine.evaluate(at("11:10:00"), &schedule, Some("Beginn"), &source, RemoteSignal::On);
        assert!(!engine.is_confirmed(&schedule[0]));
        assert_eq!(view.text, "ended, clearing soon");
        assert_eq!(view.color, StatusColor::Warning);
        assert_eq!(view.camera, CameraHint::Automatic);
        assert_eq!(engine.eviction_count(), 1);

        // After clear_after it is no longer shown at all.
        let view = engine.evaluate(at("11:21:00"), &schedule, None, &source, RemoteSignal::On);
        assert!(view.candidate.is_none());
        assert_eq!(view.text, "no scheduled broadcast");
    }

    #[test]
    fn confirmation_round_trips_and_evicts_once_after_window() {
        let mut engine = engine();
        let schedule = [broadcast("10:00", "abc")];
        let source = StaticStatusSource::default();
        source.set("abc", LifecycleStatus::Live);

        engine.evaluate(at("10:00:00"), &schedule, Some(ON_AIR), &source, RemoteSignal::Unknown);
        let again = engine.evaluate(at("10:00:10"), &schedule, Some(ON_AIR), &source, RemoteSignal::Unknown);
        assert!(again.confirmed);
        assert_eq!(again.text, "live");

        // Inputs disappear: the tool is unreachable and the status is unknown.
        source.set("abc", LifecycleStatus::Unknown);
        let held = engine.evaluate(at("10:01:00"), &schedule, None, &source, RemoteSignal::Unknown);
        assert!(held.confirmed, "held through the error window");
        assert_eq!(held.error_window_until, Some(at("12:01:00")));

        let mut minute = at("10:02:00");
        while minute <= at("12:01:00") {
            let view = engine.evaluate(minute, &schedule, None, &source, RemoteSignal::Unknown);
            assert!(view.confirmed, "evicted early at {minute}");
            minute += Duration::minutes(10);
        }
        let view = engine.evaluate(at("12:01:01"), &schedule, None, &source, RemoteSignal::Unknown);
        assert!(!view.confirmed);
        assert_eq!(engine.eviction_count(), 1);
        assert!(engine.error_window().is_none());

        for m in 0..30 {
            engine.evaluate(
                at("12:02:00") + Duration::minutes(m),
                &schedule,
                None,
                &source,
                RemoteSignal::Unknown,
            );
        }
        assert_eq!(engine.eviction_count(), 1);
    }

    #[test]
    fn on_air_without_confirmation_opens_window_once() {
        let mut engine = engine();
        let schedule = [broadcast("10:00", "abc")];
        let source = StaticStatusSource::default();

        engine.evaluate(at("09:56:00"), &schedule, Some(ON_AIR), &source, RemoteSignal::Unknown);
        let first = engine.error_window();
        engine.evaluate(at("09:57:00"), &schedule, Some(ON_AIR), &source, RemoteSignal::Unknown);
        assert_eq!(engine.error_window(), first);
        assert_eq!(first, Some(at("11:56:00")));
    }

    #[test]
    fn one_external_query_per_tick() {
        let mut engine = engine();
        let schedule = [broadcast("10:00", "abc"), broadcast("10:30", "def")];
        let source = StaticStatusSource::default();
        engine.evaluate(at("10:00:00"), &schedule, Some(ON_AIR), &source, RemoteSignal::Unknown);
        assert_eq!(source.query_count(), 1);
    }
}

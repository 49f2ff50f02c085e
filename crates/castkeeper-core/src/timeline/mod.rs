//! Per-day execution state machine.
//!
//! Broadcasts run strictly one after another in start-time order:
//!
//! ```text
//! Pending → WaitingForPrestart → Configuring → WaitingForLiveWindow
//!         → Live → Monitoring → Ended
//! ```
//!
//! A broadcast older than the grace period goes straight from `Pending` to
//! `Ended` without touching the production tool, unless it is late only
//! because its predecessor was still on air. Then it runs late and a
//! [`DelayReport`] is produced.

pub mod report;

use crate::broadcast::{dedupe_by_identity, ScheduledBroadcast};
use crate::clock::Clock;
use crate::config::{poll_step, span_minutes, ObsConfig, TimelineConfig};
use crate::notify::Notifications;
use crate::production::{apply_destination, prepare_broadcast, ProductionTool, SessionGuard};
use chrono::{Duration, NaiveDate, NaiveDateTime};
pub use report::{
    format_duration, BroadcastReport, DaySummary, DelayReport, Outcome, Overlap, Phase, Stage,
};

fn to_std(d: Duration) -> std::time::Duration {
    d.to_std().unwrap_or_default()
}

/// Consecutive pairs whose pre-roll instant precedes the previous start.
pub fn detect_overlaps(broadcasts: &[ScheduledBroadcast], prestart_offset: Duration) -> Vec<Overlap> {
    broadcasts
        .windows(2)
        .filter(|pair| pair[1].starts_at() - prestart_offset < pair[0].starts_at())
        .map(|pair| Overlap {
            earlier: pair[0].label(),
            later: pair[1].label(),
        })
        .collect()
}

/// Where a configuring step failed and why.
struct ConfigureError {
    stage: Stage,
    error: String,
}

fn at_stage<E: std::fmt::Display>(stage: Stage) -> impl FnOnce(E) -> ConfigureError {
    move |e| ConfigureError {
        stage,
        error: e.to_string(),
    }
}

pub struct Timeline<'a> {
    clock: &'a dyn Clock,
    tool: &'a dyn ProductionTool,
    obs: &'a ObsConfig,
    cadence: &'a TimelineConfig,
    notifications: &'a Notifications,
}

impl<'a> Timeline<'a> {
    pub fn new(
        clock: &'a dyn Clock,
        tool: &'a dyn ProductionTool,
        obs: &'a ObsConfig,
        cadence: &'a TimelineConfig,
        notifications: &'a Notifications,
    ) -> Self {
        Self {
            clock,
            tool,
            obs,
            cadence,
            notifications,
        }
    }

    /// Execute `broadcasts` (one day, any order) and return what happened.
    /// `following` is the first broadcast after the day; the tool is left
    /// prepared for it once the last stream ends.
    pub fn run(
        &self,
        date: NaiveDate,
        broadcasts: &[ScheduledBroadcast],
        following: Option<&ScheduledBroadcast>,
    ) -> DaySummary {
        let mut ordered = broadcasts.to_vec();
        ordered.sort_by_key(|b| b.starts_at());
        for duplicate in dedupe_by_identity(&mut ordered) {
            tracing::warn!(broadcast = %duplicate.label(), "duplicate broadcast dropped");
            self.notifications
                .error(&format!("#Error\nDuplicate schedule entry ignored: {}", duplicate.label()));
        }

        let mut summary = DaySummary::new(date);
        summary.overlaps = detect_overlaps(&ordered, self.obs.prestart_offset());
        for overlap in &summary.overlaps {
            tracing::warn!(earlier = %overlap.earlier, later = %overlap.later, "overlapping broadcasts");
            self.notifications.error(&overlap.message());
        }

        // End of the last broadcast that actually went on air, and its label.
        let mut on_air_until: Option<(NaiveDateTime, String)> = None;

        for (i, broadcast) in ordered.iter().enumerate() {
            let next = ordered.get(i + 1).or(following);
            let report = self.run_one(broadcast, next, on_air_until.as_ref(), &mut summary.delays);
            if let Some(ended) = report.ended_at.filter(|_| report.outcome.executed()) {
                on_air_until = Some((ended, broadcast.label()));
            }
            summary.broadcasts.push(report);
        }
        summary
    }

    fn run_one(
        &self,
        broadcast: &ScheduledBroadcast,
        next: Option<&ScheduledBroadcast>,
        on_air_until: Option<&(NaiveDateTime, String)>,
        delays: &mut Vec<DelayReport>,
    ) -> BroadcastReport {
        let start = broadcast.starts_at();
        let prestart = start - self.obs.prestart_offset();
        let mut report = BroadcastReport {
            title: broadcast.title.clone(),
            scheduled: start,
            started_at: None,
            ended_at: None,
            outcome: Outcome::SkippedStale,
            phases: vec![Phase::Pending],
        };

        let blocked_by = on_air_until
            .filter(|(until, _)| *until > prestart)
            .map(|(_, label)| label.clone());

        let now = self.clock.now();
        if start < now - self.obs.grace() && blocked_by.is_none() {
            tracing::info!(broadcast = %broadcast.label(), "skipping broadcast: too old");
            report.phases.push(Phase::Ended);
            return report;
        }

        report.phases.push(Phase::WaitingForPrestart);
        self.wait_for_prestart(broadcast, prestart);

        report.phases.push(Phase::Configuring);
        let configured_at = self.clock.now();
        if let Some(blocked_by) = blocked_by.filter(|_| configured_at > prestart) {
            let delay = DelayReport {
                title: broadcast.title.clone(),
                blocked_by,
                planned_prestart: prestart,
                configured_at,
            };
            tracing::warn!(
                broadcast = %broadcast.label(),
                delay_minutes = delay.delay().num_minutes(),
                blocked_by = %delay.blocked_by,
                "broadcast delayed by its predecessor"
            );
            self.notifications.error(&delay.message());
            delays.push(delay);
        }

        let mut guard = match self.configure(broadcast) {
            Ok(guard) => guard,
            Err(failure) => {
                tracing::error!(
                    broadcast = %broadcast.label(),
                    stage = %failure.stage,
                    error = %failure.error,
                    "configuring broadcast failed"
                );
                self.notifications.error(&format!(
                    "#Error\n{}: {} failed: {}",
                    broadcast.label(),
                    failure.stage,
                    failure.error
                ));
                report.outcome = Outcome::Failed {
                    stage: failure.stage,
                    error: failure.error,
                };
                report.phases.push(Phase::Ended);
                return report;
            }
        };
        report.started_at = Some(self.clock.now());

        report.phases.push(Phase::WaitingForLiveWindow);
        let switch_at = start - self.obs.switch_offset();
        self.sleep_until(switch_at, self.cadence.live_poll_seconds);
        if let Err(e) = guard.switch_scene(&self.obs.scene_live) {
            tracing::error!(broadcast = %broadcast.label(), error = %e, "switching to on-air scene failed");
            self.notifications.error(&format!(
                "#Error\n{}: switching to '{}' failed: {e}",
                broadcast.label(),
                self.obs.scene_live
            ));
        }
        report.phases.push(Phase::Live);
        tracing::info!(broadcast = %broadcast.label(), "on air");

        report.phases.push(Phase::Monitoring);
        report.outcome = self.monitor(&mut guard, start + self.obs.max_duration());
        report.ended_at = Some(self.clock.now());
        report.phases.push(Phase::Ended);
        tracing::info!(
            broadcast = %broadcast.label(),
            outcome = %report.outcome,
            duration = %report.duration().map(format_duration).unwrap_or_default(),
            "broadcast finished"
        );

        match next {
            Some(next) => {
                if let Err(e) = prepare_broadcast(&mut *guard, self.obs, next) {
                    tracing::warn!(next = %next.label(), error = %e, "preparing next broadcast failed");
                }
            }
            None => tracing::info!("no further broadcast scheduled"),
        }
        guard.release();
        report
    }

    fn wait_for_prestart(&self, broadcast: &ScheduledBroadcast, prestart: NaiveDateTime) {
        let wait_note = span_minutes(self.cadence.wait_note_minutes.max(1));
        let standby_note = span_minutes(self.cadence.standby_note_minutes.max(1));
        let mut next_wait_note = self.clock.now();
        let mut next_standby_note = self.clock.now() + standby_note;
        loop {
            let now = self.clock.now();
            if now >= prestart {
                return;
            }
            if now >= next_wait_note {
                tracing::info!(
                    broadcast = %broadcast.label(),
                    minutes = (prestart - now).num_minutes(),
                    "waiting for pre-roll"
                );
                next_wait_note = now + wait_note;
            }
            if now >= next_standby_note {
                tracing::info!("standby");
                next_standby_note = now + standby_note;
            }
            let step = poll_step(self.cadence.wait_poll_seconds);
            self.clock.sleep(to_std(step.min(prestart - now)));
        }
    }

    fn sleep_until(&self, until: NaiveDateTime, poll_seconds: u64) {
        let step = poll_step(poll_seconds);
        loop {
            let now = self.clock.now();
            if now >= until {
                return;
            }
            self.clock.sleep(to_std(step.min(until - now)));
        }
    }

    /// Overlay, pre-roll scene, destination, start. The session is closed by
    /// the guard if any step fails.
    fn configure(&self, broadcast: &ScheduledBroadcast) -> Result<SessionGuard, ConfigureError> {
        let mut guard = SessionGuard::acquire(self.tool).map_err(at_stage(Stage::Connect))?;
        guard
            .set_text(&self.obs.text_source, &broadcast.overlay_text())
            .map_err(at_stage(Stage::OverlayText))?;
        guard
            .switch_scene(&self.obs.scene_start)
            .map_err(at_stage(Stage::PrerollScene))?;
        let destination = crate::production::StreamDestination::for_broadcast(broadcast);
        let confirmed = apply_destination(&mut *guard, &destination)
            .map_err(at_stage(Stage::Destination))?;
        if !confirmed {
            tracing::warn!(broadcast = %broadcast.label(), "stream destination not confirmed by read-back");
        }
        guard
            .start_stream()
            .map_err(at_stage(Stage::StartStream))?;
        match guard.stream_output_active() {
            Ok(true) => {}
            Ok(false) => tracing::warn!(broadcast = %broadcast.label(), "stream output not active after start"),
            Err(e) => tracing::warn!(broadcast = %broadcast.label(), error = %e, "could not read stream status after start"),
        }
        Ok(guard)
    }

    fn monitor(&self, guard: &mut SessionGuard, hard_stop: NaiveDateTime) -> Outcome {
        let poll = poll_step(self.cadence.monitor_poll_seconds);
        loop {
            match guard.stream_output_active() {
                Ok(false) => {
                    tracing::info!("stream ended by operator");
                    return Outcome::EndedManually;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "stream status unavailable, leaving monitoring");
                    return Outcome::StatusUnavailable;
                }
                Ok(true) => {}
            }
            if self.clock.now() > hard_stop {
                tracing::info!("maximum duration reached");
                return Outcome::MaxDurationReached;
            }
            self.clock.sleep(to_std(poll));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

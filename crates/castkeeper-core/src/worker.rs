//! The worker's once-a-day run: announce the plan, execute the timeline,
//! report, leave the production tool ready for the next broadcast and mark
//! a clean exit.

use crate::broadcast::{BroadcastRef, ScheduleStore, ScheduledBroadcast};
use crate::clock::Clock;
use crate::config::Config;
use crate::heartbeat::{ExitFlag, HeartbeatPublisher, LifecycleState};
use crate::notify::{NoticeKind, Notifications};
use crate::production::{prepare_broadcast, ProductionTool, SessionGuard};
use crate::timeline::{report::plan_message, DaySummary, Timeline};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

pub struct Worker<'a> {
    config: &'a Config,
    clock: &'a dyn Clock,
    tool: &'a dyn ProductionTool,
    schedule: &'a ScheduleStore,
    heartbeat: &'a HeartbeatPublisher,
    exit_flag: &'a ExitFlag,
    notifications: &'a Notifications,
}

fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN) + Duration::days(1) - Duration::seconds(1)
}

impl<'a> Worker<'a> {
    pub fn new(
        config: &'a Config,
        clock: &'a dyn Clock,
        tool: &'a dyn ProductionTool,
        schedule: &'a ScheduleStore,
        heartbeat: &'a HeartbeatPublisher,
        exit_flag: &'a ExitFlag,
        notifications: &'a Notifications,
    ) -> Self {
        Self {
            config,
            clock,
            tool,
            schedule,
            heartbeat,
            exit_flag,
            notifications,
        }
    }

    /// Run today's schedule to completion. Failures scoped to the day are
    /// logged and reported; the run always ends with `planned_exit`.
    pub fn run_day(&self) -> DaySummary {
        let today = self.clock.now().date();
        if let Err(e) = self.exit_flag.clear() {
            tracing::warn!(error = %e, "could not clear exit flag");
        }

        let broadcasts = match self.schedule.for_day(today) {
            Ok(b) => b,
            Err(e) => {
                tracing::error!(date = %today, error = %e, "could not load today's schedule");
                self.notifications
                    .error(&format!("#Error\nSchedule for {today} unreadable: {e}"));
                Vec::new()
            }
        };
        self.declare(
            LifecycleState::Active,
            broadcasts.first().map(ScheduledBroadcast::to_ref),
        );
        tracing::info!(date = %today, count = broadcasts.len(), "day run started");

        self.notifications
            .notify(NoticeKind::DayPlan, &plan_message(today, &broadcasts));

        let following = self.upcoming(end_of_day(today));
        let summary = Timeline::new(
            self.clock,
            self.tool,
            &self.config.obs,
            &self.config.timeline,
            self.notifications,
        )
        .run(today, &broadcasts, following.as_ref());

        self.notifications
            .notify(NoticeKind::DaySummary, &summary.message());

        let next = if summary.executed_count() == 0 {
            // The timeline never touched the tool; prepare it here instead.
            let next = self.upcoming(self.clock.now());
            if let Some(b) = &next {
                self.prepare(b);
            }
            next
        } else {
            following
        };

        if let Err(e) = self.exit_flag.set() {
            tracing::warn!(error = %e, "could not set exit flag");
        }
        self.declare(
            LifecycleState::PlannedExit,
            next.as_ref().map(ScheduledBroadcast::to_ref),
        );
        tracing::info!(
            date = %today,
            executed = summary.executed_count(),
            "day run finished"
        );
        summary
    }

    fn upcoming(&self, after: NaiveDateTime) -> Option<ScheduledBroadcast> {
        match self.schedule.next_after(after) {
            Ok(next) => next,
            Err(e) => {
                tracing::warn!(error = %e, "could not look up the next broadcast");
                None
            }
        }
    }

    fn prepare(&self, broadcast: &ScheduledBroadcast) {
        let mut guard = match SessionGuard::acquire(self.tool) {
            Ok(g) => g,
            Err(e) => {
                tracing::warn!(error = %e, "production tool unreachable, next broadcast not prepared");
                return;
            }
        };
        if let Err(e) = prepare_broadcast(&mut *guard, &self.config.obs, broadcast) {
            tracing::warn!(broadcast = %broadcast.label(), error = %e, "preparing next broadcast failed");
            self.notifications.error(&format!(
                "#Error\nCould not prepare {} {}: {e}",
                broadcast.date,
                broadcast.label()
            ));
        }
        guard.release();
    }

    fn declare(&self, state: LifecycleState, next: Option<BroadcastRef>) {
        if let Err(e) = self.heartbeat.declare(state, next) {
            tracing::warn!(?state, error = %e, "heartbeat write failed");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

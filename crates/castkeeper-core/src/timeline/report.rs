//! What a day run did, and the plain-text messages built from it.

use crate::broadcast::ScheduledBroadcast;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fmt;

/// States a broadcast passes through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Pending,
    WaitingForPrestart,
    Configuring,
    WaitingForLiveWindow,
    Live,
    Monitoring,
    Ended,
}

/// Production-tool step that failed while configuring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Connect,
    OverlayText,
    PrerollScene,
    Destination,
    StartStream,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Connect => "connect",
            Stage::OverlayText => "overlay text",
            Stage::PrerollScene => "pre-roll scene",
            Stage::Destination => "stream destination",
            Stage::StartStream => "start stream",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    EndedManually,
    MaxDurationReached,
    StatusUnavailable,
    Failed { stage: Stage, error: String },
    SkippedStale,
}

impl Outcome {
    /// True when the stream actually went out.
    pub fn executed(&self) -> bool {
        matches!(
            self,
            Outcome::EndedManually | Outcome::MaxDurationReached | Outcome::StatusUnavailable
        )
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::EndedManually => f.write_str("ended manually"),
            Outcome::MaxDurationReached => f.write_str("max duration reached"),
            Outcome::StatusUnavailable => f.write_str("stream status unavailable"),
            Outcome::Failed { stage, error } => write!(f, "failed at {stage}: {error}"),
            Outcome::SkippedStale => f.write_str("skipped, too old"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BroadcastReport {
    pub title: String,
    pub scheduled: NaiveDateTime,
    pub started_at: Option<NaiveDateTime>,
    pub ended_at: Option<NaiveDateTime>,
    pub outcome: Outcome,
    pub phases: Vec<Phase>,
}

impl BroadcastReport {
    pub fn duration(&self) -> Option<Duration> {
        Some(self.ended_at? - self.started_at?)
    }
}

/// A broadcast configured later than its pre-roll instant because the
/// previous one was still on air.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DelayReport {
    pub title: String,
    pub blocked_by: String,
    pub planned_prestart: NaiveDateTime,
    pub configured_at: NaiveDateTime,
}

impl DelayReport {
    pub fn delay(&self) -> Duration {
        self.configured_at - self.planned_prestart
    }

    pub fn message(&self) -> String {
        format!(
            "#Delay\n{} started {} min late: '{}' was still on air",
            self.title,
            self.delay().num_minutes(),
            self.blocked_by
        )
    }
}

/// Two consecutive broadcasts whose windows collide on paper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overlap {
    pub earlier: String,
    pub later: String,
}

impl Overlap {
    pub fn message(&self) -> String {
        format!(
            "#Overlap\n'{}' is scheduled before '{}' can finish; it will start late",
            self.later, self.earlier
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub broadcasts: Vec<BroadcastReport>,
    pub delays: Vec<DelayReport>,
    pub overlaps: Vec<Overlap>,
}

impl DaySummary {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            broadcasts: Vec::new(),
            delays: Vec::new(),
            overlaps: Vec::new(),
        }
    }

    pub fn executed(&self) -> impl Iterator<Item = &BroadcastReport> {
        self.broadcasts.iter().filter(|b| b.outcome.executed())
    }

    pub fn executed_count(&self) -> usize {
        self.executed().count()
    }

    /// End-of-day message: one line per executed broadcast, then anything
    /// that went wrong.
    pub fn message(&self) -> String {
        let mut msg = format!("#Summary\n{} day run finished\n", self.date);
        let executed: Vec<_> = self.executed().collect();
        if executed.is_empty() {
            msg.push_str("No broadcast ran today.\n");
        } else {
            msg.push_str(&format!("{} broadcast(s) executed:\n", executed.len()));
            for b in executed {
                let (Some(start), Some(end)) = (b.started_at, b.ended_at) else {
                    continue;
                };
                msg.push_str(&format!(
                    "- {}-{} {} ({}, {})\n",
                    start.format("%H:%M"),
                    end.format("%H:%M"),
                    b.title,
                    format_duration(end - start),
                    b.outcome
                ));
            }
        }
        for b in self.broadcasts.iter().filter(|b| !b.outcome.executed()) {
            msg.push_str(&format!(
                "- {} {}: {}\n",
                b.scheduled.format("%H:%M"),
                b.title,
                b.outcome
            ));
        }
        for d in &self.delays {
            msg.push_str(&format!(
                "- {} delayed {} min\n",
                d.title,
                d.delay().num_minutes()
            ));
        }
        msg
    }
}

/// Morning message listing the day's plan.
pub fn plan_message(date: NaiveDate, broadcasts: &[ScheduledBroadcast]) -> String {
    if broadcasts.is_empty() {
        return format!("#Next\nNothing scheduled for {date}.");
    }
    let mut msg = format!("#Next\nScheduled for {date}:\n");
    for b in broadcasts {
        msg.push_str(&b.label());
        msg.push('\n');
        if !b.watch_url.is_empty() {
            msg.push_str(&b.watch_url);
            msg.push('\n');
        }
    }
    msg
}

/// `H:MM:SS`
pub fn format_duration(d: Duration) -> String {
    let secs = d.num_seconds().max(0);
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

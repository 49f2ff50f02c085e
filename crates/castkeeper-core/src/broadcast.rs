//! Scheduled broadcasts and the per-month schedule files they live in.
//!
//! The planning step writes `data/streams_YYYY-MM.yaml`; everything in this
//! crate only reads it (apart from [`ScheduleStore::append`], which keeps the
//! identity invariant for tools that add entries).

use crate::error::{CastkeeperError, Result};
use crate::paths;
use chrono::{Datelike, Months, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ScheduledBroadcast
// ---------------------------------------------------------------------------

/// One planned live event.
///
/// Identity is `(date, time, title)`; it is unique within a day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledBroadcast {
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub title: String,
    #[serde(default)]
    pub location: String,
    /// Ingest endpoint, e.g. `rtmp://a.rtmp.youtube.com/live2`.
    #[serde(alias = "url")]
    pub ingest_url: String,
    #[serde(alias = "key")]
    pub ingest_key: String,
    /// Public watch URL; its last path segment is the broadcast id.
    #[serde(default, alias = "video_url")]
    pub watch_url: String,
}

impl ScheduledBroadcast {
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    pub fn identity(&self) -> (NaiveDate, NaiveTime, &str) {
        (self.date, self.time, self.title.as_str())
    }

    /// Trailing path segment of the watch URL, or `None` when there is none.
    pub fn broadcast_id(&self) -> Option<String> {
        broadcast_id_from_url(&self.watch_url)
    }

    /// Title/time text for the production tool's overlay.
    pub fn overlay_text(&self) -> String {
        format!("{}\n{} Uhr", self.title, self.time.format("%H:%M"))
    }

    pub fn to_ref(&self) -> BroadcastRef {
        BroadcastRef {
            date: self.date,
            time: self.time,
            key: self.ingest_key.clone(),
            title: self.title.clone(),
            watch_url: self.watch_url.clone(),
        }
    }

    /// `HH:MM title` line used in notifications and logs.
    pub fn label(&self) -> String {
        format!("{} {}", self.time.format("%H:%M"), self.title)
    }
}

/// Extract the broadcast id from a watch URL such as
/// `https://youtube.com/live/AbC123?feature=share`.
pub fn broadcast_id_from_url(url: &str) -> Option<String> {
    let url = url.trim();
    let without_suffix = url
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('/');
    let id = without_suffix.rsplit('/').next().unwrap_or_default();
    if id.is_empty() || id.contains(':') {
        None
    } else {
        Some(id.to_string())
    }
}

// ---------------------------------------------------------------------------
// BroadcastRef
// ---------------------------------------------------------------------------

/// Projection of a broadcast carried in heartbeat records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastRef {
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    #[serde(default)]
    pub key: String,
    pub title: String,
    #[serde(default)]
    pub watch_url: String,
}

// ---------------------------------------------------------------------------
// ScheduleStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
struct MonthFile {
    #[serde(default)]
    streams: Vec<ScheduledBroadcast>,
}

/// Read access to the per-month schedule files under `data_dir`.
#[derive(Debug, Clone)]
pub struct ScheduleStore {
    data_dir: PathBuf,
}

impl ScheduleStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// All broadcasts in the month containing `date`. A missing file is an
    /// empty month.
    pub fn load_month(&self, date: NaiveDate) -> Result<Vec<ScheduledBroadcast>> {
        let path = paths::schedule_path(&self.data_dir, date);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = std::fs::read_to_string(&path)?;
        let file: MonthFile = serde_yaml::from_str(&data).map_err(|e| {
            CastkeeperError::InvalidSchedule(format!("{}: {e}", path.display()))
        })?;
        Ok(file.streams)
    }

    /// Broadcasts on `date`, ascending by start time.
    pub fn for_day(&self, date: NaiveDate) -> Result<Vec<ScheduledBroadcast>> {
        let mut day: Vec<_> = self
            .load_month(date)?
            .into_iter()
            .filter(|b| b.date == date)
            .collect();
        day.sort_by_key(|b| b.starts_at());
        warn_duplicates(dedupe_by_identity(&mut day));
        Ok(day)
    }

    /// Broadcasts starting in `[from, to]`, ascending by start time.
    pub fn between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<ScheduledBroadcast>> {
        let mut out = Vec::new();
        let mut month = first_of_month(from.date());
        let last = first_of_month(to.date());
        while month <= last {
            out.extend(
                self.load_month(month)?
                    .into_iter()
                    .filter(|b| b.starts_at() >= from && b.starts_at() <= to),
            );
            month = match month.checked_add_months(Months::new(1)) {
                Some(m) => m,
                None => break,
            };
        }
        out.sort_by_key(|b| b.starts_at());
        warn_duplicates(dedupe_by_identity(&mut out));
        Ok(out)
    }

    /// The first broadcast starting strictly after `after`, looking at the
    /// current and the following month.
    pub fn next_after(&self, after: NaiveDateTime) -> Result<Option<ScheduledBroadcast>> {
        let horizon = first_of_month(after.date())
            .checked_add_months(Months::new(2))
            .map(|d| d.and_time(NaiveTime::MIN))
            .unwrap_or(after);
        Ok(self
            .between(after, horizon)?
            .into_iter()
            .find(|b| b.starts_at() > after))
    }

    /// Add a broadcast to its month file. Returns `false` if an entry with the
    /// same identity already exists.
    pub fn append(&self, broadcast: &ScheduledBroadcast) -> Result<bool> {
        let mut streams = self.load_month(broadcast.date)?;
        if streams.iter().any(|b| b.identity() == broadcast.identity()) {
            return Ok(false);
        }
        streams.push(broadcast.clone());
        streams.sort_by_key(|b| b.starts_at());
        let path = paths::schedule_path(&self.data_dir, broadcast.date);
        let data = serde_yaml::to_string(&MonthFile { streams })?;
        crate::io::atomic_write(&path, data.as_bytes())?;
        Ok(true)
    }
}

/// Keep the first entry of each `(date, time, title)` and return the
/// repeats that were dropped. Order of the kept entries is preserved.
pub fn dedupe_by_identity(broadcasts: &mut Vec<ScheduledBroadcast>) -> Vec<ScheduledBroadcast> {
    let mut seen = HashSet::new();
    let mut dropped = Vec::new();
    broadcasts.retain(|b| {
        if seen.insert((b.date, b.time, b.title.clone())) {
            true
        } else {
            dropped.push(b.clone());
            false
        }
    });
    dropped
}

fn warn_duplicates(dropped: Vec<ScheduledBroadcast>) {
    for b in dropped {
        tracing::warn!(date = %b.date, broadcast = %b.label(), "duplicate schedule entry ignored");
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

// ---------------------------------------------------------------------------
// Serde helper for `HH:MM` times
// ---------------------------------------------------------------------------

pub(crate) mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.serialize_str(&t.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D>(d: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(d)?;
        let raw = raw.trim();
        NaiveTime::parse_from_str(raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
            .map_err(|e| serde::de::Error::custom(format!("invalid time '{raw}': {e}")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

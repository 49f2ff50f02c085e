use crate::output::{print_json, print_table};
use crate::services;
use anyhow::{bail, Context};
use castkeeper_core::broadcast::{ScheduleStore, ScheduledBroadcast};
use castkeeper_core::timeline::detect_overlaps;
use chrono::{Duration, Local, NaiveDate, NaiveTime};
use clap::Subcommand;
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ScheduleSubcommand {
    /// List broadcasts for a day (default: today)
    List {
        /// Day to list (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Number of days to include
        #[arg(long, default_value = "1")]
        days: u32,
    },

    /// Show the next upcoming broadcast
    Next,

    /// Report broadcasts whose pre-roll collides with the previous one
    Check {
        /// Day to check (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Add a broadcast to its month file
    Add {
        /// Day (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        /// Local start time (HH:MM)
        #[arg(long)]
        time: String,
        #[arg(long)]
        title: String,
        /// Ingest endpoint, e.g. rtmp://a.rtmp.youtube.com/live2
        #[arg(long)]
        url: String,
        /// Ingest stream key
        #[arg(long)]
        key: String,
        /// Public watch URL
        #[arg(long, default_value = "")]
        watch_url: String,
        #[arg(long, default_value = "")]
        location: String,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: ScheduleSubcommand, json: bool) -> anyhow::Result<()> {
    let config = services::load_config(root)?;
    let store = ScheduleStore::new(config.data_dir(root));
    let today = Local::now().date_naive();
    match subcmd {
        ScheduleSubcommand::List { date, days } => list(&store, date.unwrap_or(today), days, json),
        ScheduleSubcommand::Next => next(&store, json),
        ScheduleSubcommand::Check { date } => {
            check(&store, date.unwrap_or(today), config.obs.prestart_offset(), json)
        }
        ScheduleSubcommand::Add {
            date,
            time,
            title,
            url,
            key,
            watch_url,
            location,
        } => {
            let time = NaiveTime::parse_from_str(&time, "%H:%M")
                .with_context(|| format!("invalid time '{time}', expected HH:MM"))?;
            add(
                &store,
                ScheduledBroadcast {
                    date,
                    time,
                    title,
                    location,
                    ingest_url: url,
                    ingest_key: key,
                    watch_url,
                },
                json,
            )
        }
    }
}

fn rows(broadcasts: &[ScheduledBroadcast]) -> Vec<Vec<String>> {
    broadcasts
        .iter()
        .map(|b| {
            vec![
                b.date.to_string(),
                b.time.format("%H:%M").to_string(),
                b.title.clone(),
                b.location.clone(),
                b.watch_url.clone(),
            ]
        })
        .collect()
}

const HEADERS: [&str; 5] = ["DATE", "TIME", "TITLE", "LOCATION", "WATCH URL"];

// ---------------------------------------------------------------------------
// list / next
// ---------------------------------------------------------------------------

fn list(store: &ScheduleStore, from: NaiveDate, days: u32, json: bool) -> anyhow::Result<()> {
    let start = from.and_time(NaiveTime::MIN);
    let end = start + Duration::days(i64::from(days.max(1))) - Duration::seconds(1);
    let broadcasts = store.between(start, end)?;
    if json {
        return print_json(&broadcasts);
    }
    if broadcasts.is_empty() {
        println!("No broadcasts scheduled.");
        return Ok(());
    }
    print_table(&HEADERS, rows(&broadcasts));
    Ok(())
}

fn next(store: &ScheduleStore, json: bool) -> anyhow::Result<()> {
    let next = store.next_after(Local::now().naive_local())?;
    if json {
        return print_json(&next);
    }
    match next {
        Some(b) => print_table(&HEADERS, rows(&[b])),
        None => println!("No upcoming broadcast."),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

fn check(
    store: &ScheduleStore,
    date: NaiveDate,
    prestart_offset: Duration,
    json: bool,
) -> anyhow::Result<()> {
    let day = store.for_day(date)?;
    let overlaps = detect_overlaps(&day, prestart_offset);
    if json {
        print_json(&serde_json::json!({ "date": date, "overlaps": overlaps }))?;
    } else if overlaps.is_empty() {
        println!("{date}: {} broadcast(s), no overlaps.", day.len());
    } else {
        for o in &overlaps {
            println!("[overlap] '{}' starts before '{}' can finish", o.later, o.earlier);
        }
    }
    if !overlaps.is_empty() {
        bail!("{} overlapping broadcast(s) on {date}", overlaps.len());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// add
// ---------------------------------------------------------------------------

fn add(store: &ScheduleStore, broadcast: ScheduledBroadcast, json: bool) -> anyhow::Result<()> {
    if broadcast.title.trim().is_empty() {
        bail!("title must not be empty");
    }
    let added = store.append(&broadcast)?;
    if json {
        return print_json(&serde_json::json!({ "added": added, "broadcast": broadcast }));
    }
    if added {
        println!("Added {} {}", broadcast.date, broadcast.label());
    } else {
        println!(
            "{} {} already scheduled, nothing changed.",
            broadcast.date,
            broadcast.label()
        );
    }
    Ok(())
}

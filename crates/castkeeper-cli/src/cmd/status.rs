use crate::output::{print_json, print_table};
use crate::services;
use castkeeper_core::heartbeat::{classify_liveness, peer_health, ExitFlag, HeartbeatStore, ProcessRole};
use chrono::Utc;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = services::load_config(root)?;
    let store = HeartbeatStore::new(config.status_dir(root));
    let exit_flag = ExitFlag::new(&config.flags_dir(root));
    let threshold = config.heartbeat.staleness();
    let now = Utc::now();

    let worker = store.read(ProcessRole::Worker);
    let dashboard = store.read(ProcessRole::Dashboard);
    let worker_health = peer_health(worker.as_ref(), exit_flag.is_set(), threshold, now);
    let dashboard_liveness = classify_liveness(dashboard.as_ref(), threshold, now);

    if json {
        let value = serde_json::json!({
            "worker": {
                "health": worker_health,
                "heartbeat": worker,
                "exit_flag": exit_flag.is_set(),
            },
            "dashboard": {
                "liveness": dashboard_liveness,
                "heartbeat": dashboard,
            },
        });
        return print_json(&value);
    }

    let age = |ts: chrono::DateTime<Utc>| format!("{}s ago", (now - ts).num_seconds());
    let mut rows = Vec::new();
    for (role, record, health) in [
        (ProcessRole::Worker, &worker, worker_health.to_string()),
        (
            ProcessRole::Dashboard,
            &dashboard,
            dashboard_liveness.as_str().to_string(),
        ),
    ] {
        rows.push(vec![
            role.to_string(),
            health,
            record
                .as_ref()
                .map(|r| r.state.as_str().to_string())
                .unwrap_or_else(|| "-".into()),
            record
                .as_ref()
                .map(|r| age(r.timestamp))
                .unwrap_or_else(|| "never".into()),
            record
                .as_ref()
                .and_then(|r| r.next_broadcast.as_ref())
                .map(|b| format!("{} {} {}", b.date, b.time.format("%H:%M"), b.title))
                .unwrap_or_else(|| "-".into()),
        ]);
    }
    print_table(&["PROCESS", "HEALTH", "STATE", "LAST BEAT", "NEXT"], rows);
    Ok(())
}

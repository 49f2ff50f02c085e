#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn castkeeper(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("castkeeper").unwrap();
    cmd.current_dir(dir.path())
        .env("CASTKEEPER_ROOT", dir.path())
        .env_remove("RUST_LOG");
    cmd
}

fn add_broadcast(dir: &TempDir, date: &str, time: &str, title: &str) {
    castkeeper(dir)
        .args([
            "schedule",
            "add",
            "--date",
            date,
            "--time",
            time,
            "--title",
            title,
            "--url",
            "rtmp://a.rtmp.youtube.com/live2",
            "--key",
            "abcd-efgh",
            "--watch-url",
            "https://youtube.com/live/xyz123",
        ])
        .assert()
        .success();
}

// ---------------------------------------------------------------------------
// castkeeper config
// ---------------------------------------------------------------------------

#[test]
fn config_init_writes_defaults() {
    let dir = TempDir::new().unwrap();
    castkeeper(&dir).args(["config", "init"]).assert().success();

    let content = std::fs::read_to_string(dir.path().join("config.yaml")).unwrap();
    let yaml: serde_yaml::Value = serde_yaml::from_str(&content).unwrap();
    assert_eq!(yaml["obs"]["scene_live"], "Gottesdienst");
    assert_eq!(yaml["heartbeat"]["staleness_seconds"], 90);
}

#[test]
fn config_init_refuses_to_overwrite() {
    let dir = TempDir::new().unwrap();
    castkeeper(&dir).args(["config", "init"]).assert().success();
    castkeeper(&dir)
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    castkeeper(&dir)
        .args(["config", "init", "--force"])
        .assert()
        .success();
}

#[test]
fn config_check_without_file_fails() {
    let dir = TempDir::new().unwrap();
    castkeeper(&dir)
        .args(["config", "check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config not found"));
}

#[test]
fn config_check_reports_errors() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("config.yaml"),
        "obs:\n  scene_start: Same\n  scene_live: Same\n",
    )
    .unwrap();
    castkeeper(&dir)
        .args(["config", "check"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error]"));
}

#[test]
fn worker_refuses_to_start_on_config_errors() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("config.yaml"),
        "obs:\n  scene_start: Same\n  scene_live: Same\n",
    )
    .unwrap();
    castkeeper(&dir)
        .args(["worker", "--no-watchdog"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("refusing to start"));
    assert!(!dir.path().join("status/worker_heartbeat.json").exists());
}

#[test]
fn config_show_json() {
    let dir = TempDir::new().unwrap();
    let output = castkeeper(&dir)
        .args(["config", "show", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["dashboard"]["refresh_seconds"], 10);
}

// ---------------------------------------------------------------------------
// castkeeper schedule
// ---------------------------------------------------------------------------

#[test]
fn schedule_add_and_list() {
    let dir = TempDir::new().unwrap();
    add_broadcast(&dir, "2031-05-04", "10:00", "Hochamt");
    add_broadcast(&dir, "2031-05-04", "18:30", "Vesper");

    assert!(dir.path().join("data/streams_2031-05.yaml").exists());

    castkeeper(&dir)
        .args(["schedule", "list", "--date", "2031-05-04"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Hochamt"))
        .stdout(predicate::str::contains("18:30"));
}

#[test]
fn schedule_add_is_idempotent() {
    let dir = TempDir::new().unwrap();
    add_broadcast(&dir, "2031-05-04", "10:00", "Hochamt");
    castkeeper(&dir)
        .args([
            "schedule", "add", "--date", "2031-05-04", "--time", "10:00", "--title", "Hochamt",
            "--url", "rtmp://x", "--key", "k",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("already scheduled"));

    let output = castkeeper(&dir)
        .args(["schedule", "list", "--date", "2031-05-04", "--json"])
        .output()
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 1);
}

#[test]
fn schedule_add_rejects_bad_time() {
    let dir = TempDir::new().unwrap();
    castkeeper(&dir)
        .args([
            "schedule", "add", "--date", "2031-05-04", "--time", "25:99", "--title", "X", "--url",
            "rtmp://x", "--key", "k",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected HH:MM"));
}

#[test]
fn schedule_check_flags_overlaps() {
    let dir = TempDir::new().unwrap();
    add_broadcast(&dir, "2031-05-04", "09:00", "Laudes");
    add_broadcast(&dir, "2031-05-04", "09:05", "Messe");

    castkeeper(&dir)
        .args(["schedule", "check", "--date", "2031-05-04"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[overlap]"));
}

#[test]
fn schedule_next_finds_future_broadcast() {
    let dir = TempDir::new().unwrap();
    let date = (chrono::Local::now().date_naive() + chrono::Duration::days(3))
        .format("%Y-%m-%d")
        .to_string();
    add_broadcast(&dir, &date, "11:00", "Festgottesdienst");

    castkeeper(&dir)
        .args(["schedule", "next"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Festgottesdienst"));
}

// ---------------------------------------------------------------------------
// castkeeper status
// ---------------------------------------------------------------------------

#[test]
fn status_without_heartbeats_shows_crashed_worker() {
    let dir = TempDir::new().unwrap();
    let output = castkeeper(&dir).args(["status", "--json"]).output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["worker"]["health"], "crashed");
    assert_eq!(json["dashboard"]["liveness"], "unknown");
}

#[test]
fn status_table_lists_both_processes() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("runtime_flags")).unwrap();
    std::fs::write(dir.path().join("runtime_flags/worker_done.flag"), "done\n").unwrap();

    castkeeper(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("worker"))
        .stdout(predicate::str::contains("exited-cleanly"))
        .stdout(predicate::str::contains("dashboard"));
}

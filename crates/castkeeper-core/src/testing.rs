//! In-memory fakes for the traits at the crate's seams.
//!
//! Compiled for this crate's tests and, with the `testing` feature, for other
//! crates' tests.

use crate::clock::Clock;
use crate::error::{CastkeeperError, Result};
use crate::notify::Notifier;
use crate::process::ProcessRegistry;
use crate::production::{ProductionSession, ProductionTool, StreamDestination};
use crate::youtube::{LifecycleStatus, LifecycleStatusSource};
use chrono::{Duration, NaiveDateTime};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

// ---------------------------------------------------------------------------
// SimClock
// ---------------------------------------------------------------------------

/// Simulated wall clock: `sleep` advances time instantly.
#[derive(Debug)]
pub struct SimClock {
    now: Mutex<NaiveDateTime>,
}

impl SimClock {
    pub fn at(start: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        *lock(&self.now) += by;
    }
}

impl Clock for SimClock {
    fn now(&self) -> NaiveDateTime {
        *lock(&self.now)
    }

    fn sleep(&self, duration: std::time::Duration) {
        let by = Duration::from_std(duration).unwrap_or(Duration::zero());
        self.advance(by);
    }
}

// ---------------------------------------------------------------------------
// FakeRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct FakeRegistry {
    running: Mutex<HashSet<String>>,
    spawned: Mutex<Vec<Vec<String>>>,
    terminations: AtomicUsize,
    fail_spawn: AtomicBool,
}

impl FakeRegistry {
    pub fn set_running(&self, marker: &str, running: bool) {
        let mut set = lock(&self.running);
        if running {
            set.insert(marker.to_string());
        } else {
            set.remove(marker);
        }
    }

    pub fn fail_spawns(&self, fail: bool) {
        self.fail_spawn.store(fail, Ordering::SeqCst);
    }

    pub fn spawn_count(&self) -> usize {
        lock(&self.spawned).len()
    }

    pub fn spawned_commands(&self) -> Vec<Vec<String>> {
        lock(&self.spawned).clone()
    }

    pub fn terminate_count(&self) -> usize {
        self.terminations.load(Ordering::SeqCst)
    }
}

impl ProcessRegistry for FakeRegistry {
    fn is_running(&self, marker: &str) -> bool {
        lock(&self.running).contains(marker)
    }

    fn terminate_all(&self, _marker: &str) -> usize {
        self.terminations.fetch_add(1, Ordering::SeqCst);
        0
    }

    fn spawn(&self, command: &[String]) -> Result<u32> {
        if self.fail_spawn.load(Ordering::SeqCst) {
            return Err(CastkeeperError::Spawn {
                command: command.join(" "),
                reason: "spawn disabled".into(),
            });
        }
        let mut spawned = lock(&self.spawned);
        spawned.push(command.to_vec());
        Ok(40_000 + spawned.len() as u32)
    }
}

// ---------------------------------------------------------------------------
// FakeProductionTool
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    Connect,
    SetText { source: String, text: String },
    SwitchScene(String),
    CurrentScene,
    SetDestination(StreamDestination),
    ReadDestination,
    StartStream,
    OutputActive,
    Close,
}

#[derive(Debug)]
struct ToolState {
    calls: Vec<(Option<NaiveDateTime>, ToolCall)>,
    scene: String,
    destination: StreamDestination,
    streaming: bool,
    stream_runs_for: Option<Duration>,
    active_until: Option<NaiveDateTime>,
    fail_always: HashSet<String>,
    fail_once: HashSet<String>,
    fail_connect: bool,
    corrupt_readback: bool,
    connects: usize,
    open: usize,
}

/// Recording production tool. Operation names accepted by `fail_next` /
/// `fail_always` match the trait method names; `switch_scene:<name>` fails
/// only switches to that scene.
#[derive(Debug, Clone)]
pub struct FakeProductionTool {
    state: Arc<Mutex<ToolState>>,
    clock: Option<Arc<SimClock>>,
}

impl Default for FakeProductionTool {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeProductionTool {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ToolState {
                calls: Vec::new(),
                scene: String::new(),
                destination: StreamDestination {
                    server: String::new(),
                    key: String::new(),
                },
                streaming: false,
                stream_runs_for: None,
                active_until: None,
                fail_always: HashSet::new(),
                fail_once: HashSet::new(),
                fail_connect: false,
                corrupt_readback: false,
                connects: 0,
                open: 0,
            })),
            clock: None,
        }
    }

    /// Timestamp calls with `clock` and end each stream `runs_for` after it
    /// was started.
    pub fn with_clock(mut self, clock: Arc<SimClock>, runs_for: Duration) -> Self {
        lock(&self.state).stream_runs_for = Some(runs_for);
        self.clock = Some(clock);
        self
    }

    pub fn set_scene(&self, scene: &str) {
        lock(&self.state).scene = scene.to_string();
    }

    pub fn stop_stream(&self) {
        let mut s = lock(&self.state);
        s.streaming = false;
        s.active_until = None;
    }

    pub fn fail_next(&self, op: &str) {
        lock(&self.state).fail_once.insert(op.to_string());
    }

    pub fn fail_always(&self, op: &str) {
        lock(&self.state).fail_always.insert(op.to_string());
    }

    pub fn fail_connect(&self, fail: bool) {
        lock(&self.state).fail_connect = fail;
    }

    pub fn corrupt_destination_readback(&self, corrupt: bool) {
        lock(&self.state).corrupt_readback = corrupt;
    }

    pub fn calls(&self) -> Vec<ToolCall> {
        lock(&self.state).calls.iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn timed_calls(&self) -> Vec<(Option<NaiveDateTime>, ToolCall)> {
        lock(&self.state).calls.clone()
    }

    pub fn connect_count(&self) -> usize {
        lock(&self.state).connects
    }

    pub fn open_sessions(&self) -> usize {
        lock(&self.state).open
    }
}

impl ProductionTool for FakeProductionTool {
    fn connect(&self) -> Result<Box<dyn ProductionSession>> {
        let now = self.clock.as_ref().map(|c| c.now());
        let mut s = lock(&self.state);
        if s.fail_connect {
            return Err(CastkeeperError::Production("connection refused".into()));
        }
        s.connects += 1;
        s.open += 1;
        s.calls.push((now, ToolCall::Connect));
        Ok(Box::new(FakeSession {
            tool: self.clone(),
            closed: false,
        }))
    }
}

struct FakeSession {
    tool: FakeProductionTool,
    closed: bool,
}

impl FakeSession {
    fn record(&self, op: &str, call: ToolCall) -> Result<std::sync::MutexGuard<'_, ToolState>> {
        let now = self.tool.clock.as_ref().map(|c| c.now());
        let keyed = match &call {
            ToolCall::SwitchScene(scene) => Some(format!("{op}:{scene}")),
            _ => None,
        };
        let mut s = lock(&self.tool.state);
        s.calls.push((now, call));
        let mut fails = s.fail_once.remove(op) || s.fail_always.contains(op);
        if let Some(key) = keyed {
            fails |= s.fail_once.remove(&key) || s.fail_always.contains(&key);
        }
        if fails {
            return Err(CastkeeperError::Production(format!("{op} failed")));
        }
        Ok(s)
    }

    fn now(&self) -> Option<NaiveDateTime> {
        self.tool.clock.as_ref().map(|c| c.now())
    }
}

impl ProductionSession for FakeSession {
    fn set_text(&mut self, source: &str, text: &str) -> Result<()> {
        self.record(
            "set_text",
            ToolCall::SetText {
                source: source.to_string(),
                text: text.to_string(),
            },
        )?;
        Ok(())
    }

    fn switch_scene(&mut self, scene: &str) -> Result<()> {
        let mut s = self.record("switch_scene", ToolCall::SwitchScene(scene.to_string()))?;
        s.scene = scene.to_string();
        Ok(())
    }

    fn current_scene(&mut self) -> Result<String> {
        let s = self.record("current_scene", ToolCall::CurrentScene)?;
        Ok(s.scene.clone())
    }

    fn set_stream_destination(&mut self, destination: &StreamDestination) -> Result<()> {
        let mut s = self.record(
            "set_stream_destination",
            ToolCall::SetDestination(destination.clone()),
        )?;
        s.destination = destination.clone();
        Ok(())
    }

    fn stream_destination(&mut self) -> Result<StreamDestination> {
        let s = self.record("stream_destination", ToolCall::ReadDestination)?;
        let mut dest = s.destination.clone();
        if s.corrupt_readback {
            dest.key.push_str("-stale");
        }
        Ok(dest)
    }

    fn start_stream(&mut self) -> Result<()> {
        let now = self.now();
        let mut s = self.record("start_stream", ToolCall::StartStream)?;
        s.streaming = true;
        s.active_until = match (now, s.stream_runs_for) {
            (Some(now), Some(runs_for)) => Some(now + runs_for),
            _ => None,
        };
        Ok(())
    }

    fn stream_output_active(&mut self) -> Result<bool> {
        let now = self.now();
        let s = self.record("stream_output_active", ToolCall::OutputActive)?;
        Ok(match (s.active_until, now) {
            (Some(until), Some(now)) => s.streaming && now < until,
            _ => s.streaming,
        })
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let now = self.now();
        let mut s = lock(&self.tool.state);
        s.open = s.open.saturating_sub(1);
        s.calls.push((now, ToolCall::Close));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StaticStatusSource
// ---------------------------------------------------------------------------

/// Lifecycle statuses set by the test; unset ids report `Unknown`.
#[derive(Debug, Default)]
pub struct StaticStatusSource {
    statuses: Mutex<HashMap<String, LifecycleStatus>>,
    queries: AtomicUsize,
}

impl StaticStatusSource {
    pub fn set(&self, broadcast_id: &str, status: LifecycleStatus) {
        lock(&self.statuses).insert(broadcast_id.to_string(), status);
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl LifecycleStatusSource for StaticStatusSource {
    fn lifecycle_status(&self, broadcast_id: &str) -> LifecycleStatus {
        self.queries.fetch_add(1, Ordering::SeqCst);
        lock(&self.statuses)
            .get(broadcast_id)
            .copied()
            .unwrap_or(LifecycleStatus::Unknown)
    }
}

// ---------------------------------------------------------------------------
// RecordingNotifier
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        lock(&self.messages).clone()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, text: &str) -> Result<()> {
        lock(&self.messages).push(text.to_string());
        Ok(())
    }
}

//! OS process discovery for peer supervision.
//!
//! Processes are identified by a marker substring of their command line (for
//! example `castkeeper worker`). The [`ProcessRegistry`] trait is the seam the
//! watchdog is tested through.

use crate::error::{CastkeeperError, Result};
use std::net::TcpListener;
use std::process::{Command, Stdio};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System, UpdateKind};

// ---------------------------------------------------------------------------
// ProcessRegistry
// ---------------------------------------------------------------------------

pub trait ProcessRegistry: Send + Sync {
    /// True if any process other than the caller has `marker` in its command line.
    fn is_running(&self, marker: &str) -> bool;

    /// Force-kill every matching process except the caller. Returns how many
    /// were signalled.
    fn terminate_all(&self, marker: &str) -> usize;

    /// Start `command` detached from the caller. Returns the new PID.
    fn spawn(&self, command: &[String]) -> Result<u32>;
}

// ---------------------------------------------------------------------------
// SystemProcessRegistry
// ---------------------------------------------------------------------------

/// [`ProcessRegistry`] backed by the OS process table.
#[derive(Debug, Default)]
pub struct SystemProcessRegistry;

impl SystemProcessRegistry {
    pub fn new() -> Self {
        Self
    }

    fn snapshot() -> System {
        let cmd_only = ProcessRefreshKind::nothing().with_cmd(UpdateKind::Always);
        let mut system = System::new_with_specifics(RefreshKind::nothing());
        system.refresh_processes_specifics(ProcessesToUpdate::All, true, cmd_only);
        system
    }

    fn matching(system: &System, marker: &str) -> Vec<Pid> {
        let me = sysinfo::get_current_pid().ok();
        system
            .processes()
            .iter()
            .filter(|(pid, _)| Some(**pid) != me)
            .filter(|(_, process)| {
                let cmdline = process
                    .cmd()
                    .iter()
                    .map(|part| part.to_string_lossy())
                    .collect::<Vec<_>>()
                    .join(" ");
                cmdline.contains(marker)
            })
            .map(|(pid, _)| *pid)
            .collect()
    }
}

impl ProcessRegistry for SystemProcessRegistry {
    fn is_running(&self, marker: &str) -> bool {
        !Self::matching(&Self::snapshot(), marker).is_empty()
    }

    fn terminate_all(&self, marker: &str) -> usize {
        let system = Self::snapshot();
        let mut killed = 0;
        for pid in Self::matching(&system, marker) {
            let Some(process) = system.process(pid) else {
                continue;
            };
            if process.kill() {
                tracing::warn!(pid = pid.as_u32(), marker, "killed stray process");
                killed += 1;
            } else {
                tracing::warn!(pid = pid.as_u32(), marker, "failed to kill process");
            }
        }
        killed
    }

    fn spawn(&self, command: &[String]) -> Result<u32> {
        let (program, args) = command.split_first().ok_or_else(|| CastkeeperError::Spawn {
            command: String::new(),
            reason: "empty command".into(),
        })?;
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| CastkeeperError::Spawn {
                command: command.join(" "),
                reason: e.to_string(),
            })?;
        let pid = child.id();
        // Reap the child when it exits so it does not linger as a zombie.
        std::thread::Builder::new()
            .name(format!("reap-{pid}"))
            .spawn(move || {
                let _ = child.wait();
            })?;
        Ok(pid)
    }
}

// ---------------------------------------------------------------------------
// InstanceLock
// ---------------------------------------------------------------------------

/// Holds a loopback port for the lifetime of the process so a second worker
/// refuses to start.
#[derive(Debug)]
pub struct InstanceLock {
    _listener: TcpListener,
    port: u16,
}

impl InstanceLock {
    pub fn acquire(port: u16) -> Result<Self> {
        match TcpListener::bind(("127.0.0.1", port)) {
            Ok(listener) => Ok(Self {
                _listener: listener,
                port,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                Err(CastkeeperError::AlreadyRunning(port))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn unknown_marker_is_not_running() {
        let registry = SystemProcessRegistry::new();
        assert!(!registry.is_running("castkeeper-no-such-process-7f3a9"));
        assert_eq!(registry.terminate_all("castkeeper-no-such-process-7f3a9"), 0);
    }

    #[test]
    fn spawn_rejects_empty_command() {
        let registry = SystemProcessRegistry::new();
        assert!(matches!(
            registry.spawn(&[]),
            Err(CastkeeperError::Spawn { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn spawned_process_is_found_and_terminated() {
        let registry = SystemProcessRegistry::new();
        let marker = "sleep 37.25";
        registry
            .spawn(&["sleep".to_string(), "37.25".to_string()])
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(3);
        while !registry.is_running(marker) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(50));
        }
        assert!(registry.is_running(marker));
        assert!(registry.terminate_all(marker) >= 1);
    }

    #[test]
    fn second_lock_on_same_port_is_refused() {
        let first = InstanceLock::acquire(0).unwrap();
        let port = first._listener.local_addr().unwrap().port();
        let err = InstanceLock::acquire(port).unwrap_err();
        assert!(matches!(err, CastkeeperError::AlreadyRunning(p) if p == port));
    }
}

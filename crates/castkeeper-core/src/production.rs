//! Control surface of the external production tool.
//!
//! The timeline only talks to [`ProductionSession`]; `obs` provides the real
//! implementation and `testing` a recording fake.

use crate::broadcast::ScheduledBroadcast;
use crate::config::ObsConfig;
use crate::error::Result;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDestination {
    pub server: String,
    pub key: String,
}

impl StreamDestination {
    pub fn for_broadcast(broadcast: &ScheduledBroadcast) -> Self {
        Self {
            server: broadcast.ingest_url.clone(),
            key: broadcast.ingest_key.clone(),
        }
    }
}

/// One connected session. Every call blocks for at most the tool's request
/// timeout.
pub trait ProductionSession: Send {
    fn set_text(&mut self, source: &str, text: &str) -> Result<()>;
    fn switch_scene(&mut self, scene: &str) -> Result<()>;
    fn current_scene(&mut self) -> Result<String>;
    fn set_stream_destination(&mut self, destination: &StreamDestination) -> Result<()>;
    fn stream_destination(&mut self) -> Result<StreamDestination>;
    fn start_stream(&mut self) -> Result<()>;
    fn stream_output_active(&mut self) -> Result<bool>;
    fn close(&mut self) -> Result<()>;
}

pub trait ProductionTool: Send + Sync {
    fn connect(&self) -> Result<Box<dyn ProductionSession>>;
}

// ---------------------------------------------------------------------------
// SessionGuard
// ---------------------------------------------------------------------------

/// Owns a session and closes it on every exit path.
pub struct SessionGuard {
    session: Box<dyn ProductionSession>,
    released: bool,
}

impl SessionGuard {
    pub fn acquire(tool: &dyn ProductionTool) -> Result<Self> {
        Ok(Self {
            session: tool.connect()?,
            released: false,
        })
    }

    /// Close now and log the outcome.
    pub fn release(mut self) {
        self.close_once();
    }

    fn close_once(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match self.session.close() {
            Ok(()) => tracing::debug!("production session released"),
            Err(e) => tracing::warn!(error = %e, "closing production session failed"),
        }
    }
}

impl Deref for SessionGuard {
    type Target = dyn ProductionSession;

    fn deref(&self) -> &Self::Target {
        &*self.session
    }
}

impl DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.session
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.close_once();
    }
}

// ---------------------------------------------------------------------------
// Shared operations
// ---------------------------------------------------------------------------

/// Push `destination` and read it back. Returns `Ok(false)` when the tool
/// reports different settings than were sent.
pub fn apply_destination(
    session: &mut dyn ProductionSession,
    destination: &StreamDestination,
) -> Result<bool> {
    session.set_stream_destination(destination)?;
    let current = session.stream_destination()?;
    if current.server != destination.server {
        tracing::warn!(
            expected = %destination.server,
            actual = %current.server,
            "stream server read-back mismatch"
        );
        return Ok(false);
    }
    if current.key != destination.key {
        tracing::warn!("stream key read-back mismatch");
        return Ok(false);
    }
    Ok(true)
}

/// Leave the tool ready for `broadcast`: overlay text, destination and the
/// pre-roll scene, without starting the stream.
pub fn prepare_broadcast(
    session: &mut dyn ProductionSession,
    obs: &ObsConfig,
    broadcast: &ScheduledBroadcast,
) -> Result<()> {
    session.set_text(&obs.text_source, &broadcast.overlay_text())?;
    apply_destination(session, &StreamDestination::for_broadcast(broadcast))?;
    session.switch_scene(&obs.scene_start)?;
    tracing::info!(
        title = %broadcast.title,
        time = %broadcast.time.format("%H:%M"),
        watch_url = %broadcast.watch_url,
        "production tool prepared for next broadcast"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// SceneProbe
// ---------------------------------------------------------------------------

/// Long-lived read-only connection used by the dashboard to observe the
/// current program scene. Reconnects lazily after any failure.
pub struct SceneProbe {
    tool: Arc<dyn ProductionTool>,
    session: Option<Box<dyn ProductionSession>>,
}

impl SceneProbe {
    pub fn new(tool: Arc<dyn ProductionTool>) -> Self {
        Self {
            tool,
            session: None,
        }
    }

    /// Current scene name, or `None` when the tool is unreachable.
    pub fn current_scene(&mut self) -> Option<String> {
        if self.session.is_none() {
            match self.tool.connect() {
                Ok(s) => self.session = Some(s),
                Err(e) => {
                    tracing::warn!(error = %e, "production tool unreachable");
                    return None;
                }
            }
        }
        let session = self.session.as_mut()?;
        match session.current_scene() {
            Ok(scene) => Some(scene),
            Err(e) => {
                tracing::warn!(error = %e, "reading current scene failed");
                if let Some(mut dead) = self.session.take() {
                    let _ = dead.close();
                }
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

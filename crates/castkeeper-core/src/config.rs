use crate::error::{CastkeeperError, Result};
use crate::paths;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Durations
// ---------------------------------------------------------------------------

/// Upper bound for any configured offset, interval or window.
pub const MAX_SPAN_SECONDS: i64 = 366 * 24 * 60 * 60;

/// `seconds` as a duration, clamped into `0..=MAX_SPAN_SECONDS`.
pub fn span_seconds(seconds: i64) -> Duration {
    Duration::try_seconds(seconds.clamp(0, MAX_SPAN_SECONDS)).unwrap_or_else(Duration::zero)
}

pub fn span_minutes(minutes: i64) -> Duration {
    span_seconds(minutes.saturating_mul(60))
}

pub fn span_hours(hours: i64) -> Duration {
    span_seconds(hours.saturating_mul(60 * 60))
}

/// Sleep step for a poll loop: at least one second, never past the bound.
pub fn poll_step(seconds: u64) -> Duration {
    span_seconds(i64::try_from(seconds.max(1)).unwrap_or(i64::MAX))
}

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ObsConfig
// ---------------------------------------------------------------------------

/// Production tool (OBS) connection and scene layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObsConfig {
    #[serde(default = "default_obs_host")]
    pub host: String,
    #[serde(default = "default_obs_port")]
    pub port: u16,
    /// Inline password. Prefer `password_file` outside of development.
    #[serde(default)]
    pub password: Option<String>,
    /// JSON file holding `{ "password": "..." }`.
    #[serde(default)]
    pub password_file: Option<PathBuf>,
    #[serde(default = "default_text_source")]
    pub text_source: String,
    /// Pre-roll scene shown while the stream warms up.
    #[serde(default = "default_scene_start")]
    pub scene_start: String,
    /// On-air scene.
    #[serde(default = "default_scene_live")]
    pub scene_live: String,
    #[serde(default = "default_start_offset")]
    pub stream_start_offset_minutes: i64,
    #[serde(default = "default_switch_offset")]
    pub scene_switch_offset_minutes: i64,
    #[serde(default = "default_grace")]
    pub stream_execution_grace_minutes: i64,
    #[serde(default = "default_max_duration")]
    pub max_duration_minutes: i64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_obs_host() -> String {
    "localhost".to_string()
}

fn default_obs_port() -> u16 {
    4455
}

fn default_text_source() -> String {
    "Titel".to_string()
}

fn default_scene_start() -> String {
    "Beginn".to_string()
}

fn default_scene_live() -> String {
    "Gottesdienst".to_string()
}

fn default_start_offset() -> i64 {
    10
}

fn default_switch_offset() -> i64 {
    1
}

fn default_grace() -> i64 {
    5
}

fn default_max_duration() -> i64 {
    180
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    10
}

impl Default for ObsConfig {
    fn default() -> Self {
        Self {
            host: default_obs_host(),
            port: default_obs_port(),
            password: None,
            password_file: None,
            text_source: default_text_source(),
            scene_start: default_scene_start(),
            scene_live: default_scene_live(),
            stream_start_offset_minutes: default_start_offset(),
            scene_switch_offset_minutes: default_switch_offset(),
            stream_execution_grace_minutes: default_grace(),
            max_duration_minutes: default_max_duration(),
            connect_timeout_seconds: default_connect_timeout(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl ObsConfig {
    pub fn prestart_offset(&self) -> Duration {
        span_minutes(self.stream_start_offset_minutes)
    }

    pub fn switch_offset(&self) -> Duration {
        span_minutes(self.scene_switch_offset_minutes)
    }

    pub fn grace(&self) -> Duration {
        span_minutes(self.stream_execution_grace_minutes)
    }

    pub fn max_duration(&self) -> Duration {
        span_minutes(self.max_duration_minutes)
    }
}

// ---------------------------------------------------------------------------
// TimelineConfig
// ---------------------------------------------------------------------------

/// Poll cadence of the worker's wait states.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineConfig {
    #[serde(default = "default_wait_poll")]
    pub wait_poll_seconds: u64,
    #[serde(default = "default_live_poll")]
    pub live_poll_seconds: u64,
    #[serde(default = "default_monitor_poll")]
    pub monitor_poll_seconds: u64,
    #[serde(default = "default_wait_note")]
    pub wait_note_minutes: i64,
    #[serde(default = "default_standby_note")]
    pub standby_note_minutes: i64,
}

fn default_wait_poll() -> u64 {
    60
}

fn default_live_poll() -> u64 {
    5
}

fn default_monitor_poll() -> u64 {
    60
}

fn default_wait_note() -> i64 {
    30
}

fn default_standby_note() -> i64 {
    60
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            wait_poll_seconds: default_wait_poll(),
            live_poll_seconds: default_live_poll(),
            monitor_poll_seconds: default_monitor_poll(),
            wait_note_minutes: default_wait_note(),
            standby_note_minutes: default_standby_note(),
        }
    }
}

// ---------------------------------------------------------------------------
// DashboardConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_dashboard_port")]
    pub port: u16,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Client-side page refresh.
    #[serde(default = "default_refresh")]
    pub refresh_seconds: u64,
    #[serde(default = "default_lead")]
    pub lead_minutes: i64,
    #[serde(default = "default_status_grace")]
    pub grace_seconds: i64,
    #[serde(default = "default_long_grace")]
    pub long_grace_seconds: i64,
    #[serde(default = "default_clear_after")]
    pub clear_after_minutes: i64,
    #[serde(default = "default_error_window")]
    pub error_window_minutes: i64,
    #[serde(default = "default_lookahead")]
    pub lookahead_hours: i64,
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_dashboard_port() -> u16 {
    5000
}

fn default_poll_interval() -> u64 {
    10
}

fn default_refresh() -> u64 {
    10
}

fn default_lead() -> i64 {
    5
}

fn default_status_grace() -> i64 {
    120
}

fn default_long_grace() -> i64 {
    2700
}

fn default_clear_after() -> i64 {
    10
}

fn default_error_window() -> i64 {
    120
}

fn default_lookahead() -> i64 {
    24
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_dashboard_port(),
            poll_interval_seconds: default_poll_interval(),
            refresh_seconds: default_refresh(),
            lead_minutes: default_lead(),
            grace_seconds: default_status_grace(),
            long_grace_seconds: default_long_grace(),
            clear_after_minutes: default_clear_after(),
            error_window_minutes: default_error_window(),
            lookahead_hours: default_lookahead(),
        }
    }
}

// ---------------------------------------------------------------------------
// HeartbeatConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default = "default_staleness")]
    pub staleness_seconds: i64,
    /// Poll interval of the worker's watchdog over the dashboard.
    #[serde(default = "default_worker_watch")]
    pub worker_watch_interval_seconds: u64,
    /// Poll interval of the dashboard's watchdog over the worker.
    #[serde(default = "default_dashboard_watch")]
    pub dashboard_watch_interval_seconds: u64,
}

fn default_staleness() -> i64 {
    90
}

fn default_worker_watch() -> u64 {
    15
}

fn default_dashboard_watch() -> u64 {
    30
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            staleness_seconds: default_staleness(),
            worker_watch_interval_seconds: default_worker_watch(),
            dashboard_watch_interval_seconds: default_dashboard_watch(),
        }
    }
}

impl HeartbeatConfig {
    pub fn staleness(&self) -> Duration {
        span_seconds(self.staleness_seconds)
    }
}

// ---------------------------------------------------------------------------
// WorkerConfig / ProcessesConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Loopback port held for the worker's lifetime to refuse double starts.
    #[serde(default = "default_lock_port")]
    pub lock_port: u16,
}

fn default_lock_port() -> u16 {
    65432
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            lock_port: default_lock_port(),
        }
    }
}

/// How each process finds and respawns its peer.
///
/// Empty commands mean "re-run the current executable with the matching
/// subcommand"; the CLI fills them in at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessesConfig {
    #[serde(default = "default_worker_marker")]
    pub worker_marker: String,
    #[serde(default = "default_dashboard_marker")]
    pub dashboard_marker: String,
    #[serde(default)]
    pub worker_command: Vec<String>,
    #[serde(default)]
    pub dashboard_command: Vec<String>,
}

fn default_worker_marker() -> String {
    "castkeeper worker".to_string()
}

fn default_dashboard_marker() -> String {
    "castkeeper dashboard".to_string()
}

impl Default for ProcessesConfig {
    fn default() -> Self {
        Self {
            worker_marker: default_worker_marker(),
            dashboard_marker: default_dashboard_marker(),
            worker_command: Vec::new(),
            dashboard_command: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// TelegramConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub chat_id: Option<String>,
    /// JSON file holding `{ "token": "...", "chat_id": "..." }`.
    #[serde(default)]
    pub credentials_file: Option<PathBuf>,
    #[serde(default = "default_telegram_api")]
    pub api_base: String,
    #[serde(default = "default_true")]
    pub notify_errors: bool,
    #[serde(default = "default_true")]
    pub notify_next_today: bool,
    #[serde(default = "default_true")]
    pub notify_summary_end: bool,
    #[serde(default = "default_http_timeout")]
    pub timeout_seconds: u64,
}

fn default_telegram_api() -> String {
    "https://api.telegram.org".to_string()
}

fn default_true() -> bool {
    true
}

fn default_http_timeout() -> u64 {
    10
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: None,
            chat_id: None,
            credentials_file: None,
            api_base: default_telegram_api(),
            notify_errors: true,
            notify_next_today: true,
            notify_summary_end: true,
            timeout_seconds: default_http_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// YouTubeConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YouTubeConfig {
    /// Authorized-user token file (`token`, `refresh_token`, `client_id`,
    /// `client_secret`).
    #[serde(default)]
    pub token_file: Option<PathBuf>,
    #[serde(default = "default_youtube_api")]
    pub api_base: String,
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,
    #[serde(default = "default_http_timeout")]
    pub timeout_seconds: u64,
}

fn default_youtube_api() -> String {
    "https://www.googleapis.com/youtube/v3".to_string()
}

fn default_token_endpoint() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            token_file: None,
            api_base: default_youtube_api(),
            token_endpoint: default_token_endpoint(),
            timeout_seconds: default_http_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// PathsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_status_dir")]
    pub status_dir: PathBuf,
    #[serde(default = "default_flags_dir")]
    pub flags_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(paths::DEFAULT_DATA_DIR)
}

fn default_status_dir() -> PathBuf {
    PathBuf::from(paths::DEFAULT_STATUS_DIR)
}

fn default_flags_dir() -> PathBuf {
    PathBuf::from(paths::DEFAULT_FLAGS_DIR)
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            status_dir: default_status_dir(),
            flags_dir: default_flags_dir(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub obs: ObsConfig,
    #[serde(default)]
    pub timeline: TimelineConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub processes: ProcessesConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub youtube: YouTubeConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(CastkeeperError::ConfigNotFound(path.display().to_string()));
        }
        let data = std::fs::read_to_string(&path)?;
        let config: Config = serde_yaml::from_str(&data)?;
        Ok(config)
    }

    /// Load `config.yaml` if present, otherwise fall back to defaults.
    pub fn load_or_default(root: &Path) -> Result<Self> {
        match Self::load(root) {
            Err(CastkeeperError::ConfigNotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn data_dir(&self, root: &Path) -> PathBuf {
        paths::resolve(root, &self.paths.data_dir)
    }

    pub fn status_dir(&self, root: &Path) -> PathBuf {
        paths::resolve(root, &self.paths.status_dir)
    }

    pub fn flags_dir(&self, root: &Path) -> PathBuf {
        paths::resolve(root, &self.paths.flags_dir)
    }

    /// Check for settings that are legal YAML but will misbehave at runtime.
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut push = |level: WarnLevel, message: String| {
            warnings.push(ConfigWarning { level, message });
        };

        if self.obs.scene_start == self.obs.scene_live {
            push(
                WarnLevel::Error,
                format!(
                    "obs.scene_start and obs.scene_live are both '{}'",
                    self.obs.scene_live
                ),
            );
        }
        if self.obs.scene_switch_offset_minutes > self.obs.stream_start_offset_minutes {
            push(
                WarnLevel::Error,
                "obs.scene_switch_offset_minutes exceeds obs.stream_start_offset_minutes: \
                 the on-air switch would happen before the stream starts"
                    .to_string(),
            );
        }
        if self.obs.max_duration_minutes <= 0 {
            push(
                WarnLevel::Error,
                "obs.max_duration_minutes must be positive".to_string(),
            );
        }
        if self.obs.password.is_none() && self.obs.password_file.is_none() {
            push(
                WarnLevel::Warning,
                "no obs.password or obs.password_file set: connecting without authentication"
                    .to_string(),
            );
        }

        let hb = &self.heartbeat;
        let slowest_writer = i64::try_from(
            hb.worker_watch_interval_seconds
                .max(hb.dashboard_watch_interval_seconds),
        )
        .unwrap_or(i64::MAX);
        if hb.staleness_seconds <= slowest_writer {
            push(
                WarnLevel::Error,
                format!(
                    "heartbeat.staleness_seconds ({}) must exceed the slowest watchdog interval ({slowest_writer}s)",
                    hb.staleness_seconds
                ),
            );
        }

        let d = &self.dashboard;
        if d.grace_seconds > d.long_grace_seconds {
            push(
                WarnLevel::Error,
                "dashboard.grace_seconds exceeds dashboard.long_grace_seconds".to_string(),
            );
        }
        if d.poll_interval_seconds == 0 {
            push(
                WarnLevel::Error,
                "dashboard.poll_interval_seconds must be at least 1".to_string(),
            );
        }

        let tg = &self.telegram;
        if tg.credentials_file.is_none() && (tg.token.is_none() || tg.chat_id.is_none()) {
            push(
                WarnLevel::Warning,
                "telegram is not configured: notifications go to the log only".to_string(),
            );
        }
        if self.youtube.token_file.is_none() {
            push(
                WarnLevel::Warning,
                "youtube.token_file is not set: live confirmation will stay unknown".to_string(),
            );
        }

        for (name, seconds) in self.spans() {
            if !(0..=MAX_SPAN_SECONDS).contains(&seconds) {
                push(
                    WarnLevel::Error,
                    format!("{name} is out of range (0 to {MAX_SPAN_SECONDS} seconds)"),
                );
            }
        }

        if self.processes.worker_marker == self.processes.dashboard_marker {
            push(
                WarnLevel::Error,
                "processes.worker_marker and processes.dashboard_marker must differ".to_string(),
            );
        }

        warnings
    }

    /// Every duration-like setting, in seconds.
    fn spans(&self) -> Vec<(&'static str, i64)> {
        let secs = |v: u64| i64::try_from(v).unwrap_or(i64::MAX);
        let mins = |v: i64| v.saturating_mul(60);
        let (o, t, d, h) = (&self.obs, &self.timeline, &self.dashboard, &self.heartbeat);
        vec![
            ("obs.stream_start_offset_minutes", mins(o.stream_start_offset_minutes)),
            ("obs.scene_switch_offset_minutes", mins(o.scene_switch_offset_minutes)),
            ("obs.stream_execution_grace_minutes", mins(o.stream_execution_grace_minutes)),
            ("obs.max_duration_minutes", mins(o.max_duration_minutes)),
            ("timeline.wait_poll_seconds", secs(t.wait_poll_seconds)),
            ("timeline.live_poll_seconds", secs(t.live_poll_seconds)),
            ("timeline.monitor_poll_seconds", secs(t.monitor_poll_seconds)),
            ("timeline.wait_note_minutes", mins(t.wait_note_minutes)),
            ("timeline.standby_note_minutes", mins(t.standby_note_minutes)),
            ("dashboard.poll_interval_seconds", secs(d.poll_interval_seconds)),
            ("dashboard.lead_minutes", mins(d.lead_minutes)),
            ("dashboard.grace_seconds", d.grace_seconds),
            ("dashboard.long_grace_seconds", d.long_grace_seconds),
            ("dashboard.clear_after_minutes", mins(d.clear_after_minutes)),
            ("dashboard.error_window_minutes", mins(d.error_window_minutes)),
            ("dashboard.lookahead_hours", d.lookahead_hours.saturating_mul(3600)),
            ("heartbeat.staleness_seconds", h.staleness_seconds),
            ("heartbeat.worker_watch_interval_seconds", secs(h.worker_watch_interval_seconds)),
            ("heartbeat.dashboard_watch_interval_seconds", secs(h.dashboard_watch_interval_seconds)),
        ]
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.obs.port, 4455);
        assert_eq!(config.heartbeat.staleness_seconds, 90);
        assert_eq!(config.dashboard.lead_minutes, 5);
        assert_eq!(config.dashboard.grace_seconds, 120);
        assert_eq!(config.dashboard.long_grace_seconds, 2700);
        assert_eq!(config.obs.max_duration(), Duration::hours(3));
    }

    #[test]
    fn absurd_durations_clamp_instead_of_panicking() {
        assert_eq!(poll_step(u64::MAX), Duration::seconds(MAX_SPAN_SECONDS));
        assert_eq!(poll_step(0), Duration::seconds(1));
        assert_eq!(span_minutes(i64::MAX), Duration::seconds(MAX_SPAN_SECONDS));
        assert_eq!(span_seconds(-5), Duration::zero());

        let mut config = Config::default();
        config.obs.max_duration_minutes = i64::MAX;
        assert_eq!(config.obs.max_duration(), Duration::seconds(MAX_SPAN_SECONDS));
    }

    #[test]
    fn validate_flags_out_of_range_intervals() {
        assert!(!Config::default()
            .validate()
            .iter()
            .any(|w| w.message.contains("out of range")));

        let mut config = Config::default();
        config.timeline.monitor_poll_seconds = u64::MAX;
        config.dashboard.lookahead_hours = -1;
        let errors: Vec<_> = config
            .validate()
            .into_iter()
            .filter(|w| w.level == WarnLevel::Error && w.message.contains("out of range"))
            .map(|w| w.message)
            .collect();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].starts_with("timeline.monitor_poll_seconds"));
        assert!(errors[1].starts_with("dashboard.lookahead_hours"));
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let yaml = "obs:\n  scene_live: OnAir\n  port: 4460\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.obs.scene_live, "OnAir");
        assert_eq!(config.obs.port, 4460);
        assert_eq!(config.obs.scene_start, "Beginn");
    }

    #[test]
    fn load_missing_config_is_error() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(dir.path()).unwrap_err();
        assert!(matches!(err, CastkeeperError::ConfigNotFound(_)));
        assert!(Config::load_or_default(dir.path()).is_ok());
    }

    #[test]
    fn save_and_load() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.dashboard.port = 5055;
        config.save(dir.path()).unwrap();
        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.dashboard.port, 5055);
    }

    #[test]
    fn relative_dirs_resolve_against_root() {
        let config = Config::default();
        let root = Path::new("/srv/castkeeper");
        assert_eq!(config.status_dir(root), PathBuf::from("/srv/castkeeper/status"));
        assert_eq!(config.data_dir(root), PathBuf::from("/srv/castkeeper/data"));
    }

    #[test]
    fn validate_flags_staleness_below_watch_interval() {
        let mut config = Config::default();
        config.heartbeat.staleness_seconds = 20;
        let warnings = config.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("staleness_seconds")));
    }

    #[test]
    fn validate_flags_identical_scenes() {
        let mut config = Config::default();
        config.obs.scene_start = "Live".into();
        config.obs.scene_live = "Live".into();
        assert!(config
            .validate()
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("scene_start")));
    }

    #[test]
    fn default_config_has_no_errors() {
        let config = Config::default();
        assert!(config
            .validate()
            .iter()
            .all(|w| w.level == WarnLevel::Warning));
    }
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CastkeeperError {
    #[error("config not found: {0}")]
    ConfigNotFound(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid schedule entry: {0}")]
    InvalidSchedule(String),

    #[error("production tool error: {0}")]
    Production(String),

    #[error("production tool request '{request}' failed ({code}): {comment}")]
    ProductionRequest {
        request: String,
        code: i64,
        comment: String,
    },

    #[error("http error: {0}")]
    Http(String),

    #[error("another worker is already running (lock port {0} in use)")]
    AlreadyRunning(u16),

    #[error("failed to spawn '{command}': {reason}")]
    Spawn { command: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for CastkeeperError {
    fn from(e: reqwest::Error) -> Self {
        CastkeeperError::Http(e.to_string())
    }
}

impl From<tungstenite::Error> for CastkeeperError {
    fn from(e: tungstenite::Error) -> Self {
        CastkeeperError::Production(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CastkeeperError>;

use common::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("channel closed")]
    ChannelClosed,
}

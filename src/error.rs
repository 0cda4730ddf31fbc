use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Worker spawn error: {0}")]
    WorkerSpawn(std::io::Error),

    #[error("Engine already terminated")]
    Terminated,

    #[error("JSON encode error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

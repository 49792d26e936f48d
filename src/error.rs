use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the engine.
///
/// The scoring and history operations themselves never fail; these cover
/// configuration loading and callers that break the input contract.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to read config file {}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Student input that is malformed or missing required fields,
    /// such as a batch entry without its session list.
    #[error("invalid student input: {0}")]
    InvalidInput(#[from] serde_json::Error),

    #[error("unknown risk tier '{0}' (expected low, medium or high)")]
    UnknownTier(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

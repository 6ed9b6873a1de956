use std::path::PathBuf;
use thiserror::Error;

/// An invalid scenario descriptor. Always fatal: no traffic is generated.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Scenario must contain at least one stage")]
    EmptyStages,

    #[error("Stage {index} has an invalid target ({target}); targets must be finite and non-negative")]
    InvalidTarget { index: usize, target: f64 },

    #[error("startTarget must be finite and non-negative, found {0}")]
    InvalidStartTarget(f64),

    #[error("maxConcurrency must be at least 1")]
    ZeroCeiling,

    #[error("preallocated ({preallocated}) exceeds maxConcurrency ({ceiling})")]
    PreallocatedExceedsCeiling { preallocated: usize, ceiling: usize },

    #[error("iterationsPerClient must be at least 1")]
    ZeroIterations,

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("Random range {low}..={high} is empty")]
    EmptyRandomRange { low: u64, high: u64 },

    #[error("Unsupported descriptor format '{0}', expected .json or .toml")]
    UnsupportedFormat(String),

    #[error("Failed to parse JSON descriptor: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse TOML descriptor: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to read descriptor '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

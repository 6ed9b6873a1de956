use stampede::TransportError;
use stampede_core::ConfigurationError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("No scenario given. Pass --scenario <file> or set one on the runtime.")]
    NoScenario,

    #[error("Invalid scenario: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Invalid target: {0}")]
    Transport(#[from] TransportError),

    #[error("Unable to write report to {path}: {source}")]
    Report {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unable to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

impl RuntimeError {
    /// Errors raised before any traffic is generated.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::NoScenario | Self::Configuration(_) | Self::Transport(_)
        )
    }

    pub fn exit_code(&self) -> u8 {
        if self.is_configuration() {
            2
        } else {
            1
        }
    }
}

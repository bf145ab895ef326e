//! Error types for configuration and orchestration.
//!
//! Interrupted pauses are not errors: a worker recovers from them in place and
//! they never reach these types. Everything here ends a run.

use std::num::ParseIntError;
use std::time::Duration;

use thiserror::Error;

/// Error raised while building or parsing a run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A worker was given an empty name.
    #[error("worker name must not be empty")]
    EmptyName,

    /// A worker was given a zero delay.
    #[error("worker `{0}`: delay must be greater than zero")]
    ZeroDelay(String),

    /// A worker spec did not have the `NAME:DELAY_MS:COUNT` shape.
    #[error("invalid worker `{0}`: expected NAME:DELAY_MS:COUNT")]
    MalformedWorker(String),

    /// An interrupt spec did not have the `NAME:AFTER_MS` shape.
    #[error("invalid interrupt `{0}`: expected NAME:AFTER_MS")]
    MalformedInterrupt(String),

    /// A numeric field could not be parsed.
    #[error("invalid number `{value}`: {source}")]
    Number {
        value: String,
        #[source]
        source: ParseIntError,
    },

    /// The counter kind is not one of `atomic`, `sharded`, `locked`.
    #[error("unknown counter kind `{0}`")]
    UnknownCounter(String),
}

impl ConfigError {
    pub(crate) fn number(value: &str, source: ParseIntError) -> Self {
        ConfigError::Number {
            value: value.to_string(),
            source,
        }
    }
}

/// Error that ends an orchestrated run.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Two workers share the same name.
    #[error("duplicate worker name `{0}`")]
    DuplicateWorker(String),

    /// An interrupt plan names a worker that is not part of the run.
    #[error("interrupt targets unknown worker `{0}`")]
    UnknownWorker(String),

    /// The OS refused to start a worker thread.
    #[error("failed to spawn worker `{name}`: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// A worker thread panicked before reaching its target.
    #[error("worker `{0}` panicked")]
    WorkerPanicked(String),

    /// The orchestrator's wait for its workers was cancelled.
    #[error("wait for workers was cancelled")]
    WaitCancelled,

    /// The orchestrator's join timeout expired before every worker finished.
    #[error("workers did not finish within {} ms", .0.as_millis())]
    WaitTimedOut(Duration),
}

impl OrchestratorError {
    /// Process exit status for this error.
    ///
    /// A cancelled (or timed out) wait gets its own status so callers can
    /// tell it apart from every other failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            OrchestratorError::WaitCancelled | OrchestratorError::WaitTimedOut(_) => 2,
            _ => 1,
        }
    }
}

/// Result type for orchestration.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

//! Error types for sessions, device lifecycles and run setup.
//!
//! Session-stage failures are classified so the lifecycle can decide between
//! giving up and retrying. Setup failures (unreadable inventory, malformed
//! credentials) abort the run before any worker starts.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by a session collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The device did not answer in time. Never retried.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Session-layer hiccup (auth, key exchange, channel reset). Retried.
    #[error("{0}")]
    Transient(String),

    /// Any other failure reported by the session. Retried like transient errors.
    #[error("{0}")]
    Other(String),
}

impl SessionError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, SessionError::Timeout(_))
    }
}

impl From<async_ssh2_tokio::Error> for SessionError {
    fn from(err: async_ssh2_tokio::Error) -> Self {
        SessionError::Transient(format!("ssh error: {err}"))
    }
}

impl From<russh::Error> for SessionError {
    fn from(err: russh::Error) -> Self {
        SessionError::Transient(format!("russh error: {err}"))
    }
}

/// Why a single lifecycle attempt stopped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A candidate commit was rejected. Fatal for the device.
    #[error("commit failed: {0}")]
    Commit(SessionError),
}

/// Errors that abort a run during setup or shutdown.
#[derive(Error, Debug)]
pub enum FleetError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("unknown vendor kind '{0}'")]
    UnknownVendor(String),

    #[error("worker count must be between 1 and {max}, got {got}")]
    WorkerCount { got: usize, max: usize },

    #[error("work queue closed before all devices were submitted")]
    QueueClosed,

    #[error("worker task panicked: {0}")]
    WorkerPanicked(String),

    #[error("script fixture error: {0}")]
    Fixture(String),
}

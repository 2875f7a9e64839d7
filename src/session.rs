//! Remote command-line sessions.
//!
//! The orchestration core talks to devices only through the [`Connector`] and
//! [`Session`] traits. Two implementations ship with the crate:
//!
//! - [`SshConnector`] - interactive shell over SSH with prompt detection and
//!   a per-vendor [`Dialect`]
//! - [`ScriptedConnector`] - offline sessions driven by per-device scripts,
//!   used by tests and dry runs

use async_trait::async_trait;

use crate::error::SessionError;
use crate::settings::Credentials;
use crate::vendor::VendorKind;

pub use client::{SshConnector, SshSession};
pub use dialect::{Dialect, dialect_for};
pub use prompt::{IGNORE_START_LINE, PromptMatcher, Tail};
pub use scripted::{DeviceScript, ScriptedConnector, ScriptedFault, ScriptedSession};
pub use security::{SecurityLevel, SshProfile};

/// Everything needed to open a session to one device.
#[derive(Debug, Clone, Copy)]
pub struct ConnectTarget<'a> {
    pub hostname: &'a str,
    pub address: &'a str,
    pub vendor: VendorKind,
    pub credentials: &'a Credentials,
}

/// Opens sessions to devices.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, target: ConnectTarget<'_>) -> Result<Box<dyn Session>, SessionError>;
}

/// An open command-line session on a device.
///
/// Every method returns the raw text the device printed, including echoed
/// commands and prompts.
#[async_trait]
pub trait Session: Send {
    /// Runs one command in the current mode.
    async fn run_command(&mut self, command: &str) -> Result<String, SessionError>;

    /// Enters configuration mode and sends each line in order.
    ///
    /// Save-config dialects leave configuration mode afterwards; candidate
    /// dialects stay in it so the candidate can be inspected and committed.
    async fn push_config(&mut self, lines: &[String]) -> Result<String, SessionError>;

    /// Persists the running configuration to startup storage.
    async fn save_config(&mut self) -> Result<String, SessionError>;

    /// Commits the candidate configuration.
    async fn commit(&mut self) -> Result<String, SessionError>;

    async fn exit_config_mode(&mut self) -> Result<(), SessionError>;

    async fn disconnect(&mut self) -> Result<(), SessionError>;
}

mod client;
mod dialect;
mod prompt;
mod scripted;
mod security;

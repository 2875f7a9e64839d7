//! Offline sessions driven by per-device scripts.
//!
//! A script describes how a device behaves: which connection attempts fail
//! and how, what commands print, and whether save or commit is rejected.
//! Scripts load from JSONL (one [`DeviceScript`] per line) so fleets can be
//! exercised without any SSH traffic.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{ConnectTarget, Connector, Session};
use crate::error::{FleetError, SessionError};

/// A failure injected by a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScriptedFault {
    Timeout { message: String },
    Transient { message: String },
    Other { message: String },
}

impl From<&ScriptedFault> for SessionError {
    fn from(fault: &ScriptedFault) -> Self {
        match fault {
            ScriptedFault::Timeout { message } => SessionError::Timeout(message.clone()),
            ScriptedFault::Transient { message } => SessionError::Transient(message.clone()),
            ScriptedFault::Other { message } => SessionError::Other(message.clone()),
        }
    }
}

/// Behaviour of one scripted device, keyed by address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DeviceScript {
    pub address: String,
    /// Failures for consecutive connection attempts; later attempts succeed.
    #[serde(default)]
    pub connect: Vec<ScriptedFault>,
    /// Failure returned by every connection attempt.
    #[serde(default)]
    pub always_fail: Option<ScriptedFault>,
    /// Output printed for specific commands.
    #[serde(default)]
    pub outputs: HashMap<String, String>,
    /// Failure returned by every `run_command`.
    #[serde(default)]
    pub command_fault: Option<ScriptedFault>,
    #[serde(default)]
    pub save_error: Option<String>,
    #[serde(default)]
    pub commit_error: Option<String>,
    /// Failure returned when leaving configuration mode.
    #[serde(default)]
    pub exit_config_error: Option<String>,
    /// Failure returned when closing the session.
    #[serde(default)]
    pub disconnect_error: Option<String>,
}

#[derive(Debug, Default)]
struct DeviceLog {
    attempts: usize,
    calls: Vec<String>,
}

type SharedLog = Arc<Mutex<HashMap<String, DeviceLog>>>;

/// Connector returning scripted sessions. Unknown addresses behave as healthy devices.
#[derive(Debug, Clone, Default)]
pub struct ScriptedConnector {
    scripts: HashMap<String, DeviceScript>,
    log: SharedLog,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, script: DeviceScript) -> Self {
        self.scripts.insert(script.address.clone(), script);
        self
    }

    /// Loads one script per non-empty line.
    pub fn from_jsonl(jsonl: &str) -> Result<Self, FleetError> {
        let mut connector = Self::new();
        for (index, line) in jsonl.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let script: DeviceScript = serde_json::from_str(line)
                .map_err(|e| FleetError::Fixture(format!("line {}: {e}", index + 1)))?;
            connector = connector.with_device(script);
        }
        Ok(connector)
    }

    /// Number of connection attempts made to `address`.
    pub fn attempts(&self, address: &str) -> usize {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(address)
            .map(|log| log.attempts)
            .unwrap_or(0)
    }

    /// Session operations issued to `address`, in order.
    pub fn calls(&self, address: &str) -> Vec<String> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(address)
            .map(|log| log.calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, target: ConnectTarget<'_>) -> Result<Box<dyn Session>, SessionError> {
        let attempt = {
            let mut log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
            let entry = log.entry(target.address.to_string()).or_default();
            entry.attempts += 1;
            entry.attempts
        };
        debug!("scripted connect to {} (attempt {})", target.address, attempt);

        let script = self
            .scripts
            .get(target.address)
            .cloned()
            .unwrap_or_else(|| DeviceScript {
                address: target.address.to_string(),
                ..DeviceScript::default()
            });

        if let Some(fault) = script.always_fail.as_ref() {
            return Err(fault.into());
        }
        if let Some(fault) = script.connect.get(attempt - 1) {
            return Err(fault.into());
        }

        Ok(Box::new(ScriptedSession {
            prompt: format!("{}#", target.hostname),
            script,
            log: self.log.clone(),
        }))
    }
}

/// Session returned by [`ScriptedConnector`].
#[derive(Debug)]
pub struct ScriptedSession {
    prompt: String,
    script: DeviceScript,
    log: SharedLog,
}

impl ScriptedSession {
    fn record(&self, call: String) {
        let mut log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        log.entry(self.script.address.clone())
            .or_default()
            .calls
            .push(call);
    }
}

#[async_trait]
impl Session for ScriptedSession {
    async fn run_command(&mut self, command: &str) -> Result<String, SessionError> {
        self.record(format!("run:{command}"));
        if let Some(fault) = self.script.command_fault.as_ref() {
            return Err(fault.into());
        }
        let output = self
            .script
            .outputs
            .get(command)
            .map(String::as_str)
            .unwrap_or_default();
        Ok(format!("{command}\n{output}\n{}", self.prompt))
    }

    async fn push_config(&mut self, lines: &[String]) -> Result<String, SessionError> {
        self.record(format!("push_config:{}", lines.len()));
        let mut transcript = String::new();
        for line in lines {
            transcript.push_str(line);
            transcript.push('\n');
        }
        transcript.push_str(&self.prompt);
        Ok(transcript)
    }

    async fn save_config(&mut self) -> Result<String, SessionError> {
        self.record("save_config".to_string());
        match self.script.save_error.as_ref() {
            Some(err) => Err(SessionError::Other(err.clone())),
            None => Ok(format!("write memory\n[OK]\n{}", self.prompt)),
        }
    }

    async fn commit(&mut self) -> Result<String, SessionError> {
        self.record("commit".to_string());
        match self.script.commit_error.as_ref() {
            Some(err) => Err(SessionError::Other(err.clone())),
            None => Ok(format!("commit\ncommit complete\n{}", self.prompt)),
        }
    }

    async fn exit_config_mode(&mut self) -> Result<(), SessionError> {
        self.record("exit_config".to_string());
        match self.script.exit_config_error.as_ref() {
            Some(err) => Err(SessionError::Transient(err.clone())),
            None => Ok(()),
        }
    }

    async fn disconnect(&mut self) -> Result<(), SessionError> {
        self.record("disconnect".to_string());
        match self.script.disconnect_error.as_ref() {
            Some(err) => Err(SessionError::Transient(err.clone())),
            None => Ok(()),
        }
    }
}

//! Per-device lifecycle state machine.
//!
//! ```text
//! Start -> Connecting -> (connected, executing, disconnecting) -> DoneSuccess
//!              ^               |
//!              |               v
//!          Retrying <---- ConnectFailed ----> DoneFailure
//! ```
//!
//! One attempt covers connect, execute and disconnect. A failed attempt is
//! classified by [`RetryPolicy`]; retries reset the descriptor's transcripts
//! and wait out the policy delay before connecting again. A descriptor is
//! never requeued.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, trace, warn};

use crate::device::DeviceDescriptor;
use crate::error::{AttemptError, SessionError};
use crate::retry::{RetryDecision, RetryPolicy};
use crate::session::{ConnectTarget, Connector, Session};
use crate::settings::{Credentials, RunMode, RunSettings};

/// Work performed by the pool for each dequeued descriptor.
///
/// Implementations absorb every device-level error: when `drive` returns the
/// descriptor is in a terminal state.
#[async_trait]
pub trait DeviceLifecycle: Send + Sync + 'static {
    async fn drive(&self, device: &mut DeviceDescriptor);
}

/// States of one lifecycle invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    Start,
    Connecting { attempt: u32 },
    ConnectFailed { attempt: u32, error: AttemptError },
    Retrying { next_attempt: u32, delay: Duration },
    DoneSuccess,
    DoneFailure { error: AttemptError },
}

impl LifecycleState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LifecycleState::DoneSuccess | LifecycleState::DoneFailure { .. }
        )
    }
}

/// Final state and number of connection attempts of one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleReport {
    pub attempts: u32,
    pub state: LifecycleState,
}

/// Drives devices through connect, execute and disconnect against a [`Connector`].
pub struct Lifecycle<C> {
    connector: C,
    credentials: Arc<Credentials>,
    settings: Arc<RunSettings>,
    payload: Arc<Vec<String>>,
    retry: RetryPolicy,
}

impl<C: Connector> Lifecycle<C> {
    /// `payload` holds the commands (query mode) or configuration lines
    /// (configure mode) sent to every device.
    pub fn new(
        connector: C,
        credentials: Arc<Credentials>,
        settings: Arc<RunSettings>,
        payload: Arc<Vec<String>>,
    ) -> Self {
        Self {
            connector,
            credentials,
            settings,
            payload,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Runs the state machine until the descriptor reaches a terminal state.
    pub async fn run(&self, device: &mut DeviceDescriptor) -> LifecycleReport {
        let mut state = LifecycleState::Start;
        let mut attempts = 0;

        loop {
            trace!("{} state {:?}", device.hostname(), state);
            state = match state {
                LifecycleState::Start => LifecycleState::Connecting { attempt: 1 },
                LifecycleState::Connecting { attempt } => {
                    attempts = attempt;
                    match self.attempt_with_deadline(device).await {
                        Ok(()) => LifecycleState::DoneSuccess,
                        Err(error) => LifecycleState::ConnectFailed { attempt, error },
                    }
                }
                LifecycleState::ConnectFailed { attempt, error } => {
                    self.classify(device, attempt, error)
                }
                LifecycleState::Retrying {
                    next_attempt,
                    delay,
                } => {
                    device.reset();
                    tokio::time::sleep(delay).await;
                    LifecycleState::Connecting {
                        attempt: next_attempt,
                    }
                }
                LifecycleState::DoneSuccess => {
                    device.mark_succeeded();
                    return LifecycleReport {
                        attempts,
                        state: LifecycleState::DoneSuccess,
                    };
                }
                LifecycleState::DoneFailure { error } => {
                    device.mark_failed(error.to_string());
                    return LifecycleReport {
                        attempts,
                        state: LifecycleState::DoneFailure { error },
                    };
                }
            };
        }
    }

    fn classify(
        &self,
        device: &DeviceDescriptor,
        attempt: u32,
        error: AttemptError,
    ) -> LifecycleState {
        match self.retry.decide(&error, attempt) {
            RetryDecision::Retry {
                next_attempt,
                delay,
            } => {
                progress(
                    device,
                    &format!("{} \t i={}", failure_comment(&error), attempt),
                );
                LifecycleState::Retrying {
                    next_attempt,
                    delay,
                }
            }
            RetryDecision::GiveUp => {
                if matches!(error, AttemptError::Session(SessionError::Timeout(_))) {
                    progress(device, "timeout");
                } else {
                    progress(
                        device,
                        &format!("BREAK {} \t i={}", failure_comment(&error), attempt),
                    );
                }
                LifecycleState::DoneFailure { error }
            }
        }
    }

    async fn attempt_with_deadline(
        &self,
        device: &mut DeviceDescriptor,
    ) -> Result<(), AttemptError> {
        let Some(limit) = self.settings.device_timeout() else {
            return self.attempt(device).await;
        };
        match tokio::time::timeout(limit, self.attempt(device)).await {
            Ok(result) => result,
            Err(_) => Err(SessionError::Timeout(format!(
                "device did not finish within {}s",
                limit.as_secs()
            ))
            .into()),
        }
    }

    /// Connect, execute the payload, disconnect.
    ///
    /// The session is closed whatever the execution outcome. Closing errors
    /// are logged and never fail the attempt.
    async fn attempt(&self, device: &mut DeviceDescriptor) -> Result<(), AttemptError> {
        let mut session = self
            .connector
            .connect(ConnectTarget {
                hostname: device.hostname(),
                address: device.address(),
                vendor: device.vendor(),
                credentials: &self.credentials,
            })
            .await?;
        debug!("{} connected", device.hostname());

        let executed = self.execute(device, session.as_mut()).await;

        debug!("{} disconnecting", device.hostname());
        if let Err(e) = session.disconnect().await {
            debug!("{} disconnect failed: {}", device.hostname(), e);
        }
        executed
    }

    async fn execute(
        &self,
        device: &mut DeviceDescriptor,
        session: &mut dyn Session,
    ) -> Result<(), AttemptError> {
        match self.settings.mode() {
            RunMode::Query => {
                for command in self.payload.iter() {
                    let output = session.run_command(command).await?;
                    device.push_command_transcript(output);
                }
            }
            RunMode::Configure => {
                let vendor = device.vendor();
                for transcript in vendor.configure(session, &self.payload).await? {
                    device.push_config_transcript(transcript);
                }
                for transcript in vendor.commit(session).await? {
                    device.push_config_transcript(transcript);
                }
                if device.has_config_error_marker() {
                    warn!(
                        "{:23}{:16}configuration ERROR %",
                        device.hostname(),
                        device.address()
                    );
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<C: Connector + 'static> DeviceLifecycle for Lifecycle<C> {
    async fn drive(&self, device: &mut DeviceDescriptor) {
        let report = self.run(device).await;
        if report.state == LifecycleState::DoneSuccess {
            progress(device, &format!("done (attempts: {})", report.attempts));
        }
    }
}

fn failure_comment(error: &AttemptError) -> &'static str {
    match error {
        AttemptError::Session(SessionError::Transient(_)) => "SSHException occurred",
        AttemptError::Session(_) => "ERROR connection failed",
        AttemptError::Commit(_) => "ERROR commit failed",
    }
}

fn progress(device: &DeviceDescriptor, comment: &str) {
    info!("{:23}{:16}{}", device.hostname(), device.address(), comment);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{DeviceScript, ScriptedConnector, ScriptedFault};
    use crate::vendor::VendorKind;

    fn lifecycle(connector: ScriptedConnector, configure: bool) -> Lifecycle<ScriptedConnector> {
        let settings = RunSettings::new(1, configure, VendorKind::Ios).unwrap();
        let payload = if configure {
            vec!["interface Loopback0".to_string(), "description mgmt".to_string()]
        } else {
            vec!["show version".to_string(), "show clock".to_string()]
        };
        Lifecycle::new(
            connector,
            Arc::new(Credentials::new("admin", "secret")),
            Arc::new(settings),
            Arc::new(payload),
        )
        .with_retry_policy(RetryPolicy::new(3, Duration::ZERO))
    }

    fn transient(message: &str) -> ScriptedFault {
        ScriptedFault::Transient {
            message: message.to_string(),
        }
    }

    #[tokio::test]
    async fn query_mode_collects_outputs_in_order() {
        let lifecycle = lifecycle(ScriptedConnector::new(), false);
        let mut device = DeviceDescriptor::new("r1", "10.0.0.1", VendorKind::Ios);

        let report = lifecycle.run(&mut device).await;

        assert_eq!(report.state, LifecycleState::DoneSuccess);
        assert_eq!(report.attempts, 1);
        assert!(device.connection_ok());
        assert_eq!(device.command_transcripts().len(), 2);
        assert!(device.command_transcripts()[0].starts_with("show version"));
        assert!(device.command_transcripts()[1].starts_with("show clock"));
        assert_eq!(
            lifecycle.connector().calls("10.0.0.1"),
            vec!["run:show version", "run:show clock", "disconnect"]
        );
    }

    #[tokio::test]
    async fn always_transient_device_is_attempted_three_times() {
        let connector = ScriptedConnector::new().with_device(DeviceScript {
            address: "10.0.0.1".to_string(),
            connect: vec![transient("kex 1"), transient("kex 2"), transient("kex 3")],
            ..DeviceScript::default()
        });
        let lifecycle = lifecycle(connector, false);
        let mut device = DeviceDescriptor::new("r1", "10.0.0.1", VendorKind::Ios);

        let report = lifecycle.run(&mut device).await;

        assert_eq!(report.attempts, 3);
        assert!(report.state.is_terminal());
        assert_eq!(lifecycle.connector().attempts("10.0.0.1"), 3);
        // the last observed error is reported, not the first
        assert_eq!(device.error_message(), Some("kex 3"));
    }

    #[tokio::test]
    async fn timeout_is_attempted_once() {
        let connector = ScriptedConnector::new().with_device(DeviceScript {
            address: "10.0.0.1".to_string(),
            always_fail: Some(ScriptedFault::Timeout {
                message: "10.0.0.1:22 unreachable".to_string(),
            }),
            ..DeviceScript::default()
        });
        let lifecycle = lifecycle(connector, false);
        let mut device = DeviceDescriptor::new("r1", "10.0.0.1", VendorKind::Ios);

        let report = lifecycle.run(&mut device).await;

        assert_eq!(report.attempts, 1);
        assert_eq!(lifecycle.connector().attempts("10.0.0.1"), 1);
        assert_eq!(
            device.error_message(),
            Some("timed out: 10.0.0.1:22 unreachable")
        );
    }

    #[tokio::test]
    async fn retry_after_partial_output_starts_from_empty_transcripts() {
        let connector = ScriptedConnector::new().with_device(DeviceScript {
            address: "10.0.0.1".to_string(),
            connect: vec![transient("reset by peer")],
            ..DeviceScript::default()
        });
        let lifecycle = lifecycle(connector, false);
        let mut device = DeviceDescriptor::new("r1", "10.0.0.1", VendorKind::Ios);
        device.push_command_transcript("stale".to_string());

        let report = lifecycle.run(&mut device).await;

        assert_eq!(report.attempts, 2);
        assert!(device.connection_ok());
        assert_eq!(device.command_transcripts().len(), 2);
        assert!(device.command_transcripts().iter().all(|t| t != "stale"));
    }

    #[tokio::test]
    async fn ios_commit_failure_keeps_device_successful() {
        let connector = ScriptedConnector::new().with_device(DeviceScript {
            address: "10.0.0.1".to_string(),
            save_error: Some("Error: not supported".to_string()),
            ..DeviceScript::default()
        });
        let lifecycle = lifecycle(connector, true);
        let mut device = DeviceDescriptor::new("r1", "10.0.0.1", VendorKind::Ios);

        lifecycle.run(&mut device).await;

        assert!(device.connection_ok());
        assert!(
            device
                .config_transcripts()
                .iter()
                .any(|t| t.contains("Error: not supported"))
        );
    }

    #[tokio::test]
    async fn xr_commit_failure_fails_the_device_without_retry() {
        let connector = ScriptedConnector::new().with_device(DeviceScript {
            address: "10.0.0.2".to_string(),
            commit_error: Some("% Failed to commit one or more configuration items".to_string()),
            ..DeviceScript::default()
        });
        let lifecycle = lifecycle(connector, true);
        let mut device = DeviceDescriptor::new("pe1", "10.0.0.2", VendorKind::Xr);

        let report = lifecycle.run(&mut device).await;

        assert_eq!(report.attempts, 1);
        assert!(!device.connection_ok());
        assert_eq!(
            device.error_message(),
            Some("commit failed: % Failed to commit one or more configuration items")
        );
        assert_eq!(
            lifecycle.connector().calls("10.0.0.2"),
            vec![
                "push_config:2",
                "run:show configuration",
                "commit",
                "disconnect"
            ]
        );
    }

    #[tokio::test]
    async fn command_failures_during_execution_are_retried() {
        let connector = ScriptedConnector::new().with_device(DeviceScript {
            address: "10.0.0.1".to_string(),
            command_fault: Some(ScriptedFault::Other {
                message: "channel closed".to_string(),
            }),
            ..DeviceScript::default()
        });
        let lifecycle = lifecycle(connector, false);
        let mut device = DeviceDescriptor::new("r1", "10.0.0.1", VendorKind::Ios);

        let report = lifecycle.run(&mut device).await;

        assert_eq!(report.attempts, 3);
        assert_eq!(device.error_message(), Some("channel closed"));
        assert!(device.command_transcripts().is_empty());
        let disconnects = lifecycle
            .connector()
            .calls("10.0.0.1")
            .iter()
            .filter(|call| *call == "disconnect")
            .count();
        assert_eq!(disconnects, 3);
    }

    #[tokio::test]
    async fn teardown_failures_after_commit_keep_the_device_successful() {
        let connector = ScriptedConnector::new().with_device(DeviceScript {
            address: "10.0.0.2".to_string(),
            exit_config_error: Some("channel reset".to_string()),
            disconnect_error: Some("broken pipe".to_string()),
            ..DeviceScript::default()
        });
        let lifecycle = lifecycle(connector, true);
        let mut device = DeviceDescriptor::new("pe1", "10.0.0.2", VendorKind::Xr);

        let report = lifecycle.run(&mut device).await;

        assert_eq!(report.state, LifecycleState::DoneSuccess);
        assert_eq!(report.attempts, 1);
        assert!(device.connection_ok());
        assert_eq!(
            lifecycle.connector().calls("10.0.0.2"),
            vec![
                "push_config:2",
                "run:show configuration",
                "commit",
                "exit_config",
                "disconnect"
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn retries_wait_the_policy_delay() {
        let connector = ScriptedConnector::new().with_device(DeviceScript {
            address: "10.0.0.1".to_string(),
            connect: vec![transient("auth hiccup"), transient("auth hiccup")],
            ..DeviceScript::default()
        });
        let lifecycle = lifecycle(connector, false).with_retry_policy(RetryPolicy::default());
        let mut device = DeviceDescriptor::new("r1", "10.0.0.1", VendorKind::Ios);

        let started = tokio::time::Instant::now();
        let report = lifecycle.run(&mut device).await;

        assert_eq!(report.attempts, 3);
        assert!(device.connection_ok());
        assert!(started.elapsed() >= Duration::from_secs(10));
    }
}

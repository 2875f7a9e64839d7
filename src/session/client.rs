use std::time::Duration;

use async_ssh2_tokio::client::{AuthMethod, Client};
use async_trait::async_trait;
use log::{debug, trace};
use russh::ChannelMsg;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::time::Instant;

use super::dialect::{Dialect, dialect_for};
use super::prompt::{IGNORE_START_LINE, PromptMatcher, Tail};
use super::security::SshProfile;
use super::{ConnectTarget, Connector, Session};
use crate::config;
use crate::error::SessionError;
use crate::settings::RunSettings;

/// Opens interactive shell sessions over SSH.
#[derive(Debug, Clone)]
pub struct SshConnector {
    port: u16,
    connect_timeout: Duration,
    command_timeout: Duration,
    profile: SshProfile,
}

impl SshConnector {
    pub fn new(port: u16, connect_timeout: Duration, profile: SshProfile) -> Self {
        Self {
            port,
            connect_timeout,
            command_timeout: config::DEFAULT_COMMAND_TIMEOUT,
            profile,
        }
    }

    pub fn from_settings(settings: &RunSettings) -> Self {
        Self::new(
            settings.ssh_port,
            settings.connect_timeout(),
            SshProfile::from(settings.security),
        )
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(&self, target: ConnectTarget<'_>) -> Result<Box<dyn Session>, SessionError> {
        let open = SshSession::open(target, self.port, &self.profile, self.command_timeout);
        match tokio::time::timeout(self.connect_timeout, open).await {
            Ok(session) => Ok(Box::new(session?)),
            Err(_) => Err(SessionError::Timeout(format!(
                "TCP connection to device failed or no prompt within {:?}. Device {}:{}",
                self.connect_timeout, target.address, self.port
            ))),
        }
    }
}

/// Interactive shell on one device.
pub struct SshSession {
    client: Client,
    sender: Sender<String>,
    recv: Receiver<String>,
    dialect: &'static Dialect,
    matcher: PromptMatcher,
    prompt: String,
    device_addr: String,
    command_timeout: Duration,
    in_config: bool,
}

impl SshSession {
    async fn open(
        target: ConnectTarget<'_>,
        port: u16,
        profile: &SshProfile,
        command_timeout: Duration,
    ) -> Result<SshSession, SessionError> {
        let dialect = dialect_for(target.vendor);
        let matcher = PromptMatcher::new(dialect).map_err(|e| {
            SessionError::Other(format!("invalid {} prompt pattern: {e}", target.vendor))
        })?;
        let device_addr = format!(
            "{}@{}:{}",
            target.credentials.username(),
            target.address,
            port
        );

        let client = Client::connect_with_config(
            (target.address.to_string(), port),
            target.credentials.username(),
            AuthMethod::with_password(target.credentials.password()),
            profile.server_check(),
            profile.client_config(),
        )
        .await
        .map_err(|e| classify_connect_error(e, target.address, port))?;
        debug!("{} TCP connection successful", device_addr);

        let mut channel = client.get_channel().await?;
        channel
            .request_pty(false, "xterm", 800, 600, 0, 0, &[])
            .await?;
        channel.request_shell(false).await?;
        debug!("{} Shell request successful", device_addr);

        let (sender_to_shell, mut receiver_from_user) = mpsc::channel::<String>(256);
        let (sender_to_user, receiver_from_shell) = mpsc::channel::<String>(256);

        let io_task_device_addr = device_addr.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(data) = receiver_from_user.recv() => {
                        if let Err(e) = channel.data(data.as_bytes()).await {
                            debug!("{} Failed to send data to shell: {:?}", io_task_device_addr, e);
                            break;
                        }
                    },
                    Some(msg) = channel.wait() => {
                        match msg {
                            ChannelMsg::Data { ref data } => {
                                let chunk = String::from_utf8_lossy(data).into_owned();
                                if sender_to_user.send(chunk).await.is_err() {
                                    debug!("{} Shell output receiver dropped. Closing task.", io_task_device_addr);
                                    break;
                                }
                            }
                            ChannelMsg::ExitStatus { exit_status } => {
                                debug!("{} Shell exited with status code: {}", io_task_device_addr, exit_status);
                                let _ = channel.eof().await;
                                break;
                            }
                            ChannelMsg::Eof => {
                                debug!("{} Shell sent EOF.", io_task_device_addr);
                                break;
                            }
                            _ => {}
                        }
                    }
                    else => break,
                }
            }
            debug!("{} SSH I/O task ended.", io_task_device_addr);
        });

        let mut session = SshSession {
            client,
            sender: sender_to_shell,
            recv: receiver_from_shell,
            dialect,
            matcher,
            prompt: String::new(),
            device_addr,
            command_timeout,
            in_config: false,
        };

        session.read_until_prompt().await?;
        debug!("{} Initial prompt: {:?}", session.device_addr, session.prompt);

        if let Some(paging) = dialect.disable_paging {
            session.write_and_read(paging).await?;
        }

        Ok(session)
    }

    /// Whether the underlying SSH connection is still open.
    pub fn is_connected(&self) -> bool {
        !self.client.is_closed()
    }

    async fn send(&self, data: String) -> Result<(), SessionError> {
        self.sender.send(data).await.map_err(|e| {
            SessionError::Transient(format!("{} failed to send data: {e}", self.device_addr))
        })
    }

    /// Sends one line and returns everything printed up to the next prompt.
    async fn write_and_read(&mut self, command: &str) -> Result<String, SessionError> {
        // Discard anything left over from the previous exchange.
        while self.recv.try_recv().is_ok() {}

        self.send(format!("{command}\n")).await?;
        self.read_until_prompt().await
    }

    /// Reads shell output until the trailing line is a prompt, answering
    /// pagers and dialect questions on the way.
    async fn read_until_prompt(&mut self) -> Result<String, SessionError> {
        let deadline = Instant::now() + self.command_timeout;
        let mut reader = PromptReader::new(&self.matcher);

        loop {
            let data = match tokio::time::timeout_at(deadline, self.recv.recv()).await {
                Ok(Some(data)) => data,
                Ok(None) => {
                    return Err(SessionError::Transient(format!(
                        "{} channel disconnected while waiting for prompt",
                        self.device_addr
                    )));
                }
                Err(_) => {
                    return Err(SessionError::Timeout(format!(
                        "{} no prompt within {:?}, partial output: {}",
                        self.device_addr,
                        self.command_timeout,
                        reader.partial()
                    )));
                }
            };
            trace!("{:?}", data);

            match reader.feed(&data) {
                ReadStep::Prompt {
                    output,
                    prompt,
                    config,
                } => {
                    self.prompt = prompt;
                    self.in_config = config;
                    return Ok(output);
                }
                ReadStep::Reply(keys) => {
                    trace!("Input required, answering {:?}", keys);
                    self.send(keys).await?;
                }
                ReadStep::Pending => {}
            }
        }
    }

    /// Runs a command whose output must not contain a device error line.
    async fn checked(&mut self, command: &str) -> Result<String, SessionError> {
        let output = self.write_and_read(command).await?;
        match self.matcher.first_error(&output) {
            Some(line) => Err(SessionError::Other(line)),
            None => Ok(output),
        }
    }
}

#[async_trait]
impl Session for SshSession {
    async fn run_command(&mut self, command: &str) -> Result<String, SessionError> {
        self.write_and_read(command).await
    }

    async fn push_config(&mut self, lines: &[String]) -> Result<String, SessionError> {
        let mut transcript = String::new();
        if !self.in_config {
            let enter = self.dialect.enter_config;
            transcript.push_str(&self.write_and_read(enter).await?);
        }
        for line in lines {
            transcript.push_str(&self.write_and_read(line).await?);
        }
        if !self.dialect.stays_in_config_after_push() {
            let exit = self.dialect.exit_config;
            transcript.push_str(&self.write_and_read(exit).await?);
        }
        Ok(transcript)
    }

    async fn save_config(&mut self) -> Result<String, SessionError> {
        let Some(save) = self.dialect.save else {
            return Err(SessionError::Other(format!(
                "{} has no save command",
                self.dialect.vendor
            )));
        };
        self.exit_config_mode().await?;
        self.checked(save).await
    }

    async fn commit(&mut self) -> Result<String, SessionError> {
        let Some(commit) = self.dialect.commit else {
            return Err(SessionError::Other(format!(
                "{} has no candidate configuration to commit",
                self.dialect.vendor
            )));
        };
        if !self.in_config {
            let enter = self.dialect.enter_config;
            self.write_and_read(enter).await?;
        }
        self.checked(commit).await
    }

    async fn exit_config_mode(&mut self) -> Result<(), SessionError> {
        if self.in_config {
            let exit = self.dialect.exit_config;
            self.write_and_read(exit).await?;
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), SessionError> {
        debug!("{} Closing SSH connection...", self.device_addr);
        self.recv.close();

        if self.is_connected() {
            if let Err(e) = self.sender.send("exit\n".to_string()).await {
                debug!("Failed to send exit command: {:?}", e);
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        self.client.disconnect().await?;
        debug!("{} SSH connection closed", self.device_addr);
        Ok(())
    }
}

/// Socket-level failures mean the device is unreachable, which is final.
/// Handshake and authentication failures stay retryable.
fn classify_connect_error(err: async_ssh2_tokio::Error, address: &str, port: u16) -> SessionError {
    let unreachable = matches!(
        err,
        async_ssh2_tokio::Error::AddressInvalid(_)
            | async_ssh2_tokio::Error::IoError(_)
            | async_ssh2_tokio::Error::SshError(russh::Error::IO(_))
            | async_ssh2_tokio::Error::SshError(russh::Error::ConnectionTimeout)
    );
    if unreachable {
        SessionError::Timeout(format!(
            "TCP connection to device failed. Device {address}:{port}: {err}"
        ))
    } else {
        err.into()
    }
}

/// Outcome of feeding one chunk of shell output.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ReadStep {
    /// The device is at a prompt; `output` is everything read so far.
    Prompt {
        output: String,
        prompt: String,
        config: bool,
    },
    /// Keys to send before reading on.
    Reply(String),
    Pending,
}

/// Accumulates chunked shell output until a prompt shows up.
///
/// Pager lines are dropped from the output; answered questions are kept.
struct PromptReader<'m> {
    matcher: &'m PromptMatcher,
    output: String,
    line_buffer: String,
}

impl<'m> PromptReader<'m> {
    fn new(matcher: &'m PromptMatcher) -> Self {
        Self {
            matcher,
            output: String::new(),
            line_buffer: String::new(),
        }
    }

    fn feed(&mut self, data: &str) -> ReadStep {
        self.line_buffer.push_str(data);

        while let Some(newline_pos) = self.line_buffer.find('\n') {
            let line = self.line_buffer.drain(..=newline_pos).collect::<String>();
            let line = IGNORE_START_LINE.replace(&line, "");
            if !self.matcher.is_more(&line) {
                self.output.push_str(&line);
            }
        }

        if self.line_buffer.is_empty() {
            return ReadStep::Pending;
        }

        match self.matcher.classify_tail(&self.line_buffer) {
            Tail::Prompt { config } => {
                let prompt = self.line_buffer.trim().to_string();
                self.output.push_str(&self.line_buffer);
                self.line_buffer.clear();
                ReadStep::Prompt {
                    output: std::mem::take(&mut self.output),
                    prompt,
                    config,
                }
            }
            Tail::More => {
                self.line_buffer.clear();
                ReadStep::Reply(" ".to_string())
            }
            Tail::Confirm(answer) => {
                self.output.push_str(&self.line_buffer);
                self.line_buffer.clear();
                ReadStep::Reply(format!("{answer}\n"))
            }
            Tail::Pending => ReadStep::Pending,
        }
    }

    /// Everything read so far, including an unfinished line.
    fn partial(&self) -> String {
        format!("{}{}", self.output, self.line_buffer)
    }
}

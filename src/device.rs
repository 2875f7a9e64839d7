//! Per-device record tracked through a run.

use crate::settings::RunMode;
use crate::vendor::VendorKind;

/// Outcome of a device lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeviceStatus {
    /// Not yet driven to a terminal state.
    #[default]
    Pending,
    /// Session completed and all payload was applied.
    Succeeded,
    /// Lifecycle gave up; carries the last observed error.
    Failed(String),
}

/// A device in the fleet together with everything collected from it.
///
/// A descriptor is moved into exactly one worker for the length of its
/// lifecycle, so its fields are plain owned data without locking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    hostname: String,
    address: String,
    vendor: VendorKind,
    status: DeviceStatus,
    command_transcripts: Vec<String>,
    config_transcripts: Vec<String>,
}

impl DeviceDescriptor {
    pub fn new(
        hostname: impl Into<String>,
        address: impl Into<String>,
        vendor: VendorKind,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            address: address.into(),
            vendor,
            status: DeviceStatus::Pending,
            command_transcripts: Vec::new(),
            config_transcripts: Vec::new(),
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn vendor(&self) -> VendorKind {
        self.vendor
    }

    pub fn status(&self) -> &DeviceStatus {
        &self.status
    }

    /// False only once the lifecycle has given up on the device.
    pub fn connection_ok(&self) -> bool {
        !matches!(self.status, DeviceStatus::Failed(_))
    }

    /// Set if and only if [`connection_ok`](Self::connection_ok) is false.
    pub fn error_message(&self) -> Option<&str> {
        match &self.status {
            DeviceStatus::Failed(message) => Some(message),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.status, DeviceStatus::Pending)
    }

    pub fn command_transcripts(&self) -> &[String] {
        &self.command_transcripts
    }

    pub fn config_transcripts(&self) -> &[String] {
        &self.config_transcripts
    }

    /// Transcripts relevant to the run mode.
    pub fn transcripts(&self, mode: RunMode) -> &[String] {
        match mode {
            RunMode::Query => &self.command_transcripts,
            RunMode::Configure => &self.config_transcripts,
        }
    }

    pub fn push_command_transcript(&mut self, transcript: String) {
        self.command_transcripts.push(transcript);
    }

    pub fn push_config_transcript(&mut self, transcript: String) {
        self.config_transcripts.push(transcript);
    }

    /// Whether a configuration transcript carries the device error marker `%`.
    pub fn has_config_error_marker(&self) -> bool {
        self.config_transcripts.iter().any(|t| t.contains('%'))
    }

    pub fn mark_succeeded(&mut self) {
        self.status = DeviceStatus::Succeeded;
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.status = DeviceStatus::Failed(message.into());
    }

    /// Drops everything collected by a previous attempt.
    pub fn reset(&mut self) {
        self.status = DeviceStatus::Pending;
        self.command_transcripts.clear();
        self.config_transcripts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_is_set_only_for_failed_devices() {
        let mut device = DeviceDescriptor::new("r1", "10.0.0.1", VendorKind::Ios);
        assert!(device.connection_ok());
        assert_eq!(device.error_message(), None);
        assert!(!device.is_terminal());

        device.mark_failed("timed out: 10.0.0.1:22");
        assert!(!device.connection_ok());
        assert_eq!(device.error_message(), Some("timed out: 10.0.0.1:22"));

        device.mark_succeeded();
        assert!(device.connection_ok());
        assert_eq!(device.error_message(), None);
    }

    #[test]
    fn reset_clears_transcripts_and_status() {
        let mut device = DeviceDescriptor::new("r1", "10.0.0.1", VendorKind::Xr);
        device.push_command_transcript("show version".to_string());
        device.push_config_transcript("commit".to_string());
        device.mark_failed("boom");

        device.reset();

        assert_eq!(device.status(), &DeviceStatus::Pending);
        assert!(device.command_transcripts().is_empty());
        assert!(device.config_transcripts().is_empty());
    }

    #[test]
    fn transcripts_follow_run_mode() {
        let mut device = DeviceDescriptor::new("r1", "10.0.0.1", VendorKind::Ios);
        device.push_command_transcript("show clock".to_string());
        device.push_config_transcript("% Invalid input detected".to_string());

        assert_eq!(device.transcripts(RunMode::Query), ["show clock"]);
        assert!(device.has_config_error_marker());
    }
}

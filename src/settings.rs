//! Immutable run settings and the shared credential pair.

use std::fmt;
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config;
use crate::error::FleetError;
use crate::session::SecurityLevel;
use crate::vendor::VendorKind;

/// What the run does on each device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Issue read-only commands and collect their output.
    Query,
    /// Push configuration lines and commit them.
    Configure,
}

/// Settings fixed before the worker pool starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RunSettings {
    /// Number of concurrent workers (1..=100).
    pub max_threads: u16,
    /// Push configuration instead of collecting command output.
    pub configure_mode: bool,
    /// Vendor kind for devices that do not override it in the inventory.
    pub vendor: VendorKind,
    /// Optional deadline for a whole device attempt, in seconds.
    pub device_timeout_secs: Option<u64>,
    /// Deadline for opening a session, in seconds.
    pub connect_timeout_secs: u64,
    /// SSH port used for every device.
    pub ssh_port: u16,
    /// SSH algorithm profile.
    pub security: SecurityLevel,
}

impl RunSettings {
    pub fn new(
        max_threads: u16,
        configure_mode: bool,
        vendor: VendorKind,
    ) -> Result<Self, FleetError> {
        if max_threads == 0 || max_threads > config::MAX_THREADS {
            return Err(FleetError::WorkerCount {
                got: max_threads as usize,
                max: config::MAX_THREADS as usize,
            });
        }
        Ok(Self {
            max_threads,
            configure_mode,
            vendor,
            device_timeout_secs: None,
            connect_timeout_secs: config::DEFAULT_CONNECT_TIMEOUT.as_secs(),
            ssh_port: 22,
            security: SecurityLevel::Secure,
        })
    }

    pub fn with_device_timeout(mut self, secs: Option<u64>) -> Self {
        self.device_timeout_secs = secs;
        self
    }

    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.ssh_port = port;
        self
    }

    pub fn with_security(mut self, level: SecurityLevel) -> Self {
        self.security = level;
        self
    }

    pub fn mode(&self) -> RunMode {
        if self.configure_mode {
            RunMode::Configure
        } else {
            RunMode::Query
        }
    }

    pub fn device_timeout(&self) -> Option<Duration> {
        self.device_timeout_secs.map(Duration::from_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Settings summary printed before the run starts.
    pub fn banner(&self) -> String {
        format!(
            "max threads:...................{}\nconfig mode:...................{}\nOS:............................{}\n",
            self.max_threads,
            if self.configure_mode { "True" } else { "False" },
            self.vendor.device_type(),
        )
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            max_threads: config::DEFAULT_MAX_THREADS,
            configure_mode: false,
            vendor: VendorKind::default(),
            device_timeout_secs: None,
            connect_timeout_secs: config::DEFAULT_CONNECT_TIMEOUT.as_secs(),
            ssh_port: 22,
            security: SecurityLevel::Secure,
        }
    }
}

/// Username and password shared read-only by every worker.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_count_must_be_within_bounds() {
        assert!(RunSettings::new(1, false, VendorKind::Ios).is_ok());
        assert!(RunSettings::new(100, false, VendorKind::Ios).is_ok());
        assert!(matches!(
            RunSettings::new(0, false, VendorKind::Ios),
            Err(FleetError::WorkerCount { got: 0, max: 100 })
        ));
        assert!(matches!(
            RunSettings::new(101, true, VendorKind::Xr),
            Err(FleetError::WorkerCount { got: 101, .. })
        ));
    }

    #[test]
    fn mode_follows_configure_flag() {
        let settings = RunSettings::new(2, true, VendorKind::Huawei).unwrap();
        assert_eq!(settings.mode(), RunMode::Configure);
        assert_eq!(RunSettings::default().mode(), RunMode::Query);
    }

    #[test]
    fn banner_lists_threads_mode_and_os() {
        let banner = RunSettings::new(8, true, VendorKind::Xr).unwrap().banner();
        assert!(banner.contains("max threads:...................8"));
        assert!(banner.contains("config mode:...................True"));
        assert!(banner.contains("OS:............................cisco_xr"));
    }

    #[test]
    fn credentials_debug_hides_password() {
        let rendered = format!("{:?}", Credentials::new("admin", "hunter2"));
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
    }
}

//! Vendor capability dispatch.
//!
//! Every device family exposes the same two capabilities, `configure` and
//! `commit`, but with different semantics:
//!
//! | Vendor | configure | commit |
//! |---|---|---|
//! | IOS, XE | push lines | save running config, failures become transcript notes |
//! | Huawei | push lines | save, failures become transcript notes |
//! | XR | push lines, then `show configuration` | commit candidate, exit config mode, failures are fatal |
//! | JunOS MX | push lines, then `show \| compare` | commit candidate, exit config mode, failures are fatal |

use std::fmt;
use std::str::FromStr;

use log::warn;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{AttemptError, FleetError, SessionError};
use crate::session::Session;

/// Device family. Determines the session dialect and configure/commit behavior.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum VendorKind {
    /// Cisco IOS.
    #[default]
    Ios,
    /// Cisco IOS XR.
    Xr,
    /// Cisco IOS XE.
    Xe,
    /// Huawei VRP.
    #[serde(alias = "hua")]
    Huawei,
    /// Juniper JunOS (MX series).
    #[serde(rename = "mx", alias = "junos")]
    JunosMx,
}

/// How a vendor makes pushed configuration permanent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStyle {
    /// Running config is live; "commit" saves it to startup storage.
    SaveConfig,
    /// Pushed lines are staged in a candidate that must be committed.
    Candidate,
}

impl VendorKind {
    pub const ALL: [VendorKind; 5] = [
        VendorKind::Ios,
        VendorKind::Xr,
        VendorKind::Xe,
        VendorKind::Huawei,
        VendorKind::JunosMx,
    ];

    /// Short token used on the command line and in inventory files.
    pub fn token(self) -> &'static str {
        match self {
            VendorKind::Ios => "ios",
            VendorKind::Xr => "xr",
            VendorKind::Xe => "xe",
            VendorKind::Huawei => "hua",
            VendorKind::JunosMx => "mx",
        }
    }

    /// Device type name as used by common automation tooling.
    pub fn device_type(self) -> &'static str {
        match self {
            VendorKind::Ios => "cisco_ios",
            VendorKind::Xr => "cisco_xr",
            VendorKind::Xe => "cisco_xe",
            VendorKind::Huawei => "huawei",
            VendorKind::JunosMx => "juniper",
        }
    }

    pub fn commit_style(self) -> CommitStyle {
        match self {
            VendorKind::Ios | VendorKind::Xe | VendorKind::Huawei => CommitStyle::SaveConfig,
            VendorKind::Xr | VendorKind::JunosMx => CommitStyle::Candidate,
        }
    }

    /// Read issued after pushing lines to show the staged candidate.
    pub fn verify_command(self) -> Option<&'static str> {
        match self {
            VendorKind::Xr => Some("show configuration"),
            VendorKind::JunosMx => Some("show | compare"),
            _ => None,
        }
    }

    /// Pushes configuration lines and returns the transcripts produced.
    pub async fn configure(
        self,
        session: &mut dyn Session,
        lines: &[String],
    ) -> Result<Vec<String>, SessionError> {
        let mut transcripts = vec![session.push_config(lines).await?];
        if let Some(verify) = self.verify_command() {
            transcripts.push(session.run_command(verify).await?);
        }
        Ok(transcripts)
    }

    /// Makes the pushed configuration permanent.
    ///
    /// For save-config vendors a failed save is turned into a diagnostic
    /// line in the returned transcript. Candidate vendors return
    /// [`AttemptError::Commit`] when the commit is rejected.
    pub async fn commit(self, session: &mut dyn Session) -> Result<Vec<String>, AttemptError> {
        match self.commit_style() {
            CommitStyle::SaveConfig => match session.save_config().await {
                Ok(transcript) => Ok(vec![transcript]),
                Err(err) => {
                    warn!("{} save config reported: {}", self.token(), err);
                    let mut transcripts = vec![self.save_failure_note(&err)];
                    if matches!(self, VendorKind::Ios | VendorKind::Xe) {
                        // resync with the prompt after the save dialog went sideways
                        transcripts.push(session.run_command("").await?);
                    }
                    Ok(transcripts)
                }
            },
            CommitStyle::Candidate => {
                let transcript = session.commit().await.map_err(AttemptError::Commit)?;
                if let Err(err) = session.exit_config_mode().await {
                    warn!("{} leaving configuration mode after commit: {}", self.token(), err);
                }
                Ok(vec![transcript])
            }
        }
    }

    fn save_failure_note(self, err: &SessionError) -> String {
        match self {
            VendorKind::Huawei => format!("COMMIT error: {err}"),
            _ => format!("COMMIT is OK after msg:{err}"),
        }
    }
}

impl fmt::Display for VendorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.device_type())
    }
}

impl FromStr for VendorKind {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ios" | "cisco_ios" => Ok(VendorKind::Ios),
            "xr" | "cisco_xr" => Ok(VendorKind::Xr),
            "xe" | "cisco_xe" => Ok(VendorKind::Xe),
            "hua" | "huawei" => Ok(VendorKind::Huawei),
            "mx" | "junos" | "juniper" => Ok(VendorKind::JunosMx),
            _ => Err(FleetError::UnknownVendor(s.to_string())),
        }
    }
}

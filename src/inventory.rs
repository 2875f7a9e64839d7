//! YAML input files: device inventory, credentials and payload.
//!
//! ```yaml
//! # devices.yaml
//! core-sw1: 10.0.0.1
//! pe1:
//!   address: 10.0.0.2
//!   vendor: xr
//!
//! # psw.yaml
//! - admin
//! - secret
//!
//! # cmd.yaml / cfg.yaml
//! - show version
//! - show clock
//! ```

use std::fs;
use std::path::Path;

use log::debug;
use serde::Deserialize;
use serde_yaml::Value;

use crate::device::DeviceDescriptor;
use crate::error::FleetError;
use crate::settings::Credentials;
use crate::vendor::VendorKind;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InventoryEntry {
    Address(String),
    Detailed {
        address: String,
        #[serde(default)]
        vendor: Option<String>,
    },
}

/// Reads the inventory, giving every entry without its own vendor `default_vendor`.
pub fn load_inventory(
    path: &Path,
    default_vendor: VendorKind,
) -> Result<Vec<DeviceDescriptor>, FleetError> {
    parse_inventory(path, &read(path)?, default_vendor)
}

pub fn load_credentials(path: &Path) -> Result<Credentials, FleetError> {
    parse_credentials(path, &read(path)?)
}

pub fn load_payload(path: &Path) -> Result<Vec<String>, FleetError> {
    parse_payload(path, &read(path)?)
}

/// Parses inventory text. Device order follows the file.
pub fn parse_inventory(
    path: &Path,
    text: &str,
    default_vendor: VendorKind,
) -> Result<Vec<DeviceDescriptor>, FleetError> {
    let mapping = match from_yaml::<Value>(path, text)? {
        Value::Mapping(mapping) => mapping,
        Value::Null => serde_yaml::Mapping::new(),
        _ => {
            return Err(FleetError::Invalid(format!(
                "{}: expected a mapping of hostname to address",
                path.display()
            )));
        }
    };
    if mapping.is_empty() {
        return Err(FleetError::Invalid(format!(
            "{}: no devices",
            path.display()
        )));
    }

    let mut devices = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let hostname = scalar_to_string(&key).ok_or_else(|| {
            FleetError::Invalid(format!("{}: hostname must be a scalar", path.display()))
        })?;
        let entry: InventoryEntry =
            serde_yaml::from_value(value).map_err(|source| FleetError::Yaml {
                path: path.to_path_buf(),
                source,
            })?;
        let device = match entry {
            InventoryEntry::Address(address) => {
                DeviceDescriptor::new(hostname, address, default_vendor)
            }
            InventoryEntry::Detailed { address, vendor } => {
                let vendor = match vendor {
                    Some(token) => token.parse()?,
                    None => default_vendor,
                };
                DeviceDescriptor::new(hostname, address, vendor)
            }
        };
        devices.push(device);
    }
    debug!("loaded {} devices from {}", devices.len(), path.display());
    Ok(devices)
}

/// Parses a `[username, password]` sequence.
pub fn parse_credentials(path: &Path, text: &str) -> Result<Credentials, FleetError> {
    let values: Vec<Value> = from_yaml(path, text)?;
    match values.as_slice() {
        [user, pass] => {
            let user = scalar_to_string(user);
            let pass = scalar_to_string(pass);
            match (user, pass) {
                (Some(user), Some(pass)) => Ok(Credentials::new(user, pass)),
                _ => Err(FleetError::Invalid(format!(
                    "{}: username and password must be scalars",
                    path.display()
                ))),
            }
        }
        other => Err(FleetError::Invalid(format!(
            "{}: expected [username, password], got {} entries",
            path.display(),
            other.len()
        ))),
    }
}

/// Parses a sequence of command or configuration lines.
pub fn parse_payload(path: &Path, text: &str) -> Result<Vec<String>, FleetError> {
    let values = match from_yaml::<Value>(path, text)? {
        Value::Sequence(values) => values,
        Value::Null => Vec::new(),
        _ => {
            return Err(FleetError::Invalid(format!(
                "{}: expected a list of lines",
                path.display()
            )));
        }
    };
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| match value {
            Value::String(line) => Ok(line),
            _ => Err(FleetError::Invalid(format!(
                "{}: entry {} is not a string",
                path.display(),
                index + 1
            ))),
        })
        .collect()
}

fn read(path: &Path) -> Result<String, FleetError> {
    fs::read_to_string(path).map_err(|source| FleetError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn from_yaml<T: serde::de::DeserializeOwned>(path: &Path, text: &str) -> Result<T, FleetError> {
    serde_yaml::from_str(text).map_err(|source| FleetError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

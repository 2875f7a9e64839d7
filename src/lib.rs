//! # fleetpush - Concurrent Network Fleet Runner
//!
//! `fleetpush` connects to a fleet of network devices over SSH with a bounded
//! number of concurrent workers, runs read-only commands or pushes and commits
//! configuration lines, and gathers per-device transcripts into a success
//! bundle and a failure bundle.
//!
//! ## Features
//!
//! - **Bounded Worker Pool**: A fixed set of tokio workers drains a shared queue; each device is processed exactly once
//! - **Retrying Lifecycle**: Transient connection failures are retried with a fixed delay, timeouts are not
//! - **Vendor Dispatch**: Cisco IOS/XE/XR, Huawei and Juniper MX differ in how configuration is committed
//! - **Prompt Detection**: Interactive shells are read until the vendor prompt, with pagers and confirmations answered
//! - **Offline Runs**: Scripted sessions exercise the whole pipeline without network access
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use fleetpush::lifecycle::Lifecycle;
//! use fleetpush::pool::run_pool;
//! use fleetpush::report::aggregate;
//! use fleetpush::session::SshConnector;
//! use fleetpush::settings::{Credentials, RunSettings};
//! use fleetpush::{DeviceDescriptor, VendorKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = RunSettings::new(10, false, VendorKind::Ios)?;
//!     let lifecycle = Lifecycle::new(
//!         SshConnector::from_settings(&settings),
//!         Arc::new(Credentials::new("admin", "password")),
//!         Arc::new(settings.clone()),
//!         Arc::new(vec!["show version".to_string()]),
//!     );
//!
//!     let devices = vec![DeviceDescriptor::new("core-sw1", "192.168.1.1", VendorKind::Ios)];
//!     let finished = run_pool(devices, settings.max_threads as usize, Arc::new(lifecycle)).await?;
//!
//!     let result = aggregate(&finished, settings.mode());
//!     println!("{}", result.summary_line());
//!     Ok(())
//! }
//! ```
//!
//! ## Main Components
//!
//! - [`pool::WorkerPool`] - Work queue and worker pool with a drain barrier
//! - [`lifecycle::Lifecycle`] - Per-device connect, execute and retry state machine
//! - [`vendor::VendorKind`] - Vendor-specific configure and commit behaviour
//! - [`session`] - The `Connector`/`Session` seam with SSH and scripted implementations
//! - [`report`] and [`output`] - Result bundles and the dated log files

pub mod config;
pub mod device;
pub mod error;
pub mod inventory;
pub mod lifecycle;
pub mod output;
pub mod pool;
pub mod report;
pub mod retry;
pub mod session;
pub mod settings;
pub mod vendor;

pub use device::{DeviceDescriptor, DeviceStatus};
pub use error::{AttemptError, FleetError, SessionError};
pub use vendor::VendorKind;

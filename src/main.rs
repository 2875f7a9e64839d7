//! fleetpush command-line entry point.
//!
//! Loads the inventory, credentials and payload files, drives every device
//! through the worker pool and writes the dated result logs.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use log::{error, info};

use fleetpush::config;
use fleetpush::inventory::{load_credentials, load_inventory, load_payload};
use fleetpush::lifecycle::Lifecycle;
use fleetpush::output::LogWriter;
use fleetpush::pool::run_pool;
use fleetpush::report::aggregate;
use fleetpush::retry::RetryPolicy;
use fleetpush::session::{Connector, ScriptedConnector, SecurityLevel, SshConnector};
use fleetpush::settings::{Credentials, RunSettings};
use fleetpush::{DeviceDescriptor, FleetError, VendorKind};

const RULE: &str = "-------------------------------------------------------------------------------------------------------";

/// Run commands or push configuration across a fleet of network devices
#[derive(Parser, Debug)]
#[command(name = "fleetpush")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of concurrent workers
    #[arg(short = 't', long, default_value_t = config::DEFAULT_MAX_THREADS,
          value_parser = clap::value_parser!(u16).range(1..=config::MAX_THREADS as i64))]
    max_threads: u16,

    /// Push configuration lines instead of collecting command output
    #[arg(short = 'c', long)]
    configure: bool,

    /// Vendor kind for inventory entries without their own (ios, xr, xe, hua, mx)
    #[arg(short = 'v', long, default_value = "ios")]
    vendor: VendorKind,

    /// Inventory file (hostname: address)
    #[arg(long, default_value = "devices.yaml")]
    devices: PathBuf,

    /// Credentials file ([username, password])
    #[arg(long, default_value = "psw.yaml")]
    credentials: PathBuf,

    /// Commands collected in query mode
    #[arg(long, default_value = "cmd.yaml")]
    commands: PathBuf,

    /// Configuration lines pushed in configure mode
    #[arg(long, default_value = "cfg.yaml")]
    config_lines: PathBuf,

    /// Root directory for dated result logs
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// Deadline for a whole device attempt, in seconds
    #[arg(long)]
    device_timeout: Option<u64>,

    /// Deadline for opening a session, in seconds
    #[arg(long, default_value_t = config::DEFAULT_CONNECT_TIMEOUT.as_secs())]
    connect_timeout: u64,

    /// Deadline for a single command to return to a prompt, in seconds
    #[arg(long, default_value_t = config::DEFAULT_COMMAND_TIMEOUT.as_secs())]
    command_timeout: u64,

    /// Delay between connection attempts, in seconds
    #[arg(long, default_value_t = config::DEFAULT_RETRY_DELAY.as_secs())]
    retry_delay: u64,

    /// SSH port
    #[arg(long, default_value = "22")]
    port: u16,

    /// Offer legacy key exchange, cipher and host key algorithms
    #[arg(long)]
    legacy_ssh: bool,

    /// Replay devices from a JSONL script instead of connecting over SSH
    #[arg(long)]
    script: Option<PathBuf>,

    /// Print the aggregated result as JSON
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let started = Local::now();
    let clock = Instant::now();

    let security = if args.legacy_ssh {
        SecurityLevel::LegacyCompatible
    } else {
        SecurityLevel::Secure
    };
    let settings = RunSettings::new(args.max_threads, args.configure, args.vendor)?
        .with_device_timeout(args.device_timeout)
        .with_connect_timeout(args.connect_timeout)
        .with_port(args.port)
        .with_security(security);
    println!();
    println!("{}", settings.banner());

    let credentials = load_credentials(&args.credentials).context("loading credentials")?;
    let devices = load_inventory(&args.devices, settings.vendor).context("loading inventory")?;
    let payload_path = if settings.configure_mode {
        &args.config_lines
    } else {
        &args.commands
    };
    let payload = load_payload(payload_path).context("loading payload")?;
    info!(
        "{} devices, {} payload lines from {}",
        devices.len(),
        payload.len(),
        payload_path.display()
    );

    println!("{RULE}");
    println!("hostname               ip address      comment");
    println!("---------------------- --------------- ----------------------------------------------------------------");

    let fleet = Fleet {
        credentials: Arc::new(credentials),
        settings: Arc::new(settings),
        payload: Arc::new(payload),
        retry: RetryPolicy::new(
            config::DEFAULT_MAX_ATTEMPTS,
            Duration::from_secs(args.retry_delay),
        ),
    };
    let finished = match &args.script {
        Some(path) => fleet.drive(scripted_connector(path)?, devices).await?,
        None => {
            let connector = SshConnector::from_settings(&fleet.settings)
                .with_command_timeout(Duration::from_secs(args.command_timeout));
            fleet.drive(connector, devices).await?
        }
    };

    println!();
    let result = aggregate(&finished, fleet.settings.mode());
    let written = LogWriter::new(&args.log_dir)
        .write(&result, started)
        .context("writing result logs")?;
    info!("results in {}", written.success.display());
    if let Some(failures) = &written.failures {
        info!("connection errors in {}", failures.display());
    }

    println!("{RULE}");
    println!("{}", result.summary_line());
    println!("elapsed time: {:.2?}", clock.elapsed());
    println!("{RULE}");

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    Ok(())
}

/// Shared, immutable inputs of one run.
struct Fleet {
    credentials: Arc<Credentials>,
    settings: Arc<RunSettings>,
    payload: Arc<Vec<String>>,
    retry: RetryPolicy,
}

impl Fleet {
    async fn drive<C: Connector + 'static>(
        &self,
        connector: C,
        devices: Vec<DeviceDescriptor>,
    ) -> Result<Vec<DeviceDescriptor>, FleetError> {
        let lifecycle = Lifecycle::new(
            connector,
            self.credentials.clone(),
            self.settings.clone(),
            self.payload.clone(),
        )
        .with_retry_policy(self.retry);
        run_pool(
            devices,
            self.settings.max_threads as usize,
            Arc::new(lifecycle),
        )
        .await
    }
}

fn scripted_connector(path: &Path) -> Result<ScriptedConnector> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading script {}", path.display()))?;
    Ok(ScriptedConnector::from_jsonl(&text)?)
}

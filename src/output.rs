//! Writes the success and failure bundles under a dated log directory.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::info;

use crate::error::FleetError;
use crate::report::AggregationResult;
use crate::settings::RunMode;

/// Files produced by one [`LogWriter::write`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenLogs {
    pub success: PathBuf,
    /// Present only when at least one device failed.
    pub failures: Option<PathBuf>,
}

/// Persists run bundles as `<root>/<YYYY.MM.DD>/<HH.MM.SS>_<kind>.txt`.
#[derive(Debug, Clone)]
pub struct LogWriter {
    root: PathBuf,
}

impl LogWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn write(
        &self,
        result: &AggregationResult,
        started: DateTime<Local>,
    ) -> Result<WrittenLogs, FleetError> {
        let folder = self.root.join(started.format("%Y.%m.%d").to_string());
        fs::create_dir_all(&folder).map_err(|source| FleetError::Io {
            path: folder.clone(),
            source,
        })?;
        let stamp = started.format("%H.%M.%S");

        let success_name = match result.mode {
            RunMode::Configure => format!("{stamp}_conf_logs.txt"),
            RunMode::Query => format!("{stamp}_show_commands_log.txt"),
        };
        let success = folder.join(success_name);
        write_file(&success, &result.render_success())?;
        info!("wrote {}", success.display());

        let failures = match result.render_failures() {
            Some(text) => {
                let path = folder.join(format!("{stamp}_connection_error_msg.txt"));
                write_file(&path, &text)?;
                info!("wrote {}", path.display());
                Some(path)
            }
            None => None,
        };

        Ok(WrittenLogs { success, failures })
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), FleetError> {
    fs::write(path, contents).map_err(|source| FleetError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::device::DeviceDescriptor;
    use crate::report::aggregate;
    use crate::vendor::VendorKind;

    fn started() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 5, 9, 7, 1).unwrap()
    }

    #[test]
    fn writes_dated_success_file_without_failure_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut device = DeviceDescriptor::new("r1", "10.0.0.1", VendorKind::Ios);
        device.push_command_transcript("show clock\n12:00\nr1#".to_string());
        device.mark_succeeded();
        let result = aggregate(&[device], RunMode::Query);

        let written = LogWriter::new(dir.path()).write(&result, started()).unwrap();

        assert_eq!(
            written.success,
            dir.path().join("2024.03.05").join("09.07.01_show_commands_log.txt")
        );
        assert_eq!(written.failures, None);
        let text = fs::read_to_string(&written.success).unwrap();
        assert!(text.contains("### r1 : 10.0.0.1 ###"));
        assert!(!dir
            .path()
            .join("2024.03.05/09.07.01_connection_error_msg.txt")
            .exists());
    }

    #[test]
    fn writes_failure_file_when_a_device_failed() {
        let dir = tempfile::tempdir().unwrap();
        let mut ok = DeviceDescriptor::new("r1", "10.0.0.1", VendorKind::Ios);
        ok.mark_succeeded();
        let mut down = DeviceDescriptor::new("r2", "10.0.0.2", VendorKind::Ios);
        down.mark_failed("timed out: 10.0.0.2:22");
        let result = aggregate(&[ok, down], RunMode::Configure);

        let written = LogWriter::new(dir.path()).write(&result, started()).unwrap();

        assert!(written.success.ends_with("09.07.01_conf_logs.txt"));
        let failures = written.failures.unwrap();
        let text = fs::read_to_string(failures).unwrap();
        assert!(text.contains("timed out: 10.0.0.2:22"));
        assert!(!text.contains("r1"));
    }
}

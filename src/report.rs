//! Aggregation of finished descriptors into success and failure bundles.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::device::DeviceDescriptor;
use crate::settings::RunMode;

const SUCCESS_RULE: char = '#';
const FAILURE_RULE: char = '-';
const RULE_WIDTH: usize = 80;

/// One hostname-tagged block of a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReportBlock {
    pub hostname: String,
    pub address: String,
    /// Transcripts for a success block, the error message for a failure block.
    pub entries: Vec<String>,
}

/// Both bundles and the counts of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AggregationResult {
    pub mode: RunMode,
    pub failed_count: usize,
    pub total_count: usize,
    pub successes: Vec<ReportBlock>,
    pub failures: Vec<ReportBlock>,
}

/// Splits the descriptors into bundles, keeping descriptor-list order.
///
/// Must only be called after the pool has drained.
pub fn aggregate(devices: &[DeviceDescriptor], mode: RunMode) -> AggregationResult {
    let mut successes = Vec::new();
    let mut failures = Vec::new();

    for device in devices {
        match device.error_message() {
            None => successes.push(ReportBlock {
                hostname: device.hostname().to_string(),
                address: device.address().to_string(),
                entries: device.transcripts(mode).to_vec(),
            }),
            Some(message) => failures.push(ReportBlock {
                hostname: device.hostname().to_string(),
                address: device.address().to_string(),
                entries: vec![message.to_string()],
            }),
        }
    }

    AggregationResult {
        mode,
        failed_count: failures.len(),
        total_count: devices.len(),
        successes,
        failures,
    }
}

impl AggregationResult {
    /// Text of the success bundle; empty when nothing succeeded.
    pub fn render_success(&self) -> String {
        let mut out = String::new();
        for block in &self.successes {
            push_header(&mut out, SUCCESS_RULE, block);
            out.push_str(&block.entries.concat());
            out.push_str("\n\n");
        }
        out
    }

    /// Text of the failure bundle, or `None` when every device succeeded.
    pub fn render_failures(&self) -> Option<String> {
        if self.failed_count == 0 {
            return None;
        }
        let mut out = String::new();
        for block in &self.failures {
            push_header(&mut out, FAILURE_RULE, block);
            for entry in &block.entries {
                out.push_str(entry);
                out.push('\n');
            }
            out.push_str("\n\n");
        }
        Some(out)
    }

    pub fn summary_line(&self) -> String {
        format!(
            "failed connection: {} / total device number: {}",
            self.failed_count, self.total_count
        )
    }
}

fn push_header(out: &mut String, rule: char, block: &ReportBlock) {
    out.extend(std::iter::repeat_n(rule, RULE_WIDTH));
    out.push('\n');
    out.push_str(&format!("### {} : {} ###\n\n", block.hostname, block.address));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vendor::VendorKind;

    fn finished_fleet() -> Vec<DeviceDescriptor> {
        let mut a = DeviceDescriptor::new("A", "10.0.0.1", VendorKind::Ios);
        a.push_config_transcript("conf t\n".to_string());
        a.push_config_transcript("write memory\n".to_string());
        a.mark_succeeded();

        let mut b = DeviceDescriptor::new("B", "10.0.0.2", VendorKind::Xr);
        b.mark_failed("timed out: 10.0.0.2:22");

        let mut c = DeviceDescriptor::new("C", "10.0.0.3", VendorKind::Huawei);
        c.push_command_transcript("display version\n".to_string());
        c.mark_succeeded();

        vec![a, b, c]
    }

    #[test]
    fn counts_match_connection_status() {
        let result = aggregate(&finished_fleet(), RunMode::Configure);

        assert_eq!(result.failed_count, 1);
        assert_eq!(result.total_count, 3);
        let hosts: Vec<_> = result.successes.iter().map(|b| b.hostname.as_str()).collect();
        assert_eq!(hosts, ["A", "C"]);
        assert_eq!(result.failures[0].hostname, "B");
        assert_eq!(result.summary_line(), "failed connection: 1 / total device number: 3");
    }

    #[test]
    fn blocks_carry_mode_dependent_transcripts() {
        let devices = finished_fleet();

        let configure = aggregate(&devices, RunMode::Configure);
        assert_eq!(configure.successes[0].entries.len(), 2);
        assert!(configure.successes[1].entries.is_empty());

        let query = aggregate(&devices, RunMode::Query);
        assert!(query.successes[0].entries.is_empty());
        assert_eq!(query.successes[1].entries, ["display version\n"]);
    }

    #[test]
    fn aggregation_is_idempotent() {
        let devices = finished_fleet();
        let first = aggregate(&devices, RunMode::Configure);
        let second = aggregate(&devices, RunMode::Configure);

        assert_eq!(first, second);
        assert_eq!(first.render_success(), second.render_success());
    }

    #[test]
    fn rendered_blocks_use_rules_and_headers() {
        let result = aggregate(&finished_fleet(), RunMode::Configure);

        let success = result.render_success();
        let expected_a = format!(
            "{}\n### A : 10.0.0.1 ###\n\nconf t\nwrite memory\n\n\n",
            "#".repeat(80)
        );
        assert!(success.starts_with(&expected_a));
        assert!(success.contains("### C : 10.0.0.3 ###"));

        let failures = result.render_failures().unwrap();
        assert_eq!(
            failures,
            format!(
                "{}\n### B : 10.0.0.2 ###\n\ntimed out: 10.0.0.2:22\n\n\n",
                "-".repeat(80)
            )
        );
    }

    #[test]
    fn no_failure_bundle_when_everything_succeeded() {
        let mut device = DeviceDescriptor::new("A", "10.0.0.1", VendorKind::Ios);
        device.mark_succeeded();

        let result = aggregate(&[device], RunMode::Query);

        assert_eq!(result.failed_count, 0);
        assert_eq!(result.render_failures(), None);
    }
}

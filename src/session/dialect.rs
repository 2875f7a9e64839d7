//! Per-vendor command-line dialects.
//!
//! A dialect lists the prompt shapes of a device family and the commands used
//! to disable paging, move in and out of configuration mode, save and commit.

use crate::vendor::VendorKind;

#[derive(Debug)]
pub struct Dialect {
    pub vendor: VendorKind,
    /// Prompts outside configuration mode.
    pub exec_prompts: &'static [&'static str],
    pub config_prompts: &'static [&'static str],
    /// Pagination markers answered with a space.
    pub more_patterns: &'static [&'static str],
    /// Lines the device prints when it rejects an operation.
    pub error_patterns: &'static [&'static str],
    /// Interactive questions and the answer sent back.
    pub confirmations: &'static [(&'static str, &'static str)],
    pub disable_paging: Option<&'static str>,
    pub enter_config: &'static str,
    pub exit_config: &'static str,
    pub save: Option<&'static str>,
    pub commit: Option<&'static str>,
}

impl Dialect {
    /// Candidate dialects stay in configuration mode after pushing lines.
    pub fn stays_in_config_after_push(&self) -> bool {
        self.commit.is_some()
    }
}

const CISCO_EXEC_PROMPTS: &[&str] = &[r"^[^\s#]+#\s*$", r"^[^\s<]+>\s*$"];
const CISCO_CONFIG_PROMPTS: &[&str] = &[r"^\S+\(\S+\)#\s*$"];
const CISCO_ERRORS: &[&str] = &[
    r"^%.+",
    r"^Command authorization failed.*",
    r"^Command rejected:.*",
    r"ERROR:.+",
];

// IOS and XE share prompts and commands.
const CISCO_IOS: Dialect = Dialect {
    vendor: VendorKind::Ios,
    exec_prompts: CISCO_EXEC_PROMPTS,
    config_prompts: CISCO_CONFIG_PROMPTS,
    more_patterns: &[r"\s*--More--\s*", r"\s*<--- More --->\s*"],
    error_patterns: CISCO_ERRORS,
    confirmations: &[(r"Destination filename \[startup-config\]\?\s*$", "")],
    disable_paging: Some("terminal length 0"),
    enter_config: "configure terminal",
    exit_config: "end",
    save: Some("write memory"),
    commit: None,
};

static IOS: Dialect = CISCO_IOS;

static XE: Dialect = Dialect {
    vendor: VendorKind::Xe,
    ..CISCO_IOS
};

static XR: Dialect = Dialect {
    vendor: VendorKind::Xr,
    exec_prompts: CISCO_EXEC_PROMPTS,
    config_prompts: CISCO_CONFIG_PROMPTS,
    more_patterns: &[r"\s*--More--\s*"],
    error_patterns: CISCO_ERRORS,
    confirmations: &[(
        r"Uncommitted changes found, commit them before exiting\(yes/no/cancel\)\?.*$",
        "no",
    )],
    disable_paging: Some("terminal length 0"),
    enter_config: "configure terminal",
    exit_config: "end",
    save: None,
    commit: Some("commit"),
};

static HUAWEI: Dialect = Dialect {
    vendor: VendorKind::Huawei,
    exec_prompts: &[r"^(RBM_P|RBM_S)?<.+>\s*$"],
    config_prompts: &[r"^(HRP_M|HRP_S){0,1}\[.+]+\s*$"],
    more_patterns: &[r"\s*---- More ----\s*"],
    error_patterns: &[r"Error: .+$"],
    confirmations: &[
        (r"Are you sure to continue\?\s*\[Y/N\]:?\s*$", "y"),
        (
            r"Warning: The current configuration will be written to the device\. Continue\? \[Y/N\]:?\s*$",
            "y",
        ),
        (r"startup saved-configuration file on peer device\?\[Y/N\]:?\s*$", "y"),
    ],
    disable_paging: Some("screen-length 0 temporary"),
    enter_config: "system-view",
    exit_config: "return",
    save: Some("save"),
    commit: None,
};

static JUNOS_MX: Dialect = Dialect {
    vendor: VendorKind::JunosMx,
    exec_prompts: &[r"^\S+@\S+>\s*$"],
    config_prompts: &[r"^\S+@\S+#\s*$"],
    more_patterns: &[r"---\(more.*\)---"],
    error_patterns: &[r"^error:.+", r".*unknown command.*", r"syntax error.*"],
    confirmations: &[(r"Exit with uncommitted changes\? \[yes,no\] \(yes\)\s*$", "yes")],
    disable_paging: Some("set cli screen-length 0"),
    enter_config: "configure",
    exit_config: "exit configuration-mode",
    save: None,
    commit: Some("commit"),
};

/// Returns the dialect for a vendor kind.
pub fn dialect_for(vendor: VendorKind) -> &'static Dialect {
    match vendor {
        VendorKind::Ios => &IOS,
        VendorKind::Xe => &XE,
        VendorKind::Xr => &XR,
        VendorKind::Huawei => &HUAWEI,
        VendorKind::JunosMx => &JUNOS_MX,
    }
}

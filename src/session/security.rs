//! SSH algorithm profiles and the client parameters derived from them.

use std::borrow::Cow;
use std::time::Duration;

use async_ssh2_tokio::{Config, ServerCheckMethod};
use russh::Preferred;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config;

/// Algorithm profile offered to devices during key exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLevel {
    /// Modern algorithms only.
    #[default]
    Secure,
    /// Everything russh can speak, SHA-1 and CBC included.
    LegacyCompatible,
}

impl SecurityLevel {
    /// Algorithms offered to the device, most preferred first.
    pub fn preferred(self) -> Preferred {
        let (kex, key, cipher, mac) = match self {
            SecurityLevel::Secure => (
                config::SECURE_KEX_ORDER,
                config::SECURE_KEY_TYPES,
                config::SECURE_CIPHERS,
                config::SECURE_MAC_ALGORITHMS,
            ),
            SecurityLevel::LegacyCompatible => (
                config::LEGACY_KEX_ORDER,
                config::LEGACY_KEY_TYPES,
                config::LEGACY_CIPHERS,
                config::LEGACY_MAC_ALGORITHMS,
            ),
        };
        Preferred {
            kex: Cow::Borrowed(kex),
            key: Cow::Borrowed(key),
            cipher: Cow::Borrowed(cipher),
            mac: Cow::Borrowed(mac),
            compression: Cow::Borrowed(config::DEFAULT_COMPRESSION_ALGORITHMS),
        }
    }

    /// Host key policy paired with the profile.
    pub fn server_check(self) -> ServerCheckMethod {
        match self {
            SecurityLevel::Secure => ServerCheckMethod::DefaultKnownHostsFile,
            SecurityLevel::LegacyCompatible => ServerCheckMethod::NoCheck,
        }
    }
}

/// SSH client parameters used for every device of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshProfile {
    level: SecurityLevel,
    server_check: ServerCheckMethod,
    inactivity_timeout: Duration,
}

impl SshProfile {
    pub fn new(level: SecurityLevel) -> Self {
        Self {
            level,
            server_check: level.server_check(),
            inactivity_timeout: config::DEFAULT_INACTIVITY_TIMEOUT,
        }
    }

    /// Overrides the host key policy of the level.
    pub fn with_server_check(mut self, server_check: ServerCheckMethod) -> Self {
        self.server_check = server_check;
        self
    }

    pub fn level(&self) -> SecurityLevel {
        self.level
    }

    pub fn server_check(&self) -> ServerCheckMethod {
        self.server_check.clone()
    }

    pub(super) fn client_config(&self) -> Config {
        Config {
            preferred: self.level.preferred(),
            inactivity_timeout: Some(self.inactivity_timeout),
            ..Default::default()
        }
    }
}

impl Default for SshProfile {
    fn default() -> Self {
        Self::new(SecurityLevel::default())
    }
}

impl From<SecurityLevel> for SshProfile {
    fn from(level: SecurityLevel) -> Self {
        Self::new(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use russh::{cipher, kex, mac};

    #[test]
    fn levels_pick_their_host_key_policy() {
        assert!(matches!(
            SshProfile::default().server_check(),
            ServerCheckMethod::DefaultKnownHostsFile
        ));
        let legacy = SshProfile::from(SecurityLevel::LegacyCompatible);
        assert_eq!(legacy.level(), SecurityLevel::LegacyCompatible);
        assert!(matches!(legacy.server_check(), ServerCheckMethod::NoCheck));

        let pinned = legacy.with_server_check(ServerCheckMethod::DefaultKnownHostsFile);
        assert!(matches!(
            pinned.server_check(),
            ServerCheckMethod::DefaultKnownHostsFile
        ));
    }

    #[test]
    fn secure_level_never_offers_sha1_or_cbc() {
        let preferred = SecurityLevel::Secure.preferred();

        for weak in [kex::NONE, kex::DH_G1_SHA1, kex::DH_G14_SHA1, kex::DH_GEX_SHA1] {
            assert!(!preferred.kex.contains(&weak));
        }
        for weak in [cipher::NONE, cipher::AES_128_CBC, cipher::AES_256_CBC] {
            assert!(!preferred.cipher.contains(&weak));
        }
        assert!(!preferred.mac.contains(&mac::HMAC_SHA1));
    }

    #[test]
    fn legacy_level_offers_everything_secure_does() {
        let secure = SecurityLevel::Secure.preferred();
        let legacy = SecurityLevel::LegacyCompatible.preferred();

        assert!(secure.kex.iter().all(|alg| legacy.kex.contains(alg)));
        assert!(secure.cipher.iter().all(|alg| legacy.cipher.contains(alg)));
        assert!(secure.mac.iter().all(|alg| legacy.mac.contains(alg)));
        assert!(legacy.kex.contains(&kex::DH_G1_SHA1));
    }

    #[test]
    fn client_config_carries_profile_and_idle_limit() {
        let config = SshProfile::new(SecurityLevel::LegacyCompatible).client_config();

        assert!(config.preferred.cipher.contains(&cipher::AES_256_CBC));
        assert_eq!(
            config.inactivity_timeout,
            Some(crate::config::DEFAULT_INACTIVITY_TIMEOUT)
        );
    }
}

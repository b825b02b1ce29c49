//! Runtime configuration, loaded from a TOML file.  Every section and field has a default, so an
//! empty file (or no file at all) gives the standard appliance paths.

use crate::{error, Result};
use serde::Deserialize;
use snafu::ResultExt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub descriptors: DescriptorConfig,
    #[serde(default)]
    pub files: FileConfig,
    #[serde(default)]
    pub lock: LockConfig,
}

/// Where the management API lives and how to talk to it.  The session ID is obtained by whoever
/// writes this file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct ApiConfig {
    pub base_url: String,
    pub session_id: Option<String>,
    pub timeout_seconds: u64,
    pub accept_invalid_certs: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: constants::API_BASE_URL.to_string(),
            session_id: None,
            timeout_seconds: constants::API_TIMEOUT_SECONDS,
            accept_invalid_certs: false,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct DescriptorConfig {
    /// Searched recursively for the descriptor files.
    pub directory: PathBuf,
    pub appliance: String,
    pub network: String,
    /// Upper bound on instances enumerated for one repeated group.
    pub max_instances: usize,
}

impl Default for DescriptorConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(constants::DESCRIPTOR_DIR),
            appliance: constants::APPLIANCE_DESCRIPTOR.to_string(),
            network: constants::NETWORK_DESCRIPTOR.to_string(),
            max_instances: constants::MAX_GROUP_INSTANCES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct FileConfig {
    pub shadow: PathBuf,
    pub pam_system_auth: PathBuf,
    pub ntp_conf: PathBuf,
    pub sendmail_cf: PathBuf,
    pub sshd_service: String,
    /// Command line of the log forwarding helper; `export <file>` or `import <file>` is appended.
    pub syslog_helper: String,
    pub syslog_output: PathBuf,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            shadow: PathBuf::from(constants::SHADOW_FILE),
            pam_system_auth: PathBuf::from(constants::PAM_SYSTEM_AUTH_FILE),
            ntp_conf: PathBuf::from(constants::NTP_CONF_FILE),
            sendmail_cf: PathBuf::from(constants::SENDMAIL_CF_FILE),
            sshd_service: constants::SSHD_SERVICE.to_string(),
            syslog_helper: constants::SYSLOG_HELPER.to_string(),
            syslog_output: PathBuf::from(constants::SYSLOG_HELPER_OUTPUT),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct LockConfig {
    pub path: PathBuf,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(constants::LOCK_FILE),
        }
    }
}

impl Config {
    /// Reads and parses the given config file.
    pub fn from_file<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let s = fs::read_to_string(path).context(error::ConfigReadSnafu { path })?;
        let config: Config = toml::from_str(&s).context(error::ConfigParseSnafu { path })?;
        Ok(config)
    }

    /// Like `from_file`, but a missing file means all defaults.
    pub fn from_file_or_default<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::from_file(path)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_is_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.files.shadow, PathBuf::from("/etc/shadow"));
        assert_eq!(config.api.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn partial_sections() {
        let config: Config = toml::from_str(
            r#"
            [api]
            base-url = "https://appliance.example.com/rest"
            session-id = "abc123"

            [files]
            ntp-conf = "/tmp/ntp.conf"
            "#,
        )
        .unwrap();
        assert_eq!(config.api.base_url, "https://appliance.example.com/rest");
        assert_eq!(config.api.session_id.as_deref(), Some("abc123"));
        assert!(!config.api.accept_invalid_certs);
        assert_eq!(config.files.ntp_conf, PathBuf::from("/tmp/ntp.conf"));
        assert_eq!(config.files.shadow, PathBuf::from("/etc/shadow"));
        assert_eq!(config.descriptors, DescriptorConfig::default());
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(toml::from_str::<Config>("[api]\nbase_url = \"x\"").is_err());
        assert!(toml::from_str::<Config>("[metrics]").is_err());
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiledog.toml");
        assert!(Config::from_file(&path).is_err());
        assert_eq!(Config::from_file_or_default(&path).unwrap(), Config::default());

        let mut f = fs::File::create(&path).unwrap();
        writeln!(f, "[lock]\npath = \"/tmp/x.lock\"").unwrap();
        assert_eq!(
            Config::from_file_or_default(&path).unwrap().lock.path,
            PathBuf::from("/tmp/x.lock")
        );
    }
}

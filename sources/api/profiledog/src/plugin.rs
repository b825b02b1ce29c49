//! The three operations offered to an orchestrator: export, validate, and apply.
//!
//! Every call takes the target lock for its whole duration.  Descriptors are loaded fresh on each
//! call, so a changed descriptor takes effect without a restart.

use crate::binder::{self, APPLIANCE_BINDINGS, NETWORK_BINDINGS};
use crate::command::{CommandRunner, SystemCommand};
use crate::config::Config;
use crate::descriptor::Descriptor;
use crate::files::AdapterContext;
use crate::host::Host;
use crate::lock::TargetLock;
use crate::validate::{self, ValidationResult};
use crate::{error, Result};
use apiclient::{ApiClient, HttpClient};
use models::{ApplianceNetwork, ApplianceSettings};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use snafu::ResultExt;

/// Key callers may wrap the settings tree in.
const ENVELOPE: &str = "appliance";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplyStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyResult {
    pub status: ApplyStatus,
    /// Host adapters that failed; REST failures abort the call instead.
    pub failed_adapters: Vec<String>,
}

pub struct Plugin<C, R> {
    config: Config,
    client: C,
    runner: R,
}

impl Plugin<HttpClient, SystemCommand> {
    /// Builds a plugin that talks to the configured API and runs commands on this host.
    pub fn from_config(config: Config) -> Result<Self> {
        let api = &config.api;
        let client = HttpClient::new(
            &api.base_url,
            api.session_id.clone(),
            api.timeout(),
            api.accept_invalid_certs,
        )
        .context(error::ClientSetupSnafu)?;
        Ok(Self::new(config, client, SystemCommand))
    }
}

impl<C, R> Plugin<C, R>
where
    C: ApiClient,
    R: CommandRunner,
{
    pub fn new(config: Config, client: C, runner: R) -> Self {
        Self {
            config,
            client,
            runner,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn lock(&self) -> Result<TargetLock> {
        TargetLock::acquire(&self.config.lock.path)
    }

    fn host(&self) -> Host<'_> {
        Host::new(
            &self.config.files,
            AdapterContext {
                runner: &self.runner,
                syslog_helper: &self.config.files.syslog_helper,
            },
        )
    }

    fn descriptor(&self, name: &str) -> Result<Descriptor> {
        Descriptor::find_and_load(&self.config.descriptors.directory, name)
    }

    /// Reads the appliance's current configuration from the API and the host.
    pub fn get_current_desired_state(&self) -> Result<ApplianceSettings> {
        let _lock = self.lock()?;
        let max_instances = self.config.descriptors.max_instances;

        let appliance = self.descriptor(&self.config.descriptors.appliance)?;
        let tree = binder::export(&self.client, &appliance, APPLIANCE_BINDINGS, max_instances)?;
        let mut settings: ApplianceSettings = binder::into_typed(tree)?;

        self.host().export(&mut settings);

        let network = self.descriptor(&self.config.descriptors.network)?;
        let tree = binder::export(&self.client, &network, NETWORK_BINDINGS, max_instances)?;
        let network: ApplianceNetwork = binder::into_typed(tree)?;
        if network != ApplianceNetwork::default() {
            settings.network = Some(network);
        }

        info!("Exported current state");
        Ok(settings)
    }

    /// Same as `get_current_desired_state`.
    pub fn get_desired_state(&self) -> Result<ApplianceSettings> {
        self.get_current_desired_state()
    }

    /// Checks `desired` against the domain rules.  Only input that isn't a settings tree at all
    /// is an error; `null` gives an INVALID result.
    pub fn validate(&self, desired: &Value) -> Result<ValidationResult> {
        let _lock = self.lock()?;
        match parse_desired_state(desired)? {
            Some(settings) => Ok(validate::validate_settings(&settings)),
            None => {
                warn!("No desired state to validate");
                Ok(ValidationResult::missing_input())
            }
        }
    }

    /// Writes `desired` to the appliance.  REST failures abort the call; host adapter failures
    /// are collected and reported with an ERROR status after the rest has been applied.
    pub fn apply(&self, desired: &Value) -> Result<ApplyResult> {
        let _lock = self.lock()?;
        let settings = match parse_desired_state(desired)? {
            Some(settings) => settings,
            None => {
                warn!("No desired state to apply");
                return Ok(ApplyResult {
                    status: ApplyStatus::Error,
                    failed_adapters: Vec::new(),
                });
            }
        };

        let appliance = self.descriptor(&self.config.descriptors.appliance)?;
        let tree = serde_json::to_value(&settings).context(error::SerializeTreeSnafu)?;
        let sent = binder::apply(&self.client, &appliance, APPLIANCE_BINDINGS, &tree)?;
        debug!("Sent {} appliance request(s)", sent);

        if let Some(network) = &settings.network {
            let descriptor = self.descriptor(&self.config.descriptors.network)?;
            let tree = serde_json::to_value(network).context(error::SerializeTreeSnafu)?;
            let sent = binder::apply(&self.client, &descriptor, NETWORK_BINDINGS, &tree)?;
            debug!("Sent {} network request(s)", sent);
        }

        let failed: Vec<String> = self
            .host()
            .apply(&settings)
            .into_iter()
            .map(String::from)
            .collect();
        let status = if failed.is_empty() {
            ApplyStatus::Success
        } else {
            error!("Failed to apply: {}", failed.join(", "));
            ApplyStatus::Error
        };
        info!("Apply finished with {:?}", status);
        Ok(ApplyResult {
            status,
            failed_adapters: failed,
        })
    }
}

/// Reads a desired-state document, bare or wrapped as `{"appliance": {...}}`.  `null` means no
/// desired state was given.
pub fn parse_desired_state(input: &Value) -> Result<Option<ApplianceSettings>> {
    let tree = match input {
        Value::Object(map) if map.len() == 1 && map.contains_key(ENVELOPE) => &map[ENVELOPE],
        other => other,
    };
    if tree.is_null() {
        return Ok(None);
    }
    let settings = ApplianceSettings::deserialize(tree).context(error::InvalidInputSnafu)?;
    Ok(Some(settings))
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_and_wrapped_input() {
        let bare = json!({"smtp": {"mail_server": "relay.example.com"}});
        let wrapped = json!({ "appliance": bare.clone() });
        let expected = parse_desired_state(&bare).unwrap().unwrap();
        assert_eq!(parse_desired_state(&wrapped).unwrap().unwrap(), expected);
        assert_eq!(
            expected.smtp.unwrap().mail_server.as_deref(),
            Some("relay.example.com")
        );
    }

    #[test]
    fn null_input() {
        assert!(parse_desired_state(&Value::Null).unwrap().is_none());
        assert!(parse_desired_state(&json!({"appliance": null}))
            .unwrap()
            .is_none());
    }

    #[test]
    fn not_a_tree() {
        for bad in &[json!([1, 2]), json!("tree"), json!({"appliance": 5}), json!({"x": 1})] {
            assert!(
                matches!(parse_desired_state(bad), Err(crate::Error::InvalidInput { .. })),
                "{}",
                bad
            );
        }
    }

    #[test]
    fn apply_result_json() {
        let result = ApplyResult {
            status: ApplyStatus::Error,
            failed_adapters: vec!["mail-relay".to_string()],
        };
        assert_eq!(
            serde_json::to_value(result).unwrap(),
            json!({"status": "ERROR", "failed_adapters": ["mail-relay"]})
        );
    }
}

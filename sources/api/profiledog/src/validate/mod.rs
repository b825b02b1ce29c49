//! Checks a candidate settings tree against domain rules and works out which services would have
//! to restart if it were applied.
//!
//! Rule failures never make `validate` fail; they come back as error notifications with an
//! INVALID status.  A domain whose rules pass contributes its services to the restart impact.

mod network;
mod rules;

use models::ApplianceSettings;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub use network::{validate_dns, validate_firewall, validate_proxy};
pub use rules::{
    validate_account_aging, validate_backup_schedules, validate_forwarding, validate_local_account,
    validate_password_policy, validate_smtp, validate_time_sync,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub code: String,
    pub severity: Severity,
    pub message: String,
    pub resolution: String,
}

impl Notification {
    pub fn error<S1, S2, S3>(code: S1, message: S2, resolution: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self {
            code: code.into(),
            severity: Severity::Error,
            message: message.into(),
            resolution: resolution.into(),
        }
    }

    pub fn info<S1, S2>(code: S1, message: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self {
            code: code.into(),
            severity: Severity::Info,
            message: message.into(),
            resolution: String::new(),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notifications {
    pub info: Vec<Notification>,
    pub errors: Vec<Notification>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    Valid,
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplyImpact {
    NoImpact,
    RestartService,
}

/// How the services in an impact assessment are managed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Systemd,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Impact {
    pub apply_impact: ApplyImpact,
    pub services: BTreeMap<ServiceType, BTreeSet<String>>,
}

impl Default for Impact {
    fn default() -> Self {
        Self {
            apply_impact: ApplyImpact::NoImpact,
            services: BTreeMap::new(),
        }
    }
}

impl Impact {
    fn restart(&mut self, service: &str) {
        self.services
            .entry(ServiceType::Systemd)
            .or_default()
            .insert(service.to_string());
        self.apply_impact = ApplyImpact::RestartService;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub status: ValidationStatus,
    pub notifications: Notifications,
    pub impact: Impact,
}

impl ValidationResult {
    /// The result for a call that had no tree to check.
    pub fn missing_input() -> Self {
        Self {
            status: ValidationStatus::Invalid,
            notifications: Notifications {
                info: Vec::new(),
                errors: vec![Notification::error(
                    "input.missing",
                    "No desired state was given",
                    "Provide a settings tree to validate",
                )],
            },
            impact: Impact::default(),
        }
    }
}

/// Runs every domain's rules against `settings`.
pub fn validate_settings(settings: &ApplianceSettings) -> ValidationResult {
    let mut errors = Vec::new();
    let mut impact = Impact::default();

    if let Some(account) = &settings.root_local_account {
        let found = validate_local_account(account);
        if found.is_empty() {
            impact.restart(constants::SENDMAIL_SERVICE);
        }
        errors.extend(found);
    }

    if let Some(schedules) = &settings.backup_schedules {
        errors.extend(validate_backup_schedules(schedules));
    }

    // Host-backed settings have no restart of their own; their rules keep values from spilling
    // into neighbouring fields or lines.
    if let Some(aging) = &settings.account_aging {
        errors.extend(validate_account_aging(aging));
    }
    if let Some(policy) = &settings.password_policy {
        errors.extend(validate_password_policy(policy));
    }
    if let Some(time_sync) = &settings.time_sync {
        errors.extend(validate_time_sync(time_sync));
    }
    if let Some(smtp) = &settings.smtp {
        errors.extend(validate_smtp(smtp));
    }

    if let Some(targets) = &settings.syslog {
        let found = validate_forwarding(targets);
        if found.is_empty() {
            impact.restart(constants::RSYSLOG_SERVICE);
        }
        errors.extend(found);
    }

    if let Some(network) = &settings.network {
        if let Some(rules) = &network.firewall_rule_policies {
            errors.extend(validate_firewall(rules));
        }
        if let Some(proxies) = &network.proxy_configuration {
            errors.extend(validate_proxy(proxies));
        }
        if let Some(dns) = &network.dns_server_configuration {
            let found = validate_dns(dns);
            if found.is_empty() {
                impact.restart(constants::NETWORKD_SERVICE);
                impact.restart(constants::RESOLVED_SERVICE);
            }
            errors.extend(found);
        }
    }

    for notification in &errors {
        debug!("{}: {}", notification.code, notification.message);
    }

    let (status, info_notes) = if errors.is_empty() {
        (
            ValidationStatus::Valid,
            vec![Notification::info(
                "configuration.valid",
                "Configuration is valid",
            )],
        )
    } else {
        (ValidationStatus::Invalid, Vec::new())
    };
    info!(
        "Validation {:?} with {} error(s), impact {:?}",
        status,
        errors.len(),
        impact.apply_impact
    );

    ValidationResult {
        status,
        notifications: Notifications {
            info: info_notes,
            errors,
        },
        impact,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use maplit::{btreemap, btreeset};
    use models::{DnsServerConfiguration, LocalAccount, LogForwarding};
    use serde_json::json;

    fn account(email: &str) -> LocalAccount {
        LocalAccount {
            email: Some(email.to_string()),
            ..Default::default()
        }
    }

    fn forwarding(port: i64) -> LogForwarding {
        LogForwarding {
            hostname: Some("log.example.com".to_string()),
            port: Some(port),
            protocol: Some("UDP".to_string()),
        }
    }

    #[test]
    fn empty_tree_is_valid_without_impact() {
        let result = validate_settings(&ApplianceSettings::default());
        assert_eq!(result.status, ValidationStatus::Valid);
        assert_eq!(result.notifications.info.len(), 1);
        assert!(result.notifications.errors.is_empty());
        assert_eq!(result.impact, Impact::default());
    }

    #[test]
    fn failed_domain_adds_no_restart() {
        let settings = ApplianceSettings {
            root_local_account: Some(account("ops@example.com")),
            syslog: Some(vec![forwarding(0)]),
            ..Default::default()
        };
        let result = validate_settings(&settings);
        assert_eq!(result.status, ValidationStatus::Invalid);
        assert!(result.notifications.info.is_empty());
        assert_eq!(result.notifications.errors.len(), 1);
        assert_eq!(result.impact.apply_impact, ApplyImpact::RestartService);
        assert_eq!(
            result.impact.services,
            btreemap! { ServiceType::Systemd => btreeset! { "sendmail".to_string() } }
        );
    }

    #[test]
    fn passing_domains_add_restarts() {
        let settings = ApplianceSettings {
            root_local_account: Some(account("ops@example.com")),
            syslog: Some(vec![forwarding(514)]),
            network: Some(models::ApplianceNetwork {
                dns_server_configuration: Some(DnsServerConfiguration {
                    mode: Some("is_static".to_string()),
                    servers: Some(vec!["[10.0.0.53]".to_string()]),
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let result = validate_settings(&settings);
        assert_eq!(result.status, ValidationStatus::Valid);
        assert_eq!(
            result.impact.services[&ServiceType::Systemd],
            btreeset! {
                "rsyslog".to_string(),
                "sendmail".to_string(),
                "systemd-networkd".to_string(),
                "systemd-resolved".to_string(),
            }
        );
    }

    #[test]
    fn host_values_checked() {
        let settings = ApplianceSettings {
            account_aging: Some(vec![models::AccountAging {
                username: "alice".to_string(),
                maximum_days: Some("90\nevil::0:0:99999:7:::".to_string()),
                warning_days: None,
            }]),
            time_sync: Some(models::TimeSync {
                servers: Some(vec!["time.example.com".to_string()]),
            }),
            ..Default::default()
        };
        let result = validate_settings(&settings);
        assert_eq!(result.status, ValidationStatus::Invalid);
        assert_eq!(result.notifications.errors.len(), 1);
        assert_eq!(result.notifications.errors[0].code, "accounts.aging.invalid");
        assert_eq!(result.impact, Impact::default());
    }

    #[test]
    fn result_json() {
        let settings = ApplianceSettings {
            root_local_account: Some(account("not-an-email")),
            ..Default::default()
        };
        let value = serde_json::to_value(validate_settings(&settings)).unwrap();
        assert_eq!(value["status"], json!("INVALID"));
        assert_eq!(value["impact"], json!({"apply_impact": "NO_IMPACT", "services": {}}));
        assert_eq!(value["notifications"]["errors"][0]["severity"], json!("error"));

        let value = serde_json::to_value(validate_settings(&ApplianceSettings {
            syslog: Some(vec![]),
            ..Default::default()
        }))
        .unwrap();
        assert_eq!(
            value["impact"],
            json!({"apply_impact": "RESTART_SERVICE", "services": {"systemd": ["rsyslog"]}})
        );
    }

    #[test]
    fn missing_input() {
        let result = ValidationResult::missing_input();
        assert_eq!(result.status, ValidationStatus::Invalid);
        assert_eq!(result.notifications.errors[0].code, "input.missing");
    }
}

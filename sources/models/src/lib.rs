/*!
# Appliance settings models

The settings tree exchanged by export, validate, and apply.

Every field is optional: a field that's absent was either not found on export or is something the
caller doesn't want to change on apply.  Repeated structures (backup schedules, forwarding
targets, firewall rules, and so on) are ordered lists.

The JSON form uses snake_case names; unknown fields are rejected, so a document that isn't shaped
like a settings tree fails to deserialize rather than silently dropping data.

The tree has one branch per configuration source:

* REST-backed: `backup_schedules`, `root_local_account`, and everything under `network`.
* File-backed: `account_aging` (shadow file), `password_policy` (PAM), `time_sync` (NTP),
  `smtp` (sendmail), `syslog` (log forwarding helper).
* Service-backed: `access_settings.ssh`.
*/

mod de;

use crate::de::deserialize_lenient_int;
use serde::{Deserialize, Serialize};

/// Top-level settings for the appliance management component.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplianceSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_schedules: Option<Vec<BackupSchedule>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_local_account: Option<LocalAccount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_aging: Option<Vec<AccountAging>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_policy: Option<PasswordPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_sync: Option<TimeSync>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_settings: Option<AccessSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smtp: Option<Smtp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syslog: Option<Vec<LogForwarding>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<ApplianceNetwork>,
}

///// Backup

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackupSchedule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parts: Option<Vec<String>>,
    #[serde(
        default,
        deserialize_with = "deserialize_lenient_int",
        skip_serializing_if = "Option::is_none"
    )]
    pub retention_max_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence_info: Option<RecurrenceInfo>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecurrenceInfo {
    #[serde(
        default,
        deserialize_with = "deserialize_lenient_int",
        skip_serializing_if = "Option::is_none"
    )]
    pub hour: Option<i64>,
    #[serde(
        default,
        deserialize_with = "deserialize_lenient_int",
        skip_serializing_if = "Option::is_none"
    )]
    pub minute: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days: Option<Vec<String>>,
}

///// Accounts

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalAccount {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fullname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_expires: Option<bool>,
    #[serde(
        default,
        deserialize_with = "deserialize_lenient_int",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_days_between_password_change: Option<i64>,
    #[serde(
        default,
        deserialize_with = "deserialize_lenient_int",
        skip_serializing_if = "Option::is_none"
    )]
    pub warn_days_before_password_expiration: Option<i64>,
}

/// Password aging for one account, as kept in the shadow file.  The day counts are kept as the
/// raw field text, since an empty field is meaningful there.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountAging {
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum_days: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning_days: Option<String>,
}

/// Lockout policy from the PAM authentication stack.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PasswordPolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deny: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlock_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_unlock_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub even_deny_root: Option<bool>,
}

///// Services

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeSync {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servers: Option<Vec<String>>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh: Option<bool>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Smtp {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mail_server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay_port: Option<String>,
}

/// One remote log forwarding target.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogForwarding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_lenient_int",
        skip_serializing_if = "Option::is_none"
    )]
    pub port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

///// Network

/// Settings for the appliance network component.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplianceNetwork {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firewall_rule_policies: Option<Vec<FirewallRule>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_configuration: Option<Vec<ProxyConfiguration>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_server_configuration: Option<DnsServerConfiguration>,
}

/// A firewall rule; `address` may hold several whitespace-separated addresses.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FirewallRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_lenient_int",
        skip_serializing_if = "Option::is_none"
    )]
    pub prefix: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface_name: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_lenient_int",
        skip_serializing_if = "Option::is_none"
    )]
    pub port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DnsServerConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servers: Option<Vec<String>>,
}

#[cfg(test)]
mod test {
    use super::*;

    static FULL_TREE: &str = include_str!("../tests/data/appliance-settings.json");

    #[test]
    fn full_tree() {
        let settings: ApplianceSettings = serde_json::from_str(FULL_TREE).unwrap();
        let schedules = settings.backup_schedules.as_ref().unwrap();
        assert_eq!(schedules.len(), 2);
        assert_eq!(
            schedules[0].recurrence_info.as_ref().unwrap().hour,
            Some(23)
        );
        assert_eq!(settings.syslog.as_ref().unwrap()[0].port, Some(514));
        assert_eq!(
            settings
                .network
                .as_ref()
                .unwrap()
                .proxy_configuration
                .as_ref()
                .unwrap()[0]
                .port,
            None
        );
    }

    #[test]
    fn absent_fields_not_serialized() {
        let settings = ApplianceSettings {
            smtp: Some(Smtp {
                mail_server: Some("relay.example.com".to_string()),
                relay_port: None,
            }),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_string(&settings).unwrap(),
            r#"{"smtp":{"mail_server":"relay.example.com"}}"#
        );
    }

    #[test]
    fn unknown_fields_rejected() {
        assert!(serde_json::from_str::<ApplianceSettings>(r#"{"kubernetes": {}}"#).is_err());
        assert!(
            serde_json::from_str::<ApplianceSettings>(r#"{"smtp": {"server": "x"}}"#).is_err()
        );
    }

    #[test]
    fn empty_tree() {
        assert_eq!(
            serde_json::from_str::<ApplianceSettings>("{}").unwrap(),
            ApplianceSettings::default()
        );
    }
}

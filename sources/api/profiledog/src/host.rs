//! Moves host-backed settings between the settings tree and the file adapters.
//!
//! A failing adapter never stops the others.  On export its branch is left out of the tree; on
//! apply its name is reported back so the caller can mark the result as failed.

use crate::config::FileConfig;
use crate::files::{ntp, sendmail, service, shadow, syslog, AdapterContext, FileFormat};
use crate::ConfigMap;
use models::{
    AccessSettings, AccountAging, ApplianceSettings, LogForwarding, PasswordPolicy, Smtp, TimeSync,
};
use serde_json::{Map, Value};
use std::path::Path;

const PAM_KEYS: &[&str] = &["deny", "unlock_time", "root_unlock_time", "even_deny_root"];

pub(crate) struct Host<'a> {
    files: &'a FileConfig,
    adapters: AdapterContext<'a>,
}

impl<'a> Host<'a> {
    pub(crate) fn new(files: &'a FileConfig, adapters: AdapterContext<'a>) -> Self {
        Self { files, adapters }
    }

    fn read(&self, format: FileFormat, target: &str, keys: &[&str]) -> Option<ConfigMap> {
        match self.adapters.adapter(format).read(target, keys) {
            Ok(found) => {
                trace!("{} read {} key(s) from {}", format.name(), found.len(), target);
                Some(found)
            }
            Err(e) => {
                warn!("Unable to read {} from {}: {}", format.name(), target, e);
                None
            }
        }
    }

    /// Writes `updates`, returning whether the adapter succeeded.
    fn write(&self, format: FileFormat, target: &str, updates: &ConfigMap) -> bool {
        match self.adapters.adapter(format).write(target, updates) {
            Ok(true) => {
                info!("Applied {} to {}", format.name(), target);
                true
            }
            Ok(false) => {
                warn!("{} found nothing to apply for {}", format.name(), target);
                false
            }
            Err(e) => {
                error!("Failed to apply {} to {}: {}", format.name(), target, e);
                false
            }
        }
    }

    /// Fills the host-backed branches of `settings`.
    pub(crate) fn export(&self, settings: &mut ApplianceSettings) {
        let files = self.files;

        settings.account_aging = self
            .read(FileFormat::AccountAging, path_str(&files.shadow), &[])
            .map(aging_from_map);

        settings.password_policy = self
            .read(FileFormat::PamPolicy, path_str(&files.pam_system_auth), PAM_KEYS)
            .map(|found| PasswordPolicy {
                deny: text(&found, "deny"),
                unlock_time: text(&found, "unlock_time"),
                root_unlock_time: text(&found, "root_unlock_time"),
                even_deny_root: Some(found.contains_key("even_deny_root")),
            });

        settings.time_sync = self
            .read(FileFormat::NtpConfig, path_str(&files.ntp_conf), &[ntp::SERVER])
            .map(|found| TimeSync {
                servers: found.get(ntp::SERVER).map(text_list),
            });

        settings.access_settings = self
            .read(
                FileFormat::ServiceEnablement,
                &files.sshd_service,
                &[service::ENABLED],
            )
            .map(|found| AccessSettings {
                ssh: found.get(service::ENABLED).and_then(Value::as_bool),
            });

        settings.smtp = self
            .read(FileFormat::MailRelay, path_str(&files.sendmail_cf), &[])
            .map(|found| Smtp {
                mail_server: text(&found, sendmail::MAIL_SERVER),
                relay_port: text(&found, sendmail::RELAY_PORT),
            });

        settings.syslog = self
            .read(FileFormat::LogForwarding, path_str(&files.syslog_output), &[])
            .map(forwarding_from_map);
    }

    /// Writes every host-backed branch present in `settings`.  Returns the names of the adapters
    /// that failed.
    pub(crate) fn apply(&self, settings: &ApplianceSettings) -> Vec<&'static str> {
        let files = self.files;
        let mut jobs: Vec<(FileFormat, &str, ConfigMap)> = Vec::new();

        if let Some(aging) = &settings.account_aging {
            jobs.push((
                FileFormat::AccountAging,
                path_str(&files.shadow),
                aging_to_map(aging),
            ));
        }
        if let Some(policy) = &settings.password_policy {
            let mut updates = ConfigMap::new();
            insert_text(&mut updates, "deny", &policy.deny);
            insert_text(&mut updates, "unlock_time", &policy.unlock_time);
            insert_text(&mut updates, "root_unlock_time", &policy.root_unlock_time);
            if let Some(flag) = policy.even_deny_root {
                updates.insert("even_deny_root".to_string(), Value::Bool(flag));
            }
            jobs.push((
                FileFormat::PamPolicy,
                path_str(&files.pam_system_auth),
                updates,
            ));
        }
        if let Some(servers) = settings.time_sync.as_ref().and_then(|t| t.servers.as_ref()) {
            let mut updates = ConfigMap::new();
            updates.insert(
                ntp::SERVER.to_string(),
                Value::Array(servers.iter().cloned().map(Value::String).collect()),
            );
            jobs.push((FileFormat::NtpConfig, path_str(&files.ntp_conf), updates));
        }
        if let Some(ssh) = settings.access_settings.as_ref().and_then(|a| a.ssh) {
            let mut updates = ConfigMap::new();
            updates.insert(service::ENABLED.to_string(), Value::Bool(ssh));
            jobs.push((
                FileFormat::ServiceEnablement,
                files.sshd_service.as_str(),
                updates,
            ));
        }
        if let Some(smtp) = &settings.smtp {
            let mut updates = ConfigMap::new();
            insert_text(&mut updates, sendmail::MAIL_SERVER, &smtp.mail_server);
            insert_text(&mut updates, sendmail::RELAY_PORT, &smtp.relay_port);
            jobs.push((FileFormat::MailRelay, path_str(&files.sendmail_cf), updates));
        }
        if let Some(targets) = &settings.syslog {
            jobs.push((
                FileFormat::LogForwarding,
                path_str(&files.syslog_output),
                forwarding_to_map(targets),
            ));
        }

        let mut failed = Vec::new();
        for (format, target, updates) in &jobs {
            if updates.is_empty() && *format == FileFormat::PamPolicy {
                debug!("No password policy values given, skipping");
                continue;
            }
            if !self.write(*format, target, updates) {
                failed.push(format.name());
            }
        }
        failed
    }
}

fn path_str(path: &Path) -> &str {
    // Configured paths come from TOML strings and are always UTF-8.
    path.to_str().unwrap_or_default()
}

fn text(found: &ConfigMap, key: &str) -> Option<String> {
    match found.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn text_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}

fn insert_text(updates: &mut ConfigMap, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        updates.insert(key.to_string(), Value::String(value.clone()));
    }
}

fn aging_from_map(found: ConfigMap) -> Vec<AccountAging> {
    found
        .into_iter()
        .map(|(username, aging)| AccountAging {
            username,
            maximum_days: aging
                .get(shadow::MAXIMUM_DAYS)
                .and_then(Value::as_str)
                .map(String::from),
            warning_days: aging
                .get(shadow::WARNING_DAYS)
                .and_then(Value::as_str)
                .map(String::from),
        })
        .collect()
}

fn aging_to_map(aging: &[AccountAging]) -> ConfigMap {
    let mut updates = ConfigMap::new();
    for entry in aging {
        let mut days = Map::new();
        if let Some(max) = &entry.maximum_days {
            days.insert(shadow::MAXIMUM_DAYS.to_string(), Value::String(max.clone()));
        }
        if let Some(warn) = &entry.warning_days {
            days.insert(shadow::WARNING_DAYS.to_string(), Value::String(warn.clone()));
        }
        updates.insert(entry.username.clone(), Value::Object(days));
    }
    updates
}

fn forwarding_from_map(found: ConfigMap) -> Vec<LogForwarding> {
    let mut targets = Vec::new();
    for index in 0.. {
        let server = found.get(&syslog::server_key(index));
        let port = found.get(&syslog::port_key(index));
        let protocol = found.get(&syslog::protocol_key(index));
        if server.is_none() && port.is_none() && protocol.is_none() {
            break;
        }
        targets.push(LogForwarding {
            hostname: server.and_then(Value::as_str).map(String::from),
            port: port.and_then(|p| match p {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            }),
            protocol: protocol.and_then(Value::as_str).map(String::from),
        });
    }
    targets
}

fn forwarding_to_map(targets: &[LogForwarding]) -> ConfigMap {
    if targets.len() > syslog::MAX_TARGETS {
        warn!(
            "Only {} log forwarding targets are supported, ignoring {} more",
            syslog::MAX_TARGETS,
            targets.len() - syslog::MAX_TARGETS
        );
    }
    let mut updates = ConfigMap::new();
    for (index, target) in targets.iter().take(syslog::MAX_TARGETS).enumerate() {
        if let Some(hostname) = &target.hostname {
            updates.insert(syslog::server_key(index), Value::String(hostname.clone()));
        }
        if let Some(port) = target.port {
            updates.insert(syslog::port_key(index), Value::from(port));
        }
        if let Some(protocol) = &target.protocol {
            updates.insert(syslog::protocol_key(index), Value::String(protocol.clone()));
        }
    }
    updates
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::command::{self, CommandOutput, CommandRunner};
    use std::cell::RefCell;
    use std::fs;

    static SHADOW: &str = "root:x:18000:0:99999:7:::\nalice:x:18000:5:90:7:::\n";
    static PAM: &str = "auth required pam_tally2.so deny=3 unlock_time=900\n";
    static NTP: &str = "server 0.pool.ntp.org\n";
    static SENDMAIL: &str = "DS[smtp.example.com]\nMrelay, P=[IPC]\n\t\tT=DNS\n\t\tA=TCP $h 25\n";

    /// systemctl reports sshd enabled and running; the log forwarding helper is missing.
    struct FakeHost {
        calls: RefCell<Vec<String>>,
    }

    impl CommandRunner for FakeHost {
        fn run(&self, program: &str, args: &[&str]) -> command::Result<CommandOutput> {
            self.calls
                .borrow_mut()
                .push(format!("{} {}", program, args.join(" ")));
            if program != constants::SYSTEMCTL_BIN {
                return command::SystemCommand.run("/nonexistent/helper", &[]);
            }
            let stdout = match args[0] {
                "is-enabled" => "enabled\n",
                "is-active" => "active\n",
                _ => "",
            };
            Ok(CommandOutput {
                success: true,
                stdout: stdout.to_string(),
                stderr: String::new(),
            })
        }
    }

    fn host_files(dir: &Path) -> FileConfig {
        let files = FileConfig {
            shadow: dir.join("shadow"),
            pam_system_auth: dir.join("system-auth"),
            ntp_conf: dir.join("ntp.conf"),
            sendmail_cf: dir.join("sendmail.cf"),
            syslog_output: dir.join("syslog_output.json"),
            ..Default::default()
        };
        fs::write(&files.shadow, SHADOW).unwrap();
        fs::write(&files.pam_system_auth, PAM).unwrap();
        fs::write(&files.ntp_conf, NTP).unwrap();
        fs::write(&files.sendmail_cf, SENDMAIL).unwrap();
        files
    }

    #[test]
    fn export_skips_failed_adapter() {
        let dir = tempfile::tempdir().unwrap();
        let files = host_files(dir.path());
        let runner = FakeHost {
            calls: RefCell::new(Vec::new()),
        };
        let host = Host::new(
            &files,
            AdapterContext {
                runner: &runner,
                syslog_helper: &files.syslog_helper,
            },
        );

        let mut settings = ApplianceSettings::default();
        host.export(&mut settings);

        let aging = settings.account_aging.unwrap();
        assert_eq!(aging.len(), 2);
        assert_eq!(aging[1].username, "alice");
        assert_eq!(aging[1].maximum_days.as_deref(), Some("90"));
        let policy = settings.password_policy.unwrap();
        assert_eq!(policy.deny.as_deref(), Some("3"));
        assert_eq!(policy.root_unlock_time, None);
        assert_eq!(policy.even_deny_root, Some(false));
        assert_eq!(
            settings.time_sync.unwrap().servers.unwrap(),
            vec!["0.pool.ntp.org"]
        );
        assert_eq!(settings.access_settings.unwrap().ssh, Some(true));
        assert_eq!(settings.smtp.unwrap().relay_port.as_deref(), Some("25"));
        assert!(settings.syslog.is_none());
    }

    #[test]
    fn apply_reports_failed_adapters() {
        let dir = tempfile::tempdir().unwrap();
        let files = host_files(dir.path());
        let runner = FakeHost {
            calls: RefCell::new(Vec::new()),
        };
        let host = Host::new(
            &files,
            AdapterContext {
                runner: &runner,
                syslog_helper: &files.syslog_helper,
            },
        );

        let settings = ApplianceSettings {
            account_aging: Some(vec![AccountAging {
                username: "alice".to_string(),
                maximum_days: Some("100".to_string()),
                warning_days: Some("10".to_string()),
            }]),
            access_settings: Some(AccessSettings { ssh: Some(false) }),
            syslog: Some(vec![LogForwarding {
                hostname: Some("log.example.com".to_string()),
                port: Some(514),
                protocol: Some("UDP".to_string()),
            }]),
            ..Default::default()
        };
        let failed = host.apply(&settings);
        assert_eq!(failed, vec!["log-forwarding"]);

        assert_eq!(
            fs::read_to_string(&files.shadow).unwrap(),
            "root:x:18000:0:99999:7:::\nalice:x:18000:5:100:10:::\n"
        );
        assert_eq!(fs::read_to_string(&files.ntp_conf).unwrap(), NTP);
        let calls = runner.calls.borrow();
        assert!(calls.contains(&"/bin/systemctl mask sshd.service".to_string()));
        assert!(calls.contains(&"/bin/systemctl stop sshd.service".to_string()));
    }

    #[test]
    fn forwarding_keys() {
        let targets = vec![
            LogForwarding {
                hostname: Some("a".to_string()),
                port: Some(514),
                protocol: Some("UDP".to_string()),
            };
            4
        ];
        let updates = forwarding_to_map(&targets);
        assert_eq!(updates.len(), 9);
        assert_eq!(forwarding_from_map(updates), targets[..3].to_vec());
    }
}

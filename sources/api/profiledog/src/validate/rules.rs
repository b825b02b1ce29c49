//! Rules for the appliance management settings.

use super::Notification;
use lazy_static::lazy_static;
use models::{
    AccountAging, BackupSchedule, LocalAccount, LogForwarding, PasswordPolicy, Smtp, TimeSync,
};
use regex::Regex;
use url::{ParseError, Url};

lazy_static! {
    static ref EMAIL: Regex =
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$").unwrap();
}

/// Schemes a backup location may use.
const BACKUP_SCHEMES: &[&str] = &[
    "ftp", "ftps", "http", "https", "scp", "sftp", "nfs", "nfs4", "smb",
];

pub(super) const PORT_RANGE_RESOLUTION: &str = "Provide a port between 1 and 65535";

pub(super) fn port_in_range(port: i64) -> bool {
    (1..=65535).contains(&port)
}

pub fn validate_local_account(account: &LocalAccount) -> Vec<Notification> {
    let mut notifications = Vec::new();
    if let Some(email) = &account.email {
        if !EMAIL.is_match(email) {
            notifications.push(Notification::error(
                "accounts.email.invalid",
                format!("Invalid email address '{}'", email),
                "Provide an email address of the form user@example.com",
            ));
        }
    }
    notifications
}

/// How a backup location failed to qualify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LocationProblem {
    /// Missing, or not a URL at all.
    Malformed,
    /// A URL, but not one that names a reachable location.
    Unresolvable,
    /// A usable URL with a scheme backups can't use.
    Invalid,
}

// Characters allowed in an RFC 3986 URI reference, apart from '%', which must start an escape.
const URI_SYMBOLS: &str = "-._~:/?#[]@!$&'()*+,;=";

/// Whether a scheme-less string is a well-formed relative reference, as opposed to text that
/// isn't a URI at all.
fn is_relative_reference(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'%' {
            let escaped = bytes
                .get(i + 1..i + 3)
                .map(|hex| hex.iter().all(u8::is_ascii_hexdigit))
                .unwrap_or(false);
            if !escaped {
                return false;
            }
            i += 3;
            continue;
        }
        if !(b.is_ascii_alphanumeric() || URI_SYMBOLS.as_bytes().contains(&b)) {
            return false;
        }
        i += 1;
    }
    true
}

fn check_location(location: Option<&str>) -> Option<LocationProblem> {
    let location = match location.map(str::trim) {
        Some(location) if !location.is_empty() => location,
        _ => return Some(LocationProblem::Malformed),
    };
    let url = match Url::parse(location) {
        Ok(url) => url,
        Err(ParseError::RelativeUrlWithoutBase) if is_relative_reference(location) => {
            return Some(LocationProblem::Unresolvable)
        }
        Err(_) => return Some(LocationProblem::Malformed),
    };
    if url.cannot_be_a_base() || url.host().is_none() {
        return Some(LocationProblem::Unresolvable);
    }
    if !BACKUP_SCHEMES.contains(&url.scheme()) {
        return Some(LocationProblem::Invalid);
    }
    None
}

pub fn validate_backup_schedules(schedules: &[BackupSchedule]) -> Vec<Notification> {
    let mut notifications = Vec::new();
    for schedule in schedules {
        let location = schedule.location.as_deref();
        let shown = location.unwrap_or_default();
        let notification = match check_location(location) {
            None => continue,
            Some(LocationProblem::Malformed) => Notification::error(
                "backup.url.malformed",
                format!("Backup location '{}' is not a well-formed URL", shown),
                "Provide the location as a URL such as sftp://host/path",
            ),
            Some(LocationProblem::Unresolvable) => Notification::error(
                "backup.url.unresolvable",
                format!("Backup location '{}' does not name a host", shown),
                "Provide an absolute URL including the host",
            ),
            Some(LocationProblem::Invalid) => Notification::error(
                "backup.url.invalid",
                format!("Backup location '{}' uses an unsupported protocol", shown),
                format!("Use one of: {}", BACKUP_SCHEMES.join(", ")),
            ),
        };
        notifications.push(notification);
    }
    notifications
}

pub fn validate_forwarding(targets: &[LogForwarding]) -> Vec<Notification> {
    targets
        .iter()
        .filter_map(|target| target.port)
        .filter(|port| !port_in_range(*port))
        .map(|port| {
            Notification::error(
                "syslog.port.invalid",
                format!("Log forwarding port {} is out of range", port),
                PORT_RANGE_RESOLUTION,
            )
        })
        .collect()
}

// Day counts and lockout times are whole numbers; an empty shadow field means "no limit".
fn is_count(s: &str, empty_ok: bool) -> bool {
    (empty_ok && s.is_empty()) || (!s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
}

// A single token that can't spill into neighbouring fields or lines of a config file.
fn is_token(s: &str) -> bool {
    !s.is_empty() && !s.contains(|c: char| c.is_whitespace() || c.is_control())
}

pub fn validate_account_aging(aging: &[AccountAging]) -> Vec<Notification> {
    let mut notifications = Vec::new();
    for entry in aging {
        if !is_token(&entry.username) || entry.username.contains(':') {
            notifications.push(Notification::error(
                "accounts.aging.invalid",
                format!("Invalid user name '{}'", entry.username),
                "Provide the name of an existing local account",
            ));
        }
        for days in [&entry.maximum_days, &entry.warning_days].into_iter().flatten() {
            if !is_count(days, true) {
                notifications.push(Notification::error(
                    "accounts.aging.invalid",
                    format!(
                        "Password aging for '{}' has invalid days '{}'",
                        entry.username, days
                    ),
                    "Provide a number of days, or leave it empty for no limit",
                ));
            }
        }
    }
    notifications
}

pub fn validate_password_policy(policy: &PasswordPolicy) -> Vec<Notification> {
    [
        ("deny", &policy.deny),
        ("unlock_time", &policy.unlock_time),
        ("root_unlock_time", &policy.root_unlock_time),
    ]
    .into_iter()
    .filter_map(|(name, value)| value.as_deref().map(|v| (name, v)))
    .filter(|(_, value)| !is_count(value, false))
    .map(|(name, value)| {
        Notification::error(
            "password_policy.value.invalid",
            format!("Password policy {} '{}' is not a number", name, value),
            "Provide a whole number",
        )
    })
    .collect()
}

pub fn validate_time_sync(time_sync: &TimeSync) -> Vec<Notification> {
    time_sync
        .servers
        .iter()
        .flatten()
        .filter(|server| !is_token(server))
        .map(|server| {
            Notification::error(
                "ntp.server.invalid",
                format!("Invalid time server '{}'", server),
                "Provide a host name or IP address",
            )
        })
        .collect()
}

pub fn validate_smtp(smtp: &Smtp) -> Vec<Notification> {
    let mut notifications = Vec::new();
    if let Some(server) = &smtp.mail_server {
        let bracketed = server.contains(|c: char| c == '[' || c == ']');
        if !server.is_empty() && (!is_token(server) || bracketed) {
            notifications.push(Notification::error(
                "smtp.server.invalid",
                format!("Invalid mail relay '{}'", server),
                "Provide a host name or IP address",
            ));
        }
    }
    if let Some(port) = &smtp.relay_port {
        let in_range = is_count(port, false) && port.parse().map(port_in_range).unwrap_or(false);
        if !in_range {
            notifications.push(Notification::error(
                "smtp.port.invalid",
                format!("Mail relay port '{}' is invalid", port),
                PORT_RANGE_RESOLUTION,
            ));
        }
    }
    notifications
}

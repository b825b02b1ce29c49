/*!
  This crate contains constants shared across the profiledog crates
*/

// Management API
pub const API_BASE_URL: &str = "https://localhost/rest";
pub const API_SESSION_HEADER: &str = "vmware-api-session-id";
pub const API_TIMEOUT_SECONDS: u64 = 60;

// Descriptors
pub const DESCRIPTOR_DIR: &str = "/usr/lib/applmgmt/profiledog/descriptors";
pub const APPLIANCE_DESCRIPTOR: &str = "ApplianceManagementDataSource.json";
pub const NETWORK_DESCRIPTOR: &str = "ApplianceNetworkDataSource.json";

// Literal index placeholder inside export/import path templates
pub const INDEX_PLACEHOLDER: &str = "[0]";
pub const MAX_GROUP_INSTANCES: usize = 1024;

// Operating system configuration files
pub const SHADOW_FILE: &str = "/etc/shadow";
pub const PAM_SYSTEM_AUTH_FILE: &str = "/etc/pam.d/system-auth";
pub const NTP_CONF_FILE: &str = "/etc/ntp.conf";
pub const SENDMAIL_CF_FILE: &str = "/etc/mail/sendmail.cf";

// Log forwarding helper and its scratch document
pub const SYSLOG_HELPER: &str = "python /usr/lib/applmgmt/scripts/syslog_data.py";
pub const SYSLOG_HELPER_OUTPUT: &str = "/usr/lib/applmgmt/scripts/syslog_output.json";

// Services
pub const SSHD_SERVICE: &str = "sshd.service";
pub const SENDMAIL_SERVICE: &str = "sendmail";
pub const RSYSLOG_SERVICE: &str = "rsyslog";
pub const NETWORKD_SERVICE: &str = "systemd-networkd";
pub const RESOLVED_SERVICE: &str = "systemd-resolved";

// Shared binaries' locations
pub const SYSTEMCTL_BIN: &str = "/bin/systemctl";

// Local state
pub const CONFIG_FILE: &str = "/etc/profiledog.toml";
pub const LOCK_FILE: &str = "/run/profiledog.lock";

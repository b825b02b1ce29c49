//! Mail relay settings in sendmail.cf: the smart host from the `DS` line, and the relay port from
//! the argument line of the `Mrelay` mailer definition.

use super::{error, value_text_without, wanted, FileAdapter, Result, TextFile};
use crate::ConfigMap;
use serde_json::Value;
use snafu::OptionExt;
use std::path::Path;

pub const MAIL_SERVER: &str = "mail_server";
pub const RELAY_PORT: &str = "relay_port";

const SMART_HOST: &str = "DS";
const RELAY_MAILER: &str = "Mrelay";
// The mailer's argument line, "A=TCP $h <port>", is two lines below its definition.
const ARGS_OFFSET: usize = 2;
const PORT_TOKEN: usize = 2;

#[derive(Debug, Default, Clone, Copy)]
pub struct MailRelay;

// "DS[mail.example.com]" -> "mail.example.com"
fn smart_host(line: &str) -> &str {
    if line.len() < 4 {
        return "";
    }
    line.get(3..line.len() - 1).unwrap_or("")
}

impl FileAdapter for MailRelay {
    fn read(&self, target: &str, keys: &[&str]) -> Result<ConfigMap> {
        let file = TextFile::load(Path::new(target))?;
        let mut found = ConfigMap::new();
        for (i, line) in file.lines.iter().enumerate() {
            if line.starts_with(SMART_HOST) && wanted(keys, MAIL_SERVER) {
                found.insert(
                    MAIL_SERVER.to_string(),
                    Value::String(smart_host(line).to_string()),
                );
            } else if line.starts_with(RELAY_MAILER) && wanted(keys, RELAY_PORT) {
                let port = file
                    .lines
                    .get(i + ARGS_OFFSET)
                    .and_then(|args| args.split_whitespace().nth(PORT_TOKEN));
                if let Some(port) = port {
                    found.insert(RELAY_PORT.to_string(), Value::String(port.to_string()));
                }
            }
        }
        Ok(found)
    }

    fn write(&self, target: &str, updates: &ConfigMap) -> Result<bool> {
        let server = updates
            .get(MAIL_SERVER)
            .map(|v| {
                value_text_without(
                    MAIL_SERVER,
                    v,
                    |c| c.is_whitespace() || c == '[' || c == ']',
                    "a host name",
                )
            })
            .transpose()?;
        let port = updates
            .get(RELAY_PORT)
            .map(|v| value_text_without(RELAY_PORT, v, char::is_whitespace, "a port"))
            .transpose()?;
        if server.is_none() && port.is_none() {
            return Ok(true);
        }

        let path = Path::new(target);
        let mut file = TextFile::load(path)?;
        for i in 0..file.lines.len() {
            if file.lines[i].starts_with(SMART_HOST) {
                if let Some(server) = &server {
                    file.lines[i] = format!("{}[{}]", SMART_HOST, server);
                }
            } else if file.lines[i].starts_with(RELAY_MAILER) {
                if let Some(port) = &port {
                    let args = file.lines.get_mut(i + ARGS_OFFSET).context(
                        error::MissingLineSnafu {
                            path,
                            line: i + 1,
                            expected: "the relay mailer arguments",
                        },
                    )?;
                    let tokens: Vec<&str> = args.split_whitespace().collect();
                    if tokens.len() < PORT_TOKEN {
                        return error::MissingLineSnafu {
                            path,
                            line: i + 1,
                            expected: "the relay mailer arguments",
                        }
                        .fail();
                    }
                    *args = format!("\t\t{} {} {}", tokens[0], tokens[1], port);
                }
            }
        }
        file.save(path)?;
        Ok(true)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;
    use std::fs;

    static SENDMAIL_CF: &str = "# \"Smart\" relay host (may be null)
DS[smtp.example.com]

Mrelay,\t\tP=[IPC], F=mDFMuXa8k, S=EnvFromSMTP/HdrFromSMTP, R=MasqSMTP, E=\\r\\n, L=2040,
\t\tT=DNS/RFC822/SMTP,
\t\tA=TCP $h 25
";

    fn cf_file(contents: &str) -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sendmail.cf");
        fs::write(&path, contents).unwrap();
        let target = path.to_str().unwrap().to_string();
        (dir, target)
    }

    #[test]
    fn read_relay() {
        let (_dir, target) = cf_file(SENDMAIL_CF);
        let found = MailRelay.read(&target, &[]).unwrap();
        assert_eq!(found[MAIL_SERVER], json!("smtp.example.com"));
        assert_eq!(found[RELAY_PORT], json!("25"));

        let found = MailRelay.read(&target, &[RELAY_PORT]).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn empty_smart_host() {
        assert_eq!(smart_host("DS"), "");
        assert_eq!(smart_host("DS[]"), "");
        assert_eq!(smart_host("DS[a]"), "a");
    }

    #[test]
    fn write_relay() {
        let (_dir, target) = cf_file(SENDMAIL_CF);
        let mut updates = ConfigMap::new();
        updates.insert(MAIL_SERVER.to_string(), json!("relay.example.org"));
        updates.insert(RELAY_PORT.to_string(), json!(587));
        assert!(MailRelay.write(&target, &updates).unwrap());
        assert_eq!(
            fs::read_to_string(&target).unwrap(),
            SENDMAIL_CF
                .replace("DS[smtp.example.com]", "DS[relay.example.org]")
                .replace("A=TCP $h 25", "A=TCP $h 587")
        );
    }

    #[test]
    fn unchanged_values_round_trip() {
        let (_dir, target) = cf_file(SENDMAIL_CF);
        let found = MailRelay.read(&target, &[]).unwrap();
        MailRelay.write(&target, &found).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), SENDMAIL_CF);
    }

    #[test]
    fn nothing_to_write() {
        // No file is needed when there's nothing to change
        assert!(MailRelay
            .write("/nonexistent/sendmail.cf", &ConfigMap::new())
            .unwrap());
    }

    #[test]
    fn line_breaking_values_rejected() {
        let (_dir, target) = cf_file(SENDMAIL_CF);
        for (key, value) in [
            (RELAY_PORT, json!("25\nMevil, P=/bin/sh")),
            (RELAY_PORT, json!("25 26")),
            (MAIL_SERVER, json!("relay.example.org]\nDSother")),
            (MAIL_SERVER, json!("relay example")),
        ] {
            let mut updates = ConfigMap::new();
            updates.insert(key.to_string(), value);
            assert!(MailRelay.write(&target, &updates).is_err(), "{}", key);
        }
        assert_eq!(fs::read_to_string(&target).unwrap(), SENDMAIL_CF);
    }

    #[test]
    fn truncated_mailer() {
        let (_dir, target) = cf_file("DS\nMrelay, P=[IPC]\n");
        let mut updates = ConfigMap::new();
        updates.insert(RELAY_PORT.to_string(), json!("2525"));
        assert!(matches!(
            MailRelay.write(&target, &updates),
            Err(crate::files::Error::MissingLine { line: 2, .. })
        ));
        assert_eq!(fs::read_to_string(&target).unwrap(), "DS\nMrelay, P=[IPC]\n");
    }
}

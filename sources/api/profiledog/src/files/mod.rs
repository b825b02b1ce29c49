//! Adapters for settings that live in host configuration files or services rather than behind
//! the REST API.
//!
//! Every adapter implements [`FileAdapter`]: `read` returns the requested keys found in the
//! target, and `write` applies updates to it.  Adapters are selected by [`FileFormat`], never by
//! inspecting the target.
//!
//! Writes never leave a file half-written.  The new content is built in memory from the original
//! lines, written to a temporary file next to the target with the target's permissions, and
//! renamed over it.  Lines an adapter doesn't understand pass through untouched, including the
//! presence or absence of a final newline.

use crate::command::{self, CommandRunner};
use crate::ConfigMap;
use serde_json::Value;
use snafu::{ensure, ResultExt};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

pub mod ntp;
pub mod pam;
pub mod sendmail;
pub mod service;
pub mod shadow;
pub mod syslog;

mod error {
    use snafu::Snafu;
    use std::io;
    use std::path::PathBuf;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(crate)))]
    pub enum Error {
        #[snafu(display("Failed to read {}: {}", path.display(), source))]
        FileRead { path: PathBuf, source: io::Error },

        #[snafu(display("Failed to write {}: {}", path.display(), source))]
        FileWrite { path: PathBuf, source: io::Error },

        #[snafu(display("Failed to replace {}: {}", path.display(), source))]
        FilePersist {
            path: PathBuf,
            source: tempfile::PersistError,
        },

        #[snafu(display("Value for '{}' must be {}, got {}", key, expected, value))]
        UnsupportedValue {
            key: String,
            expected: &'static str,
            value: serde_json::Value,
        },

        #[snafu(display("{}: expected {} after line {}", path.display(), expected, line))]
        MissingLine {
            path: PathBuf,
            line: usize,
            expected: &'static str,
        },

        #[snafu(display(
            "Log forwarding updates must come in sets of three keys, got {}",
            count
        ))]
        KeyCount { count: usize },

        #[snafu(display("Log forwarding data in {} is invalid: {}", path.display(), source))]
        HelperData {
            path: PathBuf,
            source: serde_json::Error,
        },

        #[snafu(display("{}", source))]
        Command {
            #[snafu(source(from(crate::command::Error, Box::new)))]
            source: Box<crate::command::Error>,
        },
    }
}
pub use error::Error;
pub type Result<T> = std::result::Result<T, error::Error>;

/// Identifies an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    AccountAging,
    PamPolicy,
    NtpConfig,
    ServiceEnablement,
    MailRelay,
    LogForwarding,
}

impl FileFormat {
    pub const ALL: [FileFormat; 6] = [
        FileFormat::AccountAging,
        FileFormat::PamPolicy,
        FileFormat::NtpConfig,
        FileFormat::ServiceEnablement,
        FileFormat::MailRelay,
        FileFormat::LogForwarding,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FileFormat::AccountAging => "account-aging",
            FileFormat::PamPolicy => "pam-policy",
            FileFormat::NtpConfig => "ntp-config",
            FileFormat::ServiceEnablement => "service-enablement",
            FileFormat::MailRelay => "mail-relay",
            FileFormat::LogForwarding => "log-forwarding",
        }
    }
}

/// Read/write access to one kind of host configuration source.
///
/// `target` is a file path, or for service enablement a unit name.
pub trait FileAdapter {
    /// Returns the requested keys found in the target.  An empty `keys` asks for everything the
    /// adapter knows how to read.
    fn read(&self, target: &str, keys: &[&str]) -> Result<ConfigMap>;

    /// Applies `updates` to the target.  Returns false if the updates held nothing the adapter
    /// could act on.
    fn write(&self, target: &str, updates: &ConfigMap) -> Result<bool>;
}

/// What adapters need from their surroundings.
pub struct AdapterContext<'a> {
    pub runner: &'a dyn CommandRunner,
    /// Command line of the log forwarding helper.
    pub syslog_helper: &'a str,
}

impl<'a> AdapterContext<'a> {
    /// Returns the adapter for `format`.
    pub fn adapter(&self, format: FileFormat) -> Box<dyn FileAdapter + 'a> {
        match format {
            FileFormat::AccountAging => Box::new(shadow::AccountAging),
            FileFormat::PamPolicy => Box::new(pam::PamPolicy::default()),
            FileFormat::NtpConfig => Box::new(ntp::NtpConfig),
            FileFormat::ServiceEnablement => Box::new(service::ServiceEnablement::new(self.runner)),
            FileFormat::MailRelay => Box::new(sendmail::MailRelay),
            FileFormat::LogForwarding => {
                Box::new(syslog::LogForwarding::new(self.runner, self.syslog_helper))
            }
        }
    }
}

/// A text file held as lines.  Splitting on '\n' and joining again reproduces the file exactly,
/// so a file ending in a newline has an empty last line.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TextFile {
    pub(crate) lines: Vec<String>,
}

impl TextFile {
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).context(error::FileReadSnafu { path })?;
        Ok(Self::parse(&contents))
    }

    pub(crate) fn parse(contents: &str) -> Self {
        Self {
            lines: contents.split('\n').map(String::from).collect(),
        }
    }

    pub(crate) fn contents(&self) -> String {
        self.lines.join("\n")
    }

    pub(crate) fn save(&self, path: &Path) -> Result<()> {
        write_atomically(path, &self.contents())
    }
}

/// Replaces the file at `path` with `contents` in one rename, keeping its permissions.
pub(crate) fn write_atomically(path: &Path, contents: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let permissions = fs::metadata(path).ok().map(|m| m.permissions());

    let mut temp = NamedTempFile::new_in(dir).context(error::FileWriteSnafu { path })?;
    temp.write_all(contents.as_bytes())
        .context(error::FileWriteSnafu { path })?;
    temp.as_file()
        .sync_all()
        .context(error::FileWriteSnafu { path })?;
    if let Some(permissions) = permissions {
        temp.as_file()
            .set_permissions(permissions)
            .context(error::FileWriteSnafu { path })?;
    }
    temp.persist(path).context(error::FilePersistSnafu { path })?;
    debug!("Wrote {}", path.display());
    Ok(())
}

/// Renders a scalar update as the text that goes into a file.  Line breaks are refused, so an
/// update can never add lines of its own.
pub(crate) fn value_text(key: &str, value: &Value) -> Result<String> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => {
            return error::UnsupportedValueSnafu {
                key,
                expected: "a string, number, or boolean",
                value: other.clone(),
            }
            .fail()
        }
    };
    ensure!(
        !text.contains(|c: char| c == '\n' || c == '\r'),
        error::UnsupportedValueSnafu {
            key,
            expected: "a single line",
            value: value.clone(),
        }
    );
    Ok(text)
}

/// Like `value_text`, also refusing any character matched by `reject`, such as the file's own
/// field separator.
pub(crate) fn value_text_without<F>(
    key: &str,
    value: &Value,
    reject: F,
    expected: &'static str,
) -> Result<String>
where
    F: Fn(char) -> bool,
{
    let text = value_text(key, value)?;
    ensure!(
        !text.contains(reject),
        error::UnsupportedValueSnafu {
            key,
            expected,
            value: value.clone(),
        }
    );
    Ok(text)
}

/// Interprets an update as a boolean; "true" and "false" strings count.
pub(crate) fn value_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

pub(crate) fn wanted(keys: &[&str], key: &str) -> bool {
    keys.is_empty() || keys.contains(&key)
}

impl From<command::Error> for Error {
    fn from(source: command::Error) -> Self {
        Error::Command {
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn text_file_is_lossless() {
        for contents in &["", "a", "a\n", "a\n\nb\n", "a\r\nb", "\n\n"] {
            assert_eq!(TextFile::parse(contents).contents(), *contents);
        }
    }

    #[test]
    fn atomic_write_keeps_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shadow");
        fs::write(&path, "old\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

        write_atomically(&path, "new\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");
        assert_eq!(
            fs::metadata(&path).unwrap().permissions().mode() & 0o777,
            0o640
        );
        // No stray temporary files
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn atomic_write_failure_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("file");
        assert!(write_atomically(&path, "x").is_err());
        assert!(!path.exists());
    }

    #[test]
    fn values() {
        assert_eq!(value_text("k", &json!("a")).unwrap(), "a");
        assert_eq!(value_text("k", &json!(90)).unwrap(), "90");
        assert_eq!(value_text("k", &json!(false)).unwrap(), "false");
        assert!(value_text("k", &json!(["a"])).is_err());
        assert!(value_text("k", &json!(null)).is_err());
        assert!(value_text("k", &json!("90\nevil::0:0:99999:7:::")).is_err());
        assert!(value_text("k", &json!("a\rb")).is_err());

        let no_colon = |c: char| c == ':';
        assert_eq!(value_text_without("k", &json!(7), no_colon, "x").unwrap(), "7");
        assert!(matches!(
            value_text_without("k", &json!("7:1"), no_colon, "a value without ':'"),
            Err(Error::UnsupportedValue { expected: "a value without ':'", .. })
        ));

        assert_eq!(value_bool(&json!(true)), Some(true));
        assert_eq!(value_bool(&json!("FALSE")), Some(false));
        assert_eq!(value_bool(&json!("yes")), None);
        assert_eq!(value_bool(&json!(1)), None);
    }

    #[test]
    fn every_format_has_an_adapter() {
        struct NoCommands;
        impl CommandRunner for NoCommands {
            fn run(&self, _: &str, _: &[&str]) -> command::Result<command::CommandOutput> {
                panic!("no commands expected")
            }
        }
        let runner = NoCommands;
        let context = AdapterContext {
            runner: &runner,
            syslog_helper: "true",
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty");
        fs::write(&path, "").unwrap();
        let target = path.to_str().unwrap();
        for format in &[
            FileFormat::AccountAging,
            FileFormat::PamPolicy,
            FileFormat::NtpConfig,
            FileFormat::MailRelay,
        ] {
            assert!(context.adapter(*format).read(target, &[]).unwrap().is_empty());
        }
        assert_eq!(FileFormat::ALL.len(), 6);
    }
}

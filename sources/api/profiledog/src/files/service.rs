//! Service enablement through systemctl.  The target is a unit name, and the only key is
//! `enabled`.

use super::{value_bool, FileAdapter, Result};
use crate::command::{self, CommandRunner};
use crate::ConfigMap;
use serde_json::Value;

pub const ENABLED: &str = "enabled";

pub struct ServiceEnablement<'a> {
    runner: &'a dyn CommandRunner,
    systemctl: &'static str,
}

impl<'a> ServiceEnablement<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self {
            runner,
            systemctl: constants::SYSTEMCTL_BIN,
        }
    }

    // systemctl exits non-zero for "disabled" and "inactive", so only a failure to run counts.
    fn status(&self, verb: &str, unit: &str, expected: &str) -> Result<bool> {
        let output = self.runner.run(self.systemctl, &[verb, unit])?;
        let status = output.stdout.trim();
        trace!("{} {}: {}", verb, unit, status);
        Ok(status.eq_ignore_ascii_case(expected))
    }

    fn systemctl(&self, verb: &str, unit: &str) -> Result<()> {
        command::run_checked(self.runner, self.systemctl, &[verb, unit])?;
        Ok(())
    }
}

impl FileAdapter for ServiceEnablement<'_> {
    fn read(&self, target: &str, _keys: &[&str]) -> Result<ConfigMap> {
        let enabled = self.status("is-enabled", target, "enabled")?;
        let active = self.status("is-active", target, "active")?;
        let mut found = ConfigMap::new();
        found.insert(ENABLED.to_string(), Value::Bool(enabled && active));
        Ok(found)
    }

    fn write(&self, target: &str, updates: &ConfigMap) -> Result<bool> {
        let verbs: &[&str] = match updates.get(ENABLED).and_then(value_bool) {
            Some(true) => &["unmask", "enable", "start"],
            Some(false) => &["mask", "disable", "stop"],
            None => {
                debug!("No usable '{}' for {}", ENABLED, target);
                return Ok(false);
            }
        };
        for verb in verbs {
            info!("{} {}", verb, target);
            self.systemctl(verb, target)?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::command::CommandOutput;
    use serde_json::json;
    use std::cell::RefCell;

    /// Answers status queries from a fixed table and records every call.
    struct FakeSystemctl {
        enabled: &'static str,
        active: &'static str,
        calls: RefCell<Vec<String>>,
    }

    impl FakeSystemctl {
        fn new(enabled: &'static str, active: &'static str) -> Self {
            Self {
                enabled,
                active,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl CommandRunner for FakeSystemctl {
        fn run(&self, program: &str, args: &[&str]) -> command::Result<CommandOutput> {
            assert_eq!(program, constants::SYSTEMCTL_BIN);
            self.calls.borrow_mut().push(args.join(" "));
            let stdout = match args[0] {
                "is-enabled" => self.enabled,
                "is-active" => self.active,
                _ => "",
            };
            Ok(CommandOutput {
                success: stdout.is_empty() || stdout == "enabled" || stdout == "active",
                stdout: format!("{}\n", stdout),
                stderr: String::new(),
            })
        }
    }

    fn enabled(value: Value) -> ConfigMap {
        let mut updates = ConfigMap::new();
        updates.insert(ENABLED.to_string(), value);
        updates
    }

    #[test]
    fn read_requires_enabled_and_active() {
        for &(is_enabled, is_active, expected) in &[
            ("enabled", "active", true),
            ("ENABLED", "Active", true),
            ("disabled", "active", false),
            ("enabled", "inactive", false),
            ("masked", "failed", false),
        ] {
            let runner = FakeSystemctl::new(is_enabled, is_active);
            let found = ServiceEnablement::new(&runner)
                .read("sshd.service", &[ENABLED])
                .unwrap();
            assert_eq!(found, enabled(json!(expected)));
        }
    }

    #[test]
    fn write_sequences() {
        let runner = FakeSystemctl::new("enabled", "active");
        let adapter = ServiceEnablement::new(&runner);
        assert!(adapter.write("sshd.service", &enabled(json!(true))).unwrap());
        assert!(adapter.write("sshd.service", &enabled(json!("false"))).unwrap());
        assert_eq!(
            *runner.calls.borrow(),
            vec![
                "unmask sshd.service",
                "enable sshd.service",
                "start sshd.service",
                "mask sshd.service",
                "disable sshd.service",
                "stop sshd.service",
            ]
        );
    }

    #[test]
    fn other_values_do_nothing() {
        let runner = FakeSystemctl::new("enabled", "active");
        let adapter = ServiceEnablement::new(&runner);
        assert!(!adapter.write("sshd.service", &enabled(json!("maybe"))).unwrap());
        assert!(!adapter.write("sshd.service", &ConfigMap::new()).unwrap());
        assert!(runner.calls.borrow().is_empty());
    }

    #[test]
    fn unstartable_status_command_is_an_error() {
        struct Missing;
        impl CommandRunner for Missing {
            fn run(&self, program: &str, _: &[&str]) -> command::Result<CommandOutput> {
                crate::command::SystemCommand.run(&format!("/nonexistent{}", program), &[])
            }
        }
        assert!(ServiceEnablement::new(&Missing)
            .read("sshd.service", &[])
            .is_err());
    }
}

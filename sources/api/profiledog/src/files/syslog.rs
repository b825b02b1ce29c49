//! Log forwarding targets, owned by an external helper that converts between the syslog
//! configuration and a JSON list of `{hostname, port, protocol}` objects.
//!
//! The target is the path of that JSON file.  Entries are flattened to `Server_N`, `Port_N`, and
//! `Protocol_N` keys; at most three entries are written back.

use super::{error, wanted, FileAdapter, Result};
use crate::command::{self, CommandRunner};
use crate::ConfigMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use snafu::{ensure, ResultExt};
use std::fs;
use std::path::Path;

pub const MAX_TARGETS: usize = 3;
const KEYS_PER_TARGET: usize = 3;

pub fn server_key(index: usize) -> String {
    format!("Server_{}", index)
}

pub fn port_key(index: usize) -> String {
    format!("Port_{}", index)
}

pub fn protocol_key(index: usize) -> String {
    format!("Protocol_{}", index)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ForwardingTarget {
    hostname: Value,
    port: Value,
    protocol: Value,
}

pub struct LogForwarding<'a> {
    runner: &'a dyn CommandRunner,
    helper: &'a str,
}

impl<'a> LogForwarding<'a> {
    pub fn new(runner: &'a dyn CommandRunner, helper: &'a str) -> Self {
        Self { runner, helper }
    }

    fn run_helper(&self, verb: &str, target: &str) -> Result<()> {
        let (program, mut args) = command::split_command_line(self.helper)?;
        args.push(verb.to_string());
        args.push(target.to_string());
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        command::run_checked(self.runner, &program, &args)?;
        Ok(())
    }
}

impl FileAdapter for LogForwarding<'_> {
    fn read(&self, target: &str, keys: &[&str]) -> Result<ConfigMap> {
        self.run_helper("export", target)?;
        let path = Path::new(target);
        let data = fs::read_to_string(path).context(error::FileReadSnafu { path })?;
        let targets: Vec<ForwardingTarget> =
            serde_json::from_str(&data).context(error::HelperDataSnafu { path })?;

        let mut found = ConfigMap::new();
        for (index, entry) in targets.into_iter().enumerate() {
            for (key, value) in [
                (server_key(index), entry.hostname),
                (port_key(index), entry.port),
                (protocol_key(index), entry.protocol),
            ] {
                if wanted(keys, &key) {
                    found.insert(key, value);
                }
            }
        }
        Ok(found)
    }

    fn write(&self, target: &str, updates: &ConfigMap) -> Result<bool> {
        ensure!(
            updates.len() % KEYS_PER_TARGET == 0,
            error::KeyCountSnafu {
                count: updates.len()
            }
        );

        let mut targets = Vec::with_capacity(MAX_TARGETS);
        for index in 0..MAX_TARGETS {
            let entry = (
                updates.get(&server_key(index)),
                updates.get(&port_key(index)),
                updates.get(&protocol_key(index)),
            );
            match entry {
                (Some(hostname), Some(port), Some(protocol)) => targets.push(ForwardingTarget {
                    hostname: hostname.clone(),
                    port: port.clone(),
                    protocol: protocol.clone(),
                }),
                (None, None, None) => {}
                _ => warn!("Skipping incomplete log forwarding target {}", index),
            }
        }

        let path = Path::new(target);
        let data = serde_json::to_string_pretty(&targets)
            .context(error::HelperDataSnafu { path })?;
        super::write_atomically(path, &data)?;
        self.run_helper("import", target)?;
        Ok(true)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::command::{CommandOutput, SystemCommand};
    use serde_json::json;
    use std::cell::RefCell;

    /// Stands in for the helper: "export" writes a canned list, "import" keeps what it was given.
    struct FakeHelper {
        exported: Value,
        imported: RefCell<Option<Value>>,
    }

    impl CommandRunner for FakeHelper {
        fn run(&self, program: &str, args: &[&str]) -> command::Result<CommandOutput> {
            assert_eq!(program, "python");
            assert_eq!(args[0], "/usr/lib/applmgmt/scripts/syslog_data.py");
            match args[1] {
                "export" => fs::write(args[2], self.exported.to_string()).unwrap(),
                "import" => {
                    let data = fs::read_to_string(args[2]).unwrap();
                    *self.imported.borrow_mut() = Some(serde_json::from_str(&data).unwrap());
                }
                other => panic!("unexpected helper verb {}", other),
            }
            Ok(CommandOutput {
                success: true,
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }

    fn helper(exported: Value) -> FakeHelper {
        FakeHelper {
            exported,
            imported: RefCell::new(None),
        }
    }

    fn target() -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("syslog_output.json");
        let target = path.to_str().unwrap().to_string();
        (dir, target)
    }

    #[test]
    fn read_flattens_targets() {
        let (_dir, target) = target();
        let runner = helper(json!([
            {"hostname": "log1.example.com", "port": 514, "protocol": "UDP"},
            {"hostname": "log2.example.com", "port": "6514", "protocol": "TLS"}
        ]));
        let adapter = LogForwarding::new(&runner, constants::SYSLOG_HELPER);
        let found = adapter.read(&target, &[]).unwrap();
        assert_eq!(
            found.keys().collect::<Vec<_>>(),
            vec!["Server_0", "Port_0", "Protocol_0", "Server_1", "Port_1", "Protocol_1"]
        );
        assert_eq!(found["Port_0"], json!(514));
        assert_eq!(found["Protocol_1"], json!("TLS"));

        let found = adapter.read(&target, &["Server_1"]).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn write_rebuilds_complete_targets() {
        let (_dir, target) = target();
        let runner = helper(json!([]));
        let adapter = LogForwarding::new(&runner, constants::SYSLOG_HELPER);
        let mut updates = ConfigMap::new();
        for (key, value) in [
            ("Server_0", json!("log1.example.com")),
            ("Port_0", json!(514)),
            ("Protocol_0", json!("UDP")),
            ("Server_1", json!("orphan.example.com")),
            ("Port_2", json!(1514)),
            ("Protocol_2", json!("TCP")),
        ] {
            updates.insert(key.to_string(), value);
        }
        assert!(adapter.write(&target, &updates).unwrap());
        assert_eq!(
            runner.imported.borrow().clone().unwrap(),
            json!([{"hostname": "log1.example.com", "port": 514, "protocol": "UDP"}])
        );
    }

    #[test]
    fn write_needs_whole_targets() {
        let (_dir, target) = target();
        let runner = helper(json!([]));
        let adapter = LogForwarding::new(&runner, constants::SYSLOG_HELPER);
        let mut updates = ConfigMap::new();
        updates.insert("Server_0".to_string(), json!("log1.example.com"));
        assert!(matches!(
            adapter.write(&target, &updates),
            Err(crate::files::Error::KeyCount { count: 1 })
        ));
        assert!(runner.imported.borrow().is_none());
    }

    #[test]
    fn failing_helper() {
        let (_dir, target) = target();
        let runner = SystemCommand;
        let adapter = LogForwarding::new(&runner, "sh -c 'exit 2' helper");
        assert!(adapter.read(&target, &[]).is_err());
        let adapter = LogForwarding::new(&runner, "sh -c 'echo \"[\" > \"$2\"' helper");
        assert!(matches!(
            adapter.read(&target, &[]),
            Err(crate::files::Error::HelperData { .. })
        ));
    }
}

//! NTP servers in ntp.conf.  Only `server <address>` lines with no options are managed.

use super::{value_text_without, FileAdapter, Result, TextFile};
use crate::ConfigMap;
use serde_json::Value;
use std::path::Path;

pub const SERVER: &str = "server";

#[derive(Debug, Default, Clone, Copy)]
pub struct NtpConfig;

fn is_server_line(line: &str) -> bool {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    tokens.len() == 2 && tokens[0] == SERVER
}

// A server with spaces in it would become options on its line.
fn server_text(value: &Value) -> Result<String> {
    value_text_without(SERVER, value, char::is_whitespace, "one address")
}

impl FileAdapter for NtpConfig {
    fn read(&self, target: &str, keys: &[&str]) -> Result<ConfigMap> {
        let mut found = ConfigMap::new();
        if !keys.is_empty() && !keys.contains(&SERVER) {
            return Ok(found);
        }
        let file = TextFile::load(Path::new(target))?;
        let servers: Vec<Value> = file
            .lines
            .iter()
            .filter(|line| is_server_line(line))
            .filter_map(|line| line.split_whitespace().nth(1))
            .map(|server| Value::String(server.to_string()))
            .collect();
        if !servers.is_empty() {
            found.insert(SERVER.to_string(), Value::Array(servers));
        }
        Ok(found)
    }

    /// New servers replace the existing server lines in order.  Server lines beyond the new list
    /// are kept, and servers beyond the existing lines are not added.
    fn write(&self, target: &str, updates: &ConfigMap) -> Result<bool> {
        let servers = match updates.get(SERVER) {
            Some(Value::Array(servers)) => servers
                .iter()
                .map(server_text)
                .collect::<Result<Vec<_>>>()?,
            Some(other) => vec![server_text(other)?],
            None => return Ok(true),
        };

        let path = Path::new(target);
        let mut file = TextFile::load(path)?;
        let mut servers = servers.into_iter();
        for line in file.lines.iter_mut().filter(|line| is_server_line(line)) {
            match servers.next() {
                Some(server) => *line = format!("{} {}", SERVER, server),
                None => break,
            }
        }
        let dropped = servers.count();
        if dropped > 0 {
            warn!(
                "{} has no line for {} more server(s), not adding them",
                path.display(),
                dropped
            );
        }
        file.save(path)?;
        Ok(true)
    }
}

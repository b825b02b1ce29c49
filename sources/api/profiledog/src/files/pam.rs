//! Lockout policy in a PAM stack file.
//!
//! Module arguments are whitespace-separated tokens, either `key=value` or a bare flag.  Reading
//! reports the value of each requested `key=value` argument and `true` for each requested flag
//! that's present.  Writing edits arguments in place, keeping the line's spacing.

use super::{value_bool, value_text_without, wanted, FileAdapter, Result, TextFile};
use crate::ConfigMap;
use serde_json::Value;
use std::path::Path;

/// Flags that belong to a specific module, and are added to that module's line when requested.
static COMPANION_FLAGS: &[(&str, &str)] = &[("pam_tally2.so", "even_deny_root")];

#[derive(Debug, Clone, Copy)]
pub struct PamPolicy {
    companions: &'static [(&'static str, &'static str)],
}

impl Default for PamPolicy {
    fn default() -> Self {
        Self {
            companions: COMPANION_FLAGS,
        }
    }
}

// One argument with the whitespace before it.
#[derive(Debug)]
struct Token<'a> {
    space: &'a str,
    text: &'a str,
}

fn is_directive(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && !trimmed.starts_with('#')
}

/// Splits a line into tokens plus any trailing whitespace.
fn tokenize(line: &str) -> (Vec<Token<'_>>, &str) {
    let mut tokens = Vec::new();
    let mut rest = line;
    loop {
        let start = rest.len() - rest.trim_start().len();
        if start == rest.len() {
            return (tokens, rest);
        }
        let (space, after) = rest.split_at(start);
        let end = after.find(char::is_whitespace).unwrap_or(after.len());
        let (text, remaining) = after.split_at(end);
        tokens.push(Token { space, text });
        rest = remaining;
    }
}

impl FileAdapter for PamPolicy {
    fn read(&self, target: &str, keys: &[&str]) -> Result<ConfigMap> {
        let file = TextFile::load(Path::new(target))?;
        let mut found = ConfigMap::new();
        for line in file.lines.iter().filter(|l| is_directive(l)) {
            for token in line.split_whitespace() {
                let (key, value) = match token.split_once('=') {
                    Some((key, value)) => (key, Value::String(value.to_string())),
                    None => (token, Value::Bool(true)),
                };
                if wanted(keys, key) && !found.contains_key(key) {
                    found.insert(key.to_string(), value);
                }
            }
        }
        Ok(found)
    }

    fn write(&self, target: &str, updates: &ConfigMap) -> Result<bool> {
        if updates.is_empty() {
            return Ok(false);
        }
        let path = Path::new(target);
        let mut file = TextFile::load(path)?;
        for line in file.lines.iter_mut() {
            if is_directive(line) {
                *line = self.rewrite_line(line, updates)?;
            }
        }
        file.save(path)?;
        Ok(true)
    }
}

impl PamPolicy {
    fn rewrite_line(&self, line: &str, updates: &ConfigMap) -> Result<String> {
        let (tokens, trailing) = tokenize(line);
        let mut out = String::with_capacity(line.len());
        let mut present = Vec::with_capacity(tokens.len());

        for token in &tokens {
            match token.text.split_once('=') {
                Some((key, _)) => match updates.get(key) {
                    Some(value) => {
                        out.push_str(token.space);
                        out.push_str(key);
                        out.push('=');
                        out.push_str(&value_text_without(
                            key,
                            value,
                            char::is_whitespace,
                            "a value without whitespace",
                        )?);
                    }
                    None => {
                        out.push_str(token.space);
                        out.push_str(token.text);
                    }
                },
                None => {
                    let drop = updates.get(token.text).and_then(value_bool) == Some(false);
                    if drop {
                        trace!("Removing '{}'", token.text);
                        continue;
                    }
                    out.push_str(token.space);
                    out.push_str(token.text);
                }
            }
            present.push(token.text);
        }

        for (module, flag) in self.companions {
            let requested = updates.get(*flag).and_then(value_bool) == Some(true);
            if requested && present.contains(module) && !present.contains(flag) {
                trace!("Adding '{}' to {}", flag, module);
                out.push(' ');
                out.push_str(flag);
            }
        }

        out.push_str(trailing);
        Ok(out)
    }
}

//! Password aging in the shadow file.
//!
//! Entries are keyed by user name, each value an object with `maximumDays` and `warningDays`,
//! the fifth and sixth colon-delimited fields of the user's line.

use super::{value_text_without, wanted, FileAdapter, Result, TextFile};
use crate::ConfigMap;
use serde_json::{json, Value};
use std::path::Path;

pub const MAXIMUM_DAYS: &str = "maximumDays";
pub const WARNING_DAYS: &str = "warningDays";

const MIN_FIELDS: usize = 6;
const MAXIMUM_DAYS_FIELD: usize = 4;
const WARNING_DAYS_FIELD: usize = 5;

#[derive(Debug, Default, Clone, Copy)]
pub struct AccountAging;

impl FileAdapter for AccountAging {
    /// `keys` are user names.
    fn read(&self, target: &str, keys: &[&str]) -> Result<ConfigMap> {
        let file = TextFile::load(Path::new(target))?;
        let mut entries = ConfigMap::new();
        for line in &file.lines {
            let fields: Vec<&str> = line.trim_end_matches('\r').split(':').collect();
            if fields.len() < MIN_FIELDS || !wanted(keys, fields[0]) {
                continue;
            }
            entries.insert(
                fields[0].to_string(),
                json!({
                    MAXIMUM_DAYS: fields[MAXIMUM_DAYS_FIELD],
                    WARNING_DAYS: fields[WARNING_DAYS_FIELD],
                }),
            );
        }
        Ok(entries)
    }

    fn write(&self, target: &str, updates: &ConfigMap) -> Result<bool> {
        let path = Path::new(target);
        let mut file = TextFile::load(path)?;
        let mut changed = 0;
        for line in file.lines.iter_mut() {
            let mut fields: Vec<String> = line.split(':').map(String::from).collect();
            if fields.len() < MIN_FIELDS {
                continue;
            }
            let update = match updates.get(&fields[0]) {
                Some(update) => update,
                None => continue,
            };
            if let Some(days) = aging_value(update, MAXIMUM_DAYS)? {
                fields[MAXIMUM_DAYS_FIELD] = days;
            }
            if let Some(days) = aging_value(update, WARNING_DAYS)? {
                fields[WARNING_DAYS_FIELD] = days;
            }
            *line = fields.join(":");
            changed += 1;
        }
        debug!("Updated aging for {} of {} user(s)", changed, updates.len());
        file.save(path)?;
        Ok(true)
    }
}

fn aging_value(update: &Value, key: &str) -> Result<Option<String>> {
    match update.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            value_text_without(key, value, |c| c == ':', "a value without ':'").map(Some)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    static SHADOW: &str = "root:$6$salt$hash:18000:0:99999:7:::
alice:x:18000:5:90:7:::
broken:line
bob:!:18000:0:60:14:::
";

    fn shadow_file(contents: &str) -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shadow");
        fs::write(&path, contents).unwrap();
        let target = path.to_str().unwrap().to_string();
        (dir, target)
    }

    #[test]
    fn read_entries() {
        let (_dir, target) = shadow_file(SHADOW);
        let entries = AccountAging.read(&target, &[]).unwrap();
        assert_eq!(
            entries.keys().collect::<Vec<_>>(),
            vec!["root", "alice", "bob"]
        );
        assert_eq!(
            entries["alice"],
            json!({"maximumDays": "90", "warningDays": "7"})
        );

        let entries = AccountAging.read(&target, &["bob"]).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries["bob"],
            json!({"maximumDays": "60", "warningDays": "14"})
        );
    }

    #[test]
    fn write_only_touches_aging_fields() {
        let (_dir, target) = shadow_file(SHADOW);
        let mut updates = ConfigMap::new();
        updates.insert(
            "alice".to_string(),
            json!({"maximumDays": "100", "warningDays": 10}),
        );
        updates.insert("nobody".to_string(), json!({"maximumDays": "1"}));
        assert!(AccountAging.write(&target, &updates).unwrap());

        assert_eq!(
            fs::read_to_string(&target).unwrap(),
            SHADOW.replace("alice:x:18000:5:90:7:::", "alice:x:18000:5:100:10:::")
        );
    }

    #[test]
    fn partial_update_keeps_other_field() {
        let (_dir, target) = shadow_file("bob:!:18000:0:60:14:::");
        let mut updates = ConfigMap::new();
        updates.insert("bob".to_string(), json!({"warningDays": "3"}));
        AccountAging.write(&target, &updates).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "bob:!:18000:0:60:3:::");
    }

    #[test]
    fn unchanged_values_round_trip() {
        let (_dir, target) = shadow_file(SHADOW);
        let entries = AccountAging.read(&target, &[]).unwrap();
        AccountAging.write(&target, &entries).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), SHADOW);
    }

    #[test]
    fn bad_update_leaves_file() {
        let (_dir, target) = shadow_file(SHADOW);
        let mut updates = ConfigMap::new();
        updates.insert("alice".to_string(), json!({"maximumDays": ["x"]}));
        assert!(AccountAging.write(&target, &updates).is_err());
        assert_eq!(fs::read_to_string(&target).unwrap(), SHADOW);
    }

    #[test]
    fn separator_in_value_rejected() {
        let (_dir, target) = shadow_file(SHADOW);
        for days in &[json!("90\nevil::0:0:99999:7:::"), json!("7:1")] {
            let mut updates = ConfigMap::new();
            updates.insert(
                "alice".to_string(),
                json!({"maximumDays": days, "warningDays": "7"}),
            );
            assert!(matches!(
                AccountAging.write(&target, &updates),
                Err(crate::files::Error::UnsupportedValue { .. })
            ));
        }
        assert_eq!(fs::read_to_string(&target).unwrap(), SHADOW);
    }

    #[test]
    fn missing_file() {
        assert!(AccountAging.read("/nonexistent/shadow", &[]).is_err());
    }
}

//! Turns a group's path templates into one value map per repeated instance.

use crate::descriptor::Group;
use crate::path;
use crate::ConfigMap;
use serde_json::Value;

/// Instance maps for one group, in ascending index order.
pub type ConfigGroupValues = Vec<ConfigMap>;

/// Extracts every instance of `group` from `document`.
///
/// Indexed fields (templates containing the placeholder) are evaluated with the placeholder
/// replaced by 0, 1, 2, ... and enumeration stops after the first index at which none of them
/// yields a value.  Fields that can't be found are left out of that instance's map.
///
/// Non-indexed fields are evaluated once and their values repeated into every instance.  A group
/// with no indexed fields yields exactly one instance, if anything was found at all.
///
/// At most `max_instances` instances are returned.
pub fn enumerate_group(document: &Value, group: &Group, max_instances: usize) -> ConfigGroupValues {
    let repeated = group.is_repeated();

    // Non-indexed values don't change between iterations.
    let fixed: Vec<Option<&Value>> = group
        .fields
        .iter()
        .map(|field| {
            if field.is_indexed() {
                None
            } else {
                lookup(document, &group.name, &field.name, &field.export_path)
            }
        })
        .collect();

    let mut instances = Vec::new();
    for index in 0..max_instances {
        let mut instance = ConfigMap::new();
        let mut productive = false;

        for (field, fixed_value) in group.fields.iter().zip(&fixed) {
            let value = if field.is_indexed() {
                let found = lookup(
                    document,
                    &group.name,
                    &field.name,
                    &field.export_path_at(index),
                );
                productive |= found.is_some();
                found
            } else {
                *fixed_value
            };
            if let Some(value) = value {
                instance.insert(field.name.clone(), value.clone());
            }
        }

        // An unproductive iteration of a repeated group only carries repeated non-indexed
        // values, so it's not an instance.
        if !instance.is_empty() && (productive || !repeated) {
            instances.push(instance);
        }
        if !productive {
            break;
        }
        if index + 1 == max_instances {
            warn!(
                "Group '{}' stopped at the limit of {} instances",
                group.name, max_instances
            );
        }
    }

    debug!(
        "Group '{}' produced {} instance(s)",
        group.name,
        instances.len()
    );
    instances
}

fn lookup<'a>(
    document: &'a Value,
    group: &str,
    field: &str,
    concrete_path: &str,
) -> Option<&'a Value> {
    match path::evaluate(document, concrete_path) {
        Ok(value) => Some(value),
        Err(e @ path::Error::NotFound { .. }) => {
            trace!("{}.{}: {}", group, field, e);
            None
        }
        Err(e) => {
            warn!("Skipping {}.{}: {}", group, field, e);
            None
        }
    }
}

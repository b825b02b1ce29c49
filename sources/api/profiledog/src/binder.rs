//! Moves REST-backed settings between API documents and the settings tree.
//!
//! Which branch of the tree each descriptor group belongs to is decided by a static table of
//! [`Binding`]s, one table per component.  On export, every group is enumerated against its
//! endpoint's response and the instances placed at the bound branch.  On apply, each bound branch
//! that's present in the candidate tree is written into a request body through the fields' import
//! paths and sent to the data source's import endpoint.

use crate::descriptor::{DataSource, Descriptor, Group};
use crate::enumerate::enumerate_group;
use crate::path::{self, Segment};
use crate::{error, ConfigMap, Result};
use apiclient::ApiClient;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use snafu::ResultExt;

/// How a group's instances map onto its branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// The branch is one object; only the first instance is used.
    Single,
    /// The branch is a list with one entry per instance.
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub group: &'static str,
    pub tree_path: &'static [&'static str],
    pub shape: Shape,
}

/// Bindings for the appliance management component, relative to `ApplianceSettings`.
pub static APPLIANCE_BINDINGS: &[Binding] = &[
    Binding {
        group: "backup_schedules",
        tree_path: &["backup_schedules"],
        shape: Shape::List,
    },
    Binding {
        group: "root_local_account",
        tree_path: &["root_local_account"],
        shape: Shape::Single,
    },
];

/// Bindings for the appliance network component, relative to `ApplianceNetwork`.
pub static NETWORK_BINDINGS: &[Binding] = &[
    Binding {
        group: "firewall_rules",
        tree_path: &["firewall_rule_policies"],
        shape: Shape::List,
    },
    Binding {
        group: "proxy",
        tree_path: &["proxy_configuration"],
        shape: Shape::List,
    },
    Binding {
        group: "dns_servers",
        tree_path: &["dns_server_configuration"],
        shape: Shape::Single,
    },
];

fn binding_for<'a>(bindings: &'a [Binding], group: &str) -> Option<&'a Binding> {
    bindings.iter().find(|b| b.group == group)
}

/// Builds the REST-backed part of a settings tree, as untyped JSON, by reading every data
/// source in `descriptor`.  Each source's endpoint is fetched once.
pub fn export<C>(
    client: &C,
    descriptor: &Descriptor,
    bindings: &[Binding],
    max_instances: usize,
) -> Result<Value>
where
    C: ApiClient + ?Sized,
{
    let mut tree = Value::Object(Map::new());
    for source in &descriptor.sources {
        let uri = &source.export_api.api;
        info!("Exporting from {}", uri);
        let document =
            apiclient::get::get_uri(client, uri).context(error::ApiGetSnafu { uri })?;

        for group in &source.groups {
            let binding = match binding_for(bindings, &group.name) {
                Some(binding) => binding,
                None => {
                    warn!("No binding for group '{}', skipping", group.name);
                    continue;
                }
            };

            let instances = enumerate_group(&document, group, max_instances);
            let branch = match binding.shape {
                Shape::Single => match instances.first() {
                    Some(instance) => instance_to_value(instance),
                    None => continue,
                },
                Shape::List => {
                    if instances.is_empty() {
                        continue;
                    }
                    Value::Array(instances.iter().map(instance_to_value).collect())
                }
            };
            place(&mut tree, binding.tree_path, branch);
        }
    }
    trace!("Exported tree: {}", tree);
    Ok(tree)
}

/// Types an exported tree.  A value the model doesn't accept (a string where a boolean belongs,
/// say) is dropped with a warning, keeping the rest of its branch.
///
/// Each value is checked on its own, so this suits models whose fields are all optional, as the
/// REST-backed branches are.
pub fn into_typed<T>(mut tree: Value) -> Result<T>
where
    T: DeserializeOwned,
{
    if let Err(e) = T::deserialize(&tree) {
        debug!("Exported tree doesn't fit the model as is: {}", e);
        let mut leaves = Vec::new();
        collect_leaves(&tree, &mut Vec::new(), &mut leaves);
        // Removing from the back keeps earlier array positions valid.
        for (segments, value) in leaves.into_iter().rev() {
            if let Err(e) = T::deserialize(&isolate(&segments, value)) {
                warn!(
                    "Dropping exported value at {}: {}",
                    path::segments_to_string(&segments),
                    e
                );
                remove(&mut tree, &segments);
                prune::<T>(&mut tree, &segments);
            }
        }
    }
    serde_json::from_value(tree).context(error::BuildTreeSnafu)
}

// Leaves are scalars, and arrays holding no objects; arrays of objects are list branches.
fn collect_leaves(
    value: &Value,
    prefix: &mut Vec<Segment>,
    leaves: &mut Vec<(Vec<Segment>, Value)>,
) {
    match value {
        Value::Object(map) if map.is_empty() => leaves.push((prefix.clone(), value.clone())),
        Value::Object(map) => {
            for (key, child) in map {
                prefix.push(Segment::Key(key.clone()));
                collect_leaves(child, prefix, leaves);
                prefix.pop();
            }
        }
        Value::Array(items) if items.iter().any(Value::is_object) => {
            for (index, child) in items.iter().enumerate() {
                prefix.push(Segment::Index(index));
                collect_leaves(child, prefix, leaves);
                prefix.pop();
            }
        }
        _ => leaves.push((prefix.clone(), value.clone())),
    }
}

// A tree holding only `value`, with every list position collapsed to the first; list entries
// share one type, so this checks the value on its own.
fn isolate(segments: &[Segment], value: Value) -> Value {
    let collapsed: Vec<Segment> = segments
        .iter()
        .map(|segment| match segment {
            Segment::Index(_) => Segment::Index(0),
            key => key.clone(),
        })
        .collect();
    let mut tree = Value::Null;
    // Writing into an empty tree only ever creates structure, so it can't conflict.
    if path::write_segments(&mut tree, &collapsed, value).is_err() {
        return Value::Null;
    }
    tree
}

// Removes containers left empty by a removal when the model doesn't accept them empty.
fn prune<T>(tree: &mut Value, segments: &[Segment])
where
    T: DeserializeOwned,
{
    for end in (1..segments.len()).rev() {
        let parent = &segments[..end];
        let empty = match lookup_segments(tree, parent) {
            Some(Value::Object(map)) if map.is_empty() => Value::Object(Map::new()),
            Some(Value::Array(items)) if items.is_empty() => Value::Array(Vec::new()),
            _ => return,
        };
        if T::deserialize(&isolate(parent, empty)).is_ok() {
            return;
        }
        remove(tree, parent);
    }
}

fn lookup_segments<'a>(tree: &'a Value, segments: &[Segment]) -> Option<&'a Value> {
    segments.iter().try_fold(tree, |current, segment| match segment {
        Segment::Key(key) => current.get(key.as_str()),
        Segment::Index(index) => current.get(*index),
    })
}

fn remove(tree: &mut Value, segments: &[Segment]) {
    let (last, parents) = match segments.split_last() {
        Some(split) => split,
        None => {
            *tree = Value::Null;
            return;
        }
    };
    let mut current = tree;
    for segment in parents {
        let next = match segment {
            Segment::Key(key) => current.get_mut(key.as_str()),
            Segment::Index(index) => current.get_mut(*index),
        };
        current = match next {
            Some(next) => next,
            None => return,
        };
    }
    match (last, current) {
        (Segment::Key(key), Value::Object(map)) => {
            map.remove(key);
        }
        (Segment::Index(index), Value::Array(items)) if *index < items.len() => {
            items.remove(*index);
        }
        _ => {}
    }
}

/// Writes the bound branches of `tree` through every data source that has an import endpoint.
/// Returns the number of requests sent.  The first failed request aborts the call.
pub fn apply<C>(
    client: &C,
    descriptor: &Descriptor,
    bindings: &[Binding],
    tree: &Value,
) -> Result<usize>
where
    C: ApiClient + ?Sized,
{
    let mut sent = 0;
    for source in &descriptor.sources {
        let import = match &source.import_api {
            Some(import) => import,
            None => {
                debug!("{} has no import endpoint", source.export_api.api);
                continue;
            }
        };

        let body = request_body(source, bindings, tree)?;
        if body.is_null() {
            debug!("Nothing to send to {}", import.api);
            continue;
        }

        let method = import.method.as_str();
        info!("Applying {} {}", method, import.api);
        apiclient::set::send_json(client, &import.api, method, &body).context(
            error::ApiSendSnafu {
                method,
                uri: &import.api,
            },
        )?;
        sent += 1;
    }
    Ok(sent)
}

/// Builds the request body for one data source from the tree; `Null` if the tree holds nothing
/// for any of its groups.
pub fn request_body(source: &DataSource, bindings: &[Binding], tree: &Value) -> Result<Value> {
    let mut body = Value::Null;
    for group in &source.groups {
        let binding = match binding_for(bindings, &group.name) {
            Some(binding) => binding,
            None => {
                warn!("No binding for group '{}', skipping", group.name);
                continue;
            }
        };
        let branch = match lookup(tree, binding.tree_path) {
            Some(branch) => branch,
            None => continue,
        };

        let instances: Vec<&Value> = match (binding.shape, branch) {
            (Shape::Single, _) => vec![branch],
            (Shape::List, Value::Array(items)) => items.iter().collect(),
            (Shape::List, other) => {
                warn!(
                    "Expected a list for group '{}', found {}; skipping",
                    group.name, other
                );
                continue;
            }
        };

        for (index, instance) in instances.into_iter().enumerate() {
            write_instance(&mut body, group, index, instance)?;
        }
    }
    Ok(body)
}

fn write_instance(body: &mut Value, group: &Group, index: usize, instance: &Value) -> Result<()> {
    for field in &group.fields {
        let value = match lookup(instance, &field_segments(&field.name)) {
            Some(value) => value.clone(),
            None => continue,
        };
        let import_path = field.import_path_at(index);
        path::write(body, &import_path, value).context(error::ImportPathSnafu {
            group: &group.name,
            field: &field.name,
        })?;
    }
    Ok(())
}

// Setting names are dotted to reach nested structures, e.g. "recurrence_info.hour".
fn field_segments(name: &str) -> Vec<&str> {
    name.split('.').collect()
}

fn instance_to_value(instance: &ConfigMap) -> Value {
    let mut value = Value::Object(Map::new());
    for (name, field_value) in instance {
        let segments: Vec<Segment> = field_segments(name)
            .into_iter()
            .map(|s| Segment::Key(s.to_string()))
            .collect();
        // Only objects are created along key segments, so this can only conflict when one
        // setting name is a prefix of another ("a" and "a.b").
        if let Err(e) = path::write_segments(&mut value, &segments, field_value.clone()) {
            warn!("Dropping '{}': {}", name, e);
        }
    }
    value
}

/// Places `branch` at `tree_path`, merging into an object already there.
fn place(tree: &mut Value, tree_path: &[&str], branch: Value) {
    match tree_path.split_first() {
        None => match (tree, branch) {
            (Value::Object(existing), Value::Object(new)) => existing.extend(new),
            (tree, branch) => *tree = branch,
        },
        Some((key, rest)) => {
            if !tree.is_object() {
                *tree = Value::Object(Map::new());
            }
            if let Some(map) = tree.as_object_mut() {
                let child = map.entry(key.to_string()).or_insert(Value::Null);
                place(child, rest, branch);
            }
        }
    }
}

fn lookup<'a, S>(tree: &'a Value, tree_path: &[S]) -> Option<&'a Value>
where
    S: AsRef<str>,
{
    let mut current = tree;
    for key in tree_path {
        current = current.get(key.as_ref())?;
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

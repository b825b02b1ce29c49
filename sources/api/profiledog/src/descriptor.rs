//! Descriptors describe where a component's REST-backed settings come from.
//!
//! A descriptor is a JSON document with a `data_source_detail` array.  Each entry names the
//! endpoint to read (and optionally the endpoint and method to write) under the reserved
//! `data_source` key; every other key is a group, mapping setting names to path templates:
//!
//! ```json
//! {
//!   "data_source_detail": [
//!     {
//!       "data_source": {
//!         "export_api": { "api": "/appliance/recovery/backup/schedules" },
//!         "import_api": { "api": "/appliance/recovery/backup/schedules", "method": "PUT" }
//!       },
//!       "backup_schedules": {
//!         "location": { "export_path": "$.value[0].value.location" },
//!         "recurrence_info.hour": {
//!           "export_path": "$.value[0].value.recurrence_info.hour",
//!           "import_path": "$.schedules[0].recurrence_info.hour"
//!         }
//!       }
//!     }
//!   ]
//! }
//! ```
//!
//! Setting names may be dotted to reach into a nested structure of the group.  A template holds at
//! most one `[0]` index placeholder.

use crate::{error, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use snafu::{ensure, ResultExt};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const DATA_SOURCE: &str = "data_source";

/// A parsed descriptor: data sources in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    pub path: PathBuf,
    pub sources: Vec<DataSource>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataSource {
    pub export_api: ExportApi,
    pub import_api: Option<ImportApi>,
    pub groups: Vec<Group>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportApi {
    pub api: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportApi {
    pub api: String,
    #[serde(default)]
    pub method: ImportMethod,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ImportMethod {
    #[default]
    Put,
    Post,
    Patch,
}

impl ImportMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportMethod::Put => "PUT",
            ImportMethod::Post => "POST",
            ImportMethod::Patch => "PATCH",
        }
    }
}

/// A named set of related settings, possibly repeated.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

impl Group {
    /// Whether any field is enumerated by index.
    pub fn is_repeated(&self) -> bool {
        self.fields.iter().any(FieldSpec::is_indexed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub export_path: String,
    pub import_path: Option<String>,
}

impl FieldSpec {
    pub fn is_indexed(&self) -> bool {
        self.export_path.contains(constants::INDEX_PLACEHOLDER)
    }

    /// The export path for instance `index`.
    pub fn export_path_at(&self, index: usize) -> String {
        substitute_index(&self.export_path, index)
    }

    /// The import path for instance `index`; the export path is used when no separate import
    /// path is given.
    pub fn import_path_at(&self, index: usize) -> String {
        substitute_index(
            self.import_path.as_deref().unwrap_or(&self.export_path),
            index,
        )
    }
}

fn substitute_index(template: &str, index: usize) -> String {
    template.replacen(constants::INDEX_PLACEHOLDER, &format!("[{}]", index), 1)
}

#[derive(Deserialize)]
struct RawDescriptor {
    data_source_detail: Vec<Map<String, Value>>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDataSource {
    export_api: ExportApi,
    import_api: Option<ImportApi>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawField {
    export_path: String,
    import_path: Option<String>,
}

impl Descriptor {
    /// Finds the descriptor file named `name` anywhere under `dir` and loads it.
    pub fn find_and_load<P>(dir: P, name: &str) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = find(dir, name)?;
        Self::load(path)
    }

    pub fn load<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        debug!("Loading descriptor {}", path.display());
        let data = fs::read_to_string(path).context(error::DescriptorReadSnafu { path })?;
        Self::from_json(path, &data)
    }

    /// Parses descriptor text; `path` is used for error messages.
    pub fn from_json<P>(path: P, data: &str) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let raw: RawDescriptor =
            serde_json::from_str(data).context(error::DescriptorParseSnafu { path })?;

        let mut sources = Vec::with_capacity(raw.data_source_detail.len());
        for (position, entry) in raw.data_source_detail.into_iter().enumerate() {
            sources.push(parse_source(path, position, entry)?);
        }

        Ok(Self {
            path: path.to_path_buf(),
            sources,
        })
    }
}

fn parse_source(path: &Path, position: usize, entry: Map<String, Value>) -> Result<DataSource> {
    let mut raw_source = None;
    let mut groups = Vec::with_capacity(entry.len());
    for (name, fields) in entry {
        if name == DATA_SOURCE {
            let source: RawDataSource =
                serde_json::from_value(fields).context(error::DescriptorParseSnafu { path })?;
            raw_source = Some(source);
            continue;
        }

        let fields = match fields {
            Value::Object(fields) => fields,
            _ => {
                return Err(shape(
                    path,
                    format!("group '{}' in entry {} is not an object", name, position),
                ))
            }
        };

        let mut specs = Vec::with_capacity(fields.len());
        for (field, spec) in fields {
            let spec: RawField =
                serde_json::from_value(spec).context(error::DescriptorParseSnafu { path })?;
            for template in std::iter::once(&spec.export_path).chain(spec.import_path.as_ref()) {
                ensure!(
                    template.matches(constants::INDEX_PLACEHOLDER).count() <= 1,
                    error::DescriptorShapeSnafu {
                        path,
                        reason: format!(
                            "'{}.{}' has more than one index placeholder in '{}'",
                            name, field, template
                        ),
                    }
                );
            }
            specs.push(FieldSpec {
                name: field,
                export_path: spec.export_path,
                import_path: spec.import_path,
            });
        }
        groups.push(Group {
            name,
            fields: specs,
        });
    }

    let raw_source = raw_source
        .ok_or_else(|| shape(path, format!("entry {} has no '{}'", position, DATA_SOURCE)))?;

    Ok(DataSource {
        export_api: raw_source.export_api,
        import_api: raw_source.import_api,
        groups,
    })
}

fn shape(path: &Path, reason: String) -> error::Error {
    error::Error::DescriptorShape {
        path: path.to_path_buf(),
        reason,
    }
}

/// Searches `dir` recursively for a regular file named `name`.
fn find<P>(dir: P, name: &str) -> Result<PathBuf>
where
    P: AsRef<Path>,
{
    let dir = dir.as_ref();
    let walker = WalkDir::new(dir)
        .follow_links(true)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()));
    for entry in walker {
        let entry = entry.context(error::DescriptorSearchSnafu { dir })?;
        if entry.file_type().is_file() && entry.file_name() == name {
            trace!("Found descriptor {}", entry.path().display());
            return Ok(entry.into_path());
        }
    }
    error::DescriptorNotFoundSnafu { name, dir }.fail()
}

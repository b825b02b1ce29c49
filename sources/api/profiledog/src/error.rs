use snafu::Snafu;
use std::io;
use std::path::PathBuf;

/// Errors that abort a whole export, validate, or apply call.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Failed to read config file {}: {}", path.display(), source))]
    ConfigRead { path: PathBuf, source: io::Error },

    #[snafu(display("Failed to parse config file {}: {}", path.display(), source))]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[snafu(display("Failed to open lock file {}: {}", path.display(), source))]
    LockOpen { path: PathBuf, source: io::Error },

    #[snafu(display("Failed to lock {}: {}", path.display(), source))]
    Lock { path: PathBuf, source: nix::Error },

    #[snafu(display("Descriptor file {} not found under {}", name, dir.display()))]
    DescriptorNotFound { name: String, dir: PathBuf },

    #[snafu(display("Failed to search {} for descriptors: {}", dir.display(), source))]
    DescriptorSearch {
        dir: PathBuf,
        source: walkdir::Error,
    },

    #[snafu(display("Failed to read descriptor {}: {}", path.display(), source))]
    DescriptorRead { path: PathBuf, source: io::Error },

    #[snafu(display("Failed to parse descriptor {}: {}", path.display(), source))]
    DescriptorParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[snafu(display("Invalid descriptor {}: {}", path.display(), reason))]
    DescriptorShape { path: PathBuf, reason: String },

    #[snafu(display("Failed to create API client: {}", source))]
    ClientSetup { source: apiclient::Error },

    #[snafu(display("Failed to fetch '{}': {}", uri, source))]
    ApiGet {
        uri: String,
        #[snafu(source(from(apiclient::get::Error, Box::new)))]
        source: Box<apiclient::get::Error>,
    },

    #[snafu(display("Failed to {} '{}': {}", method, uri, source))]
    ApiSend {
        method: String,
        uri: String,
        #[snafu(source(from(apiclient::set::Error, Box::new)))]
        source: Box<apiclient::set::Error>,
    },

    #[snafu(display("Import path for '{}.{}' is unusable: {}", group, field, source))]
    ImportPath {
        group: String,
        field: String,
        source: crate::path::Error,
    },

    #[snafu(display("Exported values do not form a valid settings tree: {}", source))]
    BuildTree { source: serde_json::Error },

    #[snafu(display("Failed to serialize settings tree: {}", source))]
    SerializeTree { source: serde_json::Error },

    #[snafu(display("Input is not a settings tree: {}", source))]
    InvalidInput { source: serde_json::Error },

    #[snafu(display("Failed to read input from {}: {}", from, source))]
    ReadInput { from: String, source: io::Error },

    #[snafu(display("Input from {} is not JSON: {}", from, source))]
    InputJson {
        from: String,
        source: serde_json::Error,
    },

    #[snafu(display("Failed to write output: {}", source))]
    WriteOutput { source: serde_json::Error },

    #[snafu(display("Logger setup error: {}", source))]
    Logger { source: log::SetLoggerError },
}

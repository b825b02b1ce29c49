/*!
# Background

profiledog reconciles an appliance against a desired-state settings tree.

It offers three operations to an outside orchestrator:

* export: read the current configuration from the management REST API and from the host's
  configuration files, and return it as a settings tree
* validate: check a candidate settings tree against domain rules, returning notifications and an
  assessment of which services would need a restart
* apply: write a settings tree back through the REST API and the host's configuration files

## REST-backed settings

Which endpoints to call, and where each setting lives inside their JSON responses, is described by
a per-component descriptor file (see [`descriptor`]).
Each field's location is a path template; templates containing the `[0]` index placeholder are
enumerated until no further instance is found, which is how repeated structures like backup
schedules are discovered (see [`enumerate`]).
Extracted groups are placed into the tree, and read back out of it on apply, through a static
table of bindings (see [`binder`]).

## Host-backed settings

Settings without a REST equivalent are read and written by dedicated adapters (see [`files`]):
password aging in the shadow file, lockout policy in PAM, NTP servers, sshd enablement, the
sendmail relay, and log forwarding through an external helper.
File writes are atomic; an adapter failure affects only that adapter's settings.

## Concurrency

Calls are synchronous.  Every operation holds an advisory lock file for its duration, so calls
against the same appliance are serialized.
*/

#![deny(rust_2018_idioms)]

#[macro_use]
extern crate log;

pub mod binder;
pub mod command;
pub mod config;
pub mod descriptor;
pub mod enumerate;
pub mod error;
pub mod files;
mod host;
pub mod lock;
pub mod path;
pub mod plugin;
pub mod validate;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// An ordered set of setting names and their values, as produced for one instance of a group, or
/// exchanged with a file adapter.
pub type ConfigMap = indexmap::IndexMap<String, serde_json::Value>;

/*!
# Introduction

profiledog reconciles this appliance against a desired-state settings tree.

Subcommands:
* `export`: prints the current configuration as a settings tree
* `validate`: reads a settings tree and prints the validation result and restart impact
* `apply`: reads a settings tree, applies it, and prints the result

Input is read from stdin unless `--input` is given; it may be the bare tree or wrapped as
`{"appliance": {...}}`.  Results are printed as JSON on stdout and logs go to stderr.

Paths and the API endpoint come from `/etc/profiledog.toml` if it exists; see the `config`
module for the keys.
*/

#![deny(rust_2018_idioms)]

use argh::FromArgs;
use profiledog::config::Config;
use profiledog::plugin::Plugin;
use profiledog::{error, Result};
use serde::Serialize;
use simplelog::{ColorChoice, Config as LogConfig, LevelFilter, TermLogger, TerminalMode};
use snafu::ResultExt;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

/// Exports, validates, or applies the appliance's desired-state configuration.
#[derive(FromArgs, Debug)]
struct Args {
    #[argh(option, default = "LevelFilter::Info")]
    /// filter level for log messages
    log_level: LevelFilter,

    #[argh(option)]
    /// path to the config file (default /etc/profiledog.toml, if present)
    config: Option<PathBuf>,

    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand)]
enum Commands {
    Export(ExportArgs),
    Validate(ValidateArgs),
    Apply(ApplyArgs),
}

/// Print the current configuration as a settings tree.
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "export")]
struct ExportArgs {}

/// Validate a desired-state settings tree.
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "validate")]
struct ValidateArgs {
    #[argh(option)]
    /// file holding the settings tree; stdin if not given
    input: Option<PathBuf>,
}

/// Apply a desired-state settings tree.
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "apply")]
struct ApplyArgs {
    #[argh(option)]
    /// file holding the settings tree; stdin if not given
    input: Option<PathBuf>,
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path),
        None => Config::from_file_or_default(constants::CONFIG_FILE),
    }
}

fn read_input(input: Option<PathBuf>) -> Result<serde_json::Value> {
    let (from, data) = match input {
        Some(path) => {
            let from = path.display().to_string();
            let data = fs::read_to_string(&path).context(error::ReadInputSnafu { from: &from })?;
            (from, data)
        }
        None => {
            let mut data = String::new();
            io::stdin()
                .read_to_string(&mut data)
                .context(error::ReadInputSnafu { from: "stdin" })?;
            ("stdin".to_string(), data)
        }
    };
    serde_json::from_str(&data).context(error::InputJsonSnafu { from })
}

fn print_json<T>(value: &T) -> Result<()>
where
    T: Serialize,
{
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer_pretty(&mut handle, value).context(error::WriteOutputSnafu)?;
    println!();
    Ok(())
}

fn run() -> Result<()> {
    let args: Args = argh::from_env();

    // TerminalMode::Stderr will send all logs to stderr, as stdout carries the JSON result.
    TermLogger::init(
        args.log_level,
        LogConfig::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .context(error::LoggerSnafu)?;

    let config = load_config(args.config)?;
    let plugin = Plugin::from_config(config)?;

    match args.command {
        Commands::Export(_) => print_json(&plugin.get_current_desired_state()?),
        Commands::Validate(validate) => {
            let desired = read_input(validate.input)?;
            print_json(&plugin.validate(&desired)?)
        }
        Commands::Apply(apply) => {
            let desired = read_input(apply.input)?;
            print_json(&plugin.apply(&desired)?)
        }
    }
}

// Returning a Result from main makes it print a Debug representation of the error, but with Snafu
// we have nice Display representations of the error, so we wrap "main" (run) and print any error.
// https://github.com/shepmaster/snafu/issues/110
fn main() {
    if let Err(e) = run() {
        eprintln!("{}", e);
        process::exit(1);
    }
}

//! External commands (systemctl, the log forwarding helper) run through the `CommandRunner` trait
//! so that tests can substitute a fake.

use snafu::{ensure, ResultExt};
use std::process::Command;

mod error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub enum Error {
        #[snafu(display("Failed to execute '{}': {}", command, source))]
        ExecutionFailure {
            command: String,
            source: std::io::Error,
        },

        #[snafu(display("Command '{}' failed - stderr: {}", command, stderr))]
        CommandFailure { command: String, stderr: String },

        #[snafu(display("Command line '{}' is invalid: {}", command, reason))]
        InvalidCommand { command: String, reason: String },
    }
}
pub use error::Error;
pub type Result<T> = std::result::Result<T, error::Error>;

/// What came back from a command that could be started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

pub trait CommandRunner {
    /// Runs `program` with `args` to completion.  Only a failure to start it is an error; the
    /// exit status is reported in the output.
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;
}

/// Runs commands on the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommand;

impl CommandRunner for SystemCommand {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let mut command = Command::new(program);
        command.args(args);
        debug!("Running {:?}", command);
        let output = command.output().context(error::ExecutionFailureSnafu {
            command: display(program, args),
        })?;
        trace!("{:?} exited with {}", command, output.status);

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Runs a command, treating a non-zero exit as an error, and returns its stdout.
pub fn run_checked<R>(runner: &R, program: &str, args: &[&str]) -> Result<String>
where
    R: CommandRunner + ?Sized,
{
    let output = runner.run(program, args)?;
    ensure!(
        output.success,
        error::CommandFailureSnafu {
            command: display(program, args),
            stderr: output.stderr.trim(),
        }
    );
    Ok(output.stdout)
}

/// Splits a configured command line like "python /path/helper.py" into a program and its
/// leading arguments, using shell quoting rules.
pub fn split_command_line(command_line: &str) -> Result<(String, Vec<String>)> {
    let mut words =
        shell_words::split(command_line).map_err(|e| error::Error::InvalidCommand {
            command: command_line.to_string(),
            reason: e.to_string(),
        })?;
    ensure!(
        !words.is_empty(),
        error::InvalidCommandSnafu {
            command: command_line,
            reason: "empty",
        }
    );
    let program = words.remove(0);
    Ok((program, words))
}

fn display(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

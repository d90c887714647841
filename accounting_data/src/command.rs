//! Everything that leaves the process goes through [`SlurmQuery`].
//!
//! The real implementation shells out to the Slurm command line tools, [`CannedQuery`] hands out
//! fixed output so parsing and arithmetic can be tested on machines without Slurm.

use std::{
    cell::RefCell,
    fmt,
    io::{self, Write},
    iter,
    process::Command,
};

use itertools::Itertools as _;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::config::Commands;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Program {
    Sacct,
    Sacctmgr,
    Sreport,
    Scontrol,
}

impl Program {
    pub fn default_name(self) -> &'static str {
        match self {
            Program::Sacct => "sacct",
            Program::Sacctmgr => "sacctmgr",
            Program::Sreport => "sreport",
            Program::Scontrol => "scontrol",
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("could not run `{command}`: {reason}")]
    Spawn { command: String, reason: String },
    #[error("`{command}` failed with status {code:?}: {stderr}")]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("`{command}` returned no output")]
    Empty { command: String },
}

pub trait SlurmQuery {
    /// Runs `program` with `args` and returns its trimmed stdout.
    ///
    /// Empty output is an error ([`CommandError::Empty`]), so callers only ever see data.
    fn run(&self, program: Program, args: &[String]) -> Result<String, CommandError>;
}

impl<T: SlurmQuery + ?Sized> SlurmQuery for &T {
    fn run(&self, program: Program, args: &[String]) -> Result<String, CommandError> {
        (**self).run(program, args)
    }
}

/// Shell-like rendering, quoting arguments that contain whitespace.
pub fn render_command(program: &str, args: &[String]) -> String {
    iter::once(program.to_owned())
        .chain(args.iter().map(|arg| {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                format!("'{arg}'")
            } else {
                arg.clone()
            }
        }))
        .join(" ")
}

/// Builds an owned argument list from string literals and `format!`ed values alike.
#[macro_export]
macro_rules! args {
    ($($arg:expr),* $(,)?) => {
        vec![$(::std::string::String::from($arg)),*]
    };
}

pub struct SystemCommand {
    commands: Commands,
    echo: Option<RefCell<Box<dyn Write>>>,
}

impl SystemCommand {
    /// `echo`: print every command line to stdout before running it.
    pub fn new(commands: Commands, echo: bool) -> Self {
        let echo = echo.then(|| RefCell::new(Box::new(io::stdout()) as Box<dyn Write>));
        Self { commands, echo }
    }

    /// Echoes every command line as `$ <command>` to `out` instead of stdout.
    pub fn echoing_to(commands: Commands, out: impl Write + 'static) -> Self {
        Self {
            commands,
            echo: Some(RefCell::new(Box::new(out))),
        }
    }

    fn echo(&self, command: &str) {
        let Some(out) = &self.echo else {
            return;
        };
        let mut out = out.borrow_mut();
        if let Err(e) = writeln!(out, "$ {command}").and_then(|()| out.flush()) {
            warn!(command, "could not echo command: {e}");
        }
    }
}

impl fmt::Debug for SystemCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemCommand")
            .field("commands", &self.commands)
            .field("echo", &self.echo.is_some())
            .finish()
    }
}

impl SlurmQuery for SystemCommand {
    fn run(&self, program: Program, args: &[String]) -> Result<String, CommandError> {
        let executable = self.commands.path(program);
        let command = render_command(executable, args);
        self.echo(&command);
        debug!(%command, "running");

        let output = Command::new(executable).args(args).output().map_err(|e| CommandError::Spawn {
            command: command.clone(),
            reason: e.to_string(),
        })?;

        if !output.status.success() {
            return Err(CommandError::Failed {
                command,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        trace!(%command, %stdout);
        if stdout.is_empty() {
            return Err(CommandError::Empty { command });
        }
        Ok(stdout)
    }
}

/// Answers queries from a list of `(program, needle, response)` rules.
///
/// A rule matches when the program is the same and the space-joined arguments contain the needle;
/// the first matching rule wins. Unmatched queries fail like a command with exit status 1.
#[derive(Debug, Default)]
pub struct CannedQuery {
    rules: Vec<(Program, String, Result<String, CommandError>)>,
    calls: RefCell<Vec<String>>,
}

impl CannedQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, program: Program, needle: &str, stdout: &str) -> Self {
        self.rules.push((program, needle.to_owned(), Ok(stdout.to_owned())));
        self
    }

    pub fn fail(mut self, program: Program, needle: &str, code: i32) -> Self {
        let error = CommandError::Failed {
            command: format!("{program} (canned)"),
            code: Some(code),
            stderr: "canned failure".to_owned(),
        };
        self.rules.push((program, needle.to_owned(), Err(error)));
        self
    }

    /// Every command line seen so far, rendered with the default program names.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl SlurmQuery for CannedQuery {
    fn run(&self, program: Program, args: &[String]) -> Result<String, CommandError> {
        let command = render_command(program.default_name(), args);
        self.calls.borrow_mut().push(command.clone());

        let joined = args.join(" ");
        let response = self
            .rules
            .iter()
            .find(|(p, needle, _)| *p == program && joined.contains(needle.as_str()))
            .map(|(_, _, response)| response.clone())
            .unwrap_or_else(|| {
                Err(CommandError::Failed {
                    command: command.clone(),
                    code: Some(1),
                    stderr: "no canned response".to_owned(),
                })
            })?;

        let stdout = response.trim().to_owned();
        if stdout.is_empty() {
            return Err(CommandError::Empty { command });
        }
        Ok(stdout)
    }
}

use crate::env::ShellState;
use anyhow::Result;
use std::io::Write;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
pub type ExitCode = i32;

/// Output of a single command, buffered until it is written to its destinations.
///
/// A fresh outcome is produced for every command line and dropped after flushing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: ExitCode,
}

impl CommandOutcome {
    /// Runs `command` with in-memory standard output and standard error.
    ///
    /// An `Err` means the command could not run at all (bad arguments, a program that
    /// failed to start). A command that ran and reported failure yields `Ok` with a
    /// non-zero `exit_code`.
    pub fn capture(command: Box<dyn ExecutableCommand>, state: &mut ShellState) -> Result<Self> {
        let mut outcome = CommandOutcome::default();
        let exit_code = command.execute(&mut outcome.stdout, &mut outcome.stderr, state)?;
        outcome.exit_code = exit_code;
        Ok(outcome)
    }
}

#[cfg(test)]
impl CommandOutcome {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Object-safe trait for any command that can be executed by the shell.
///
/// This is implemented by built-ins via a blanket impl and by external commands.
pub trait ExecutableCommand {
    /// Executes the command, writing its output to `stdout` and `stderr`.
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        state: &mut ShellState,
    ) -> Result<ExitCode>;
}

/// Creates ready-to-run commands for one built-in name.
pub trait CommandFactory {
    /// Name the command is invoked by.
    fn name(&self) -> &'static str;

    /// Builds a command from its arguments (the command name excluded).
    ///
    /// Argument errors are not reported here; the returned command fails when executed.
    fn create(&self, args: &[&str]) -> Box<dyn ExecutableCommand>;
}

use crate::builtin::BuiltinRegistry;
use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::env::ShellState;
use anyhow::Result;
use log::{debug, trace};
use std::fs::{self, Metadata};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

/// What a command name refers to.
pub enum Resolution<'a> {
    Builtin(&'a dyn CommandFactory),
    /// An executable file, with the path it was found at.
    External(PathBuf),
    NotFound,
}

/// Classify a command name.
///
/// Behavior:
/// - A registered builtin always wins, even over an executable of the same name.
/// - A name containing `/` is a path (relative to `current_dir` unless absolute) and
///   resolves if that file is executable.
/// - Any other name is looked up in `search_path` with [`find_in_search_path`].
///
/// Nothing is cached; every call looks at the filesystem again.
pub fn resolve<'a>(
    name: &str,
    builtins: &'a BuiltinRegistry,
    search_path: &[PathBuf],
    current_dir: &Path,
) -> Resolution<'a> {
    if let Some(factory) = builtins.get(name) {
        return Resolution::Builtin(factory);
    }

    let found = if name.contains('/') {
        find_by_path(&current_dir.join(name))
    } else {
        find_in_search_path(name, search_path)
    };

    match found {
        Some(path) => Resolution::External(path),
        None => Resolution::NotFound,
    }
}

/// Scan `search_path` folders in order for an executable entry called `name`.
///
/// Within a folder, entries are visited in the order the filesystem lists them. An
/// entry qualifies when its name matches exactly and any execute bit is set. Folders
/// that cannot be read are skipped.
pub fn find_in_search_path(name: &str, search_path: &[PathBuf]) -> Option<PathBuf> {
    search_path.iter().find_map(|dir| find_in_dir(dir, name))
}

fn find_in_dir(dir: &Path, name: &str) -> Option<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            trace!("skipping search folder {}: {}", dir.display(), e);
            return None;
        }
    };
    entries
        .flatten()
        .filter(|entry| entry.file_name() == name)
        .map(|entry| entry.path())
        .find(|path| fs::metadata(path).is_ok_and(|meta| is_executable(&meta)))
}

fn find_by_path(path: &Path) -> Option<PathBuf> {
    match fs::metadata(path) {
        Ok(meta) if is_executable(&meta) => Some(path.to_path_buf()),
        _ => None,
    }
}

#[cfg(unix)]
fn is_executable(meta: &Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(meta: &Metadata) -> bool {
    meta.is_file()
}

/// Command that is not a builtin.
pub struct ExternalCommand {
    name: String,
    program: PathBuf,
    args: Vec<String>,
}

impl ExternalCommand {
    /// `name` is what the user typed and becomes the child's `argv[0]`; `program` is
    /// the resolved executable.
    pub fn new(name: impl Into<String>, program: PathBuf, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            program,
            args,
        }
    }
}

impl ExecutableCommand for ExternalCommand {
    /// Runs the program to completion in the shell's working directory, capturing both
    /// output streams. A non-zero exit is reported through the exit code; only a
    /// failure to start the program is an error.
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        state: &mut ShellState,
    ) -> Result<ExitCode> {
        let mut cmd = std::process::Command::new(&self.program);
        cmd.args(&self.args)
            .envs(state.vars.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(&state.current_dir);
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.arg0(&self.name);
        }

        let output = cmd.output()?;
        stdout.write_all(&output.stdout)?;
        stderr.write_all(&output.stderr)?;

        let code = match output.status.code() {
            Some(x) => x,
            None => terminated_by_signal(output.status),
        };
        debug!("{} exited with {}", self.program.display(), code);
        Ok(code)
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    -1
}

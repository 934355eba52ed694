use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::env::ShellState;
use crate::external::Resolution;
use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Component, Path, PathBuf};

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process. They write into the same buffers an
/// external command's output is captured into, so redirection treats both alike.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// Executes the command using provided output streams and shell state.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(
        self,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        state: &mut ShellState,
    ) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        state: &mut ShellState,
    ) -> Result<ExitCode> {
        <T as BuiltinCommand>::execute(*self, stdout, stderr, state)
    }
}

/// Stand-in for a builtin whose arguments did not parse.
///
/// `--help` is not an error: its usage text becomes ordinary output.
struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        _state: &mut ShellState,
    ) -> Result<ExitCode> {
        if self.is_error {
            return Err(anyhow::anyhow!("{}", self.output.trim_end()));
        }
        stdout.write_all(self.output.as_bytes())?;
        Ok(0)
    }
}

/// Adapts a [`BuiltinCommand`] type to the object-safe [`CommandFactory`].
pub(crate) struct Factory<T> {
    _phantom: PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn name(&self) -> &'static str {
        T::name()
    }

    fn create(&self, args: &[&str]) -> Box<dyn ExecutableCommand> {
        match T::from_args(&[T::name()], args) {
            Ok(cmd) => Box::new(cmd),
            Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                output,
                is_error: status.is_err(),
            }),
        }
    }
}

/// The set of built-in commands, keyed by name.
pub struct BuiltinRegistry {
    commands: BTreeMap<&'static str, Box<dyn CommandFactory>>,
}

impl BuiltinRegistry {
    /// A registry without any commands.
    pub fn empty() -> Self {
        Self {
            commands: BTreeMap::new(),
        }
    }

    /// Adds `factory`, replacing any builtin registered under the same name.
    pub fn register(&mut self, factory: Box<dyn CommandFactory>) {
        self.commands.insert(factory.name(), factory);
    }

    pub fn get(&self, name: &str) -> Option<&dyn CommandFactory> {
        self.commands.get(name).map(|factory| factory.as_ref())
    }

    /// Registered names in alphabetical order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.commands.keys().copied()
    }
}

impl Default for BuiltinRegistry {
    /// The shell's builtins: `cd`, `echo`, `exit`, `pwd` and `type`.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(Factory::<Exit>::default()));
        registry.register(Box::new(Factory::<Echo>::default()));
        registry.register(Box::new(Factory::<Type>::default()));
        registry.register(Box::new(Factory::<Pwd>::default()));
        registry.register(Box::new(Factory::<Cd>::default()));
        registry
    }
}

impl fmt::Debug for BuiltinRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

#[derive(FromArgs)]
/// Exit the shell with the given status.
pub struct Exit {
    #[argh(positional)]
    /// status the shell process exits with.
    pub code: ExitCode,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(
        self,
        _stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        state: &mut ShellState,
    ) -> Result<ExitCode> {
        state.pending_exit = Some(self.code);
        Ok(self.code)
    }
}

/// Write the arguments to standard output, separated by single spaces and followed
/// by a newline.
///
/// Every argument is printed verbatim, including ones that look like flags, so this
/// builtin implements `FromArgs` by hand instead of deriving it.
pub struct Echo {
    pub args: Vec<String>,
}

impl FromArgs for Echo {
    fn from_args(_command_name: &[&str], args: &[&str]) -> Result<Self, EarlyExit> {
        Ok(Echo {
            args: args.iter().map(|arg| arg.to_string()).collect(),
        })
    }
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        _state: &mut ShellState,
    ) -> Result<ExitCode> {
        writeln!(stdout, "{}", self.args.join(" "))?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Tell whether a name is a builtin or an external program.
pub struct Type {
    #[argh(positional)]
    /// command name to look up.
    pub name: String,
}

impl BuiltinCommand for Type {
    fn name() -> &'static str {
        "type"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        state: &mut ShellState,
    ) -> Result<ExitCode> {
        match state.resolve(&self.name) {
            Resolution::Builtin(_) => writeln!(stdout, "{} is a shell builtin", self.name)?,
            Resolution::External(path) => writeln!(stdout, "{} is {}", self.name, path.display())?,
            Resolution::NotFound => {
                writeln!(stderr, "{}: not found", self.name)?;
                return Ok(1);
            }
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        state: &mut ShellState,
    ) -> Result<ExitCode> {
        writeln!(stdout, "{}", state.current_dir.display())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; a leading `~` stands for $HOME, relative paths start
    /// from the current directory.
    pub target: String,
}

impl Cd {
    /// The absolute, lexically normalized destination.
    fn destination(&self, state: &ShellState) -> Result<PathBuf> {
        let path = match self.target.strip_prefix('~') {
            Some(rest) => {
                let mut expanded = state
                    .home_dir()
                    .context("cd: HOME not set")?
                    .into_os_string();
                expanded.push(rest);
                PathBuf::from(expanded)
            }
            None => state.current_dir.join(&self.target),
        };
        Ok(normalize(&path))
    }
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(
        self,
        _stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        state: &mut ShellState,
    ) -> Result<ExitCode> {
        let destination = self.destination(state)?;
        match fs::metadata(&destination) {
            Ok(meta) if meta.is_dir() => {
                state.set_var("PWD", destination.to_string_lossy().into_owned());
                state.current_dir = destination;
                Ok(0)
            }
            Ok(_) => {
                writeln!(stderr, "cd: {}: Not a directory", destination.display())?;
                Ok(1)
            }
            Err(_) => {
                writeln!(
                    stderr,
                    "cd: {}: No such file or directory",
                    destination.display()
                )?;
                Ok(1)
            }
        }
    }
}

/// Resolve `.` and `..` components without touching the filesystem.
///
/// Symlinks are kept as written, so `pwd` shows the path the user navigated by.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

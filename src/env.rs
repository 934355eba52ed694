use crate::builtin::BuiltinRegistry;
use crate::command::ExitCode;
use crate::external::{self, Resolution};
use std::collections::HashMap;
use std::env as stdenv;
use std::path::PathBuf;

/// State that lives for the whole interpreter session.
///
/// The state contains:
/// - `builtins`: the commands implemented inside the shell.
/// - `search_path`: folders scanned for external programs, taken from `PATH` at startup.
/// - `current_dir`: the shell's working directory. Only `cd` changes it; the process
///   working directory is left alone and child processes are started in this one.
/// - `vars`: environment variables passed to child processes.
/// - `pending_exit`: set by `exit`; the read loop stops once the line has been flushed.
#[derive(Debug)]
pub struct ShellState {
    pub builtins: BuiltinRegistry,
    pub search_path: Vec<PathBuf>,
    pub current_dir: PathBuf,
    pub vars: HashMap<String, String>,
    pub pending_exit: Option<ExitCode>,
}

impl ShellState {
    /// Capture the current process state into a new `ShellState`.
    ///
    /// `PATH` is read once here; an unset or empty `PATH` gives an empty search path.
    pub fn new() -> Self {
        let vars: HashMap<String, String> = stdenv::vars().collect();
        let search_path = vars
            .get("PATH")
            .map(|value| parse_search_path(value))
            .unwrap_or_default();
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            builtins: BuiltinRegistry::default(),
            search_path,
            current_dir,
            vars,
            pending_exit: None,
        }
    }

    /// Get the value of an environment variable.
    ///
    /// Looks up the key in `self.vars` first, falling back to `std::env::var`.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .cloned()
            .or_else(|| stdenv::var(key).ok())
    }

    /// Set or override an environment variable in `self.vars`.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// The user's home directory from `HOME`, if set and non-empty.
    pub fn home_dir(&self) -> Option<PathBuf> {
        self.get_var("HOME")
            .filter(|home| !home.is_empty())
            .map(PathBuf::from)
    }

    /// Classify `name` as a built-in, an external program or unknown.
    pub fn resolve(&self, name: &str) -> Resolution<'_> {
        external::resolve(name, &self.builtins, &self.search_path, &self.current_dir)
    }
}

impl Default for ShellState {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a `PATH`-style value into folders, skipping empty entries.
pub fn parse_search_path(value: &str) -> Vec<PathBuf> {
    stdenv::split_paths(value)
        .filter(|dir| !dir.as_os_str().is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_set_and_get_var() {
        let mut state = ShellState::new();
        state.vars.clear();

        assert_eq!(state.get_var("SOME_RANDOM_ENV_VAR_12345"), None);

        state.set_var("KEY", "VALUE");

        assert_eq!(state.get_var("KEY"), Some("VALUE".to_string()));
    }

    #[test]
    fn test_home_dir_ignores_empty_value() {
        let mut state = ShellState::new();
        state.set_var("HOME", "/home/someone");
        assert_eq!(state.home_dir(), Some(PathBuf::from("/home/someone")));

        state.set_var("HOME", "");
        assert_eq!(state.home_dir(), None);
    }

    #[test]
    #[cfg(unix)]
    fn test_parse_search_path_keeps_order() {
        assert_eq!(
            parse_search_path("/usr/local/bin:/usr/bin::/bin"),
            vec![
                PathBuf::from("/usr/local/bin"),
                PathBuf::from("/usr/bin"),
                PathBuf::from("/bin"),
            ]
        );
    }

    #[test]
    fn test_parse_search_path_empty_value() {
        assert!(parse_search_path("").is_empty());
    }

    #[test]
    fn test_new_state_starts_without_pending_exit() {
        let state = ShellState::new();
        assert_eq!(state.pending_exit, None);
        assert!(state.current_dir.is_absolute());
    }
}

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Embedded default configuration.
const DEFAULT_CONFIG: &str = include_str!("../config.default.toml");

// ── Final (merged) config types ──

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub settings: Settings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Settings {
    pub prompt: String,
    /// Where line-editor history is persisted; empty keeps it in memory.
    pub history_file: String,
    pub history_size: usize,
    /// Terminate the shell, instead of skipping the line, when a redirection target
    /// cannot be opened.
    pub fatal_redirect_errors: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `off`, `error`, `warn`, `info`, `debug` or `trace`.
    pub level: String,
    /// Log file; empty logs to stderr.
    pub file: String,
}

// ── Overlay types (user config that merges with defaults) ──

#[derive(Debug, Deserialize, Default)]
struct ConfigOverlay {
    #[serde(default)]
    settings: SettingsOverlay,
    #[serde(default)]
    logging: LoggingOverlay,
}

#[derive(Debug, Deserialize, Default)]
struct SettingsOverlay {
    prompt: Option<String>,
    history_file: Option<String>,
    history_size: Option<usize>,
    fatal_redirect_errors: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct LoggingOverlay {
    level: Option<String>,
    file: Option<String>,
}

impl Config {
    /// Load the default embedded configuration.
    pub fn default_config() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("embedded default config must parse")
    }

    /// Load configuration with resolution order:
    /// 1. Start with embedded defaults
    /// 2. Merge the overlay from `explicit` if given, else from
    ///    ~/.config/myshell/config.toml (if it exists)
    ///
    /// A missing or malformed explicit file is an error. Problems with the file in the
    /// home directory are reported and the defaults are used.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = Self::default_config();
        match explicit {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("cannot read config file {}", path.display()))?;
                let overlay = toml::from_str(&content)
                    .with_context(|| format!("invalid config file {}", path.display()))?;
                config.apply_overlay(overlay);
            }
            None => {
                if let Some(overlay) = Self::load_user_overlay() {
                    config.apply_overlay(overlay);
                }
            }
        }
        Ok(config)
    }

    /// Defaults merged with the overlay in `toml_str`.
    pub fn from_overlay_str(toml_str: &str) -> Result<Self> {
        let overlay = toml::from_str(toml_str).context("invalid config")?;
        let mut config = Self::default_config();
        config.apply_overlay(overlay);
        Ok(config)
    }

    fn user_config_path() -> Option<PathBuf> {
        let home = std::env::var_os("HOME")?;
        Some(Path::new(&home).join(".config/myshell/config.toml"))
    }

    fn load_user_overlay() -> Option<ConfigOverlay> {
        let path = Self::user_config_path()?;
        let content = std::fs::read_to_string(&path).ok()?;
        match toml::from_str(&content) {
            Ok(overlay) => Some(overlay),
            Err(e) => {
                eprintln!("myshell: config parse error in {}: {e}", path.display());
                None
            }
        }
    }

    /// Apply an overlay on top of this config. Present keys override.
    fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        let s = overlay.settings;
        if let Some(v) = s.prompt {
            self.settings.prompt = v;
        }
        if let Some(v) = s.history_file {
            self.settings.history_file = v;
        }
        if let Some(v) = s.history_size {
            self.settings.history_size = v;
        }
        if let Some(v) = s.fatal_redirect_errors {
            self.settings.fatal_redirect_errors = v;
        }

        let l = overlay.logging;
        if let Some(v) = l.level {
            self.logging.level = v;
        }
        if let Some(v) = l.file {
            self.logging.file = v;
        }
    }
}

impl Settings {
    pub fn history_path(&self) -> Option<PathBuf> {
        expand_home(&self.history_file)
    }
}

impl LoggingConfig {
    pub fn file_path(&self) -> Option<PathBuf> {
        expand_home(&self.file)
    }
}

/// Turns a configured path into a `PathBuf`, expanding a leading `~` to `$HOME`.
/// Empty values mean "not configured".
fn expand_home(value: &str) -> Option<PathBuf> {
    if value.is_empty() {
        return None;
    }
    expand_home_with(value, std::env::var_os("HOME").as_deref().map(Path::new))
        .or_else(|| Some(PathBuf::from(value)))
}

/// `~` and `~/rest` relative to `home`; `None` for anything else or without a home.
fn expand_home_with(value: &str, home: Option<&Path>) -> Option<PathBuf> {
    let home = home?;
    if value == "~" {
        return Some(home.to_path_buf());
    }
    value.strip_prefix("~/").map(|rest| home.join(rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        let config = Config::default_config();
        assert_eq!(config.settings.prompt, "$ ");
        assert_eq!(config.settings.history_size, 1000);
        assert!(!config.settings.fatal_redirect_errors);
        assert_eq!(config.settings.history_path(), None);
        assert_eq!(config.logging.level, "off");
        assert_eq!(config.logging.file_path(), None);
    }

    #[test]
    fn empty_overlay_keeps_defaults() {
        assert_eq!(Config::from_overlay_str("").unwrap(), Config::default_config());
    }

    #[test]
    fn overlay_overrides_present_keys_only() {
        let config = Config::from_overlay_str(
            r#"
            [settings]
            prompt = "> "
            fatal_redirect_errors = true

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.settings.prompt, "> ");
        assert!(config.settings.fatal_redirect_errors);
        assert_eq!(config.settings.history_size, 1000);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.file, "");
    }

    #[test]
    fn overlay_type_errors_are_reported() {
        assert!(Config::from_overlay_str("[settings]\nhistory_size = \"many\"").is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = Config::load(Some(Path::new("/no/such/myshell/config.toml"))).unwrap_err();
        assert!(err.to_string().contains("cannot read config file"));
    }

    #[test]
    fn explicit_file_is_merged() {
        let path = std::env::temp_dir().join(format!("myshell_config_{}.toml", std::process::id()));
        std::fs::write(&path, "[settings]\nhistory_size = 5\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.settings.history_size, 5);
        assert_eq!(config.settings.prompt, "$ ");
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn expand_home_handles_plain_and_empty_values() {
        assert_eq!(expand_home(""), None);
        assert_eq!(expand_home("/var/log/x"), Some(PathBuf::from("/var/log/x")));
        assert_eq!(expand_home("relative"), Some(PathBuf::from("relative")));
    }

    #[test]
    fn tilde_expands_to_home() {
        let home = Path::new("/home/someone");
        assert_eq!(expand_home_with("~", Some(home)), Some(home.to_path_buf()));
        assert_eq!(
            expand_home_with("~/.myshell_history", Some(home)),
            Some(home.join(".myshell_history"))
        );
        assert_eq!(expand_home_with("~other/x", Some(home)), None);
        assert_eq!(expand_home_with("~", None), None);
    }
}

use crate::config::LoggingConfig;
use anyhow::{Context, Result};
use log::LevelFilter;
use simplelog::{ColorChoice, TermLogger, TerminalMode, WriteLogger};
use std::fs::OpenOptions;

/// Environment variable that overrides the configured log level.
pub const LOG_ENV_VAR: &str = "MYSHELL_LOG";

/// Picks the log level: `cli` first, then `MYSHELL_LOG`, then the config file.
pub fn effective_level(config: &LoggingConfig, cli: Option<LevelFilter>) -> Result<LevelFilter> {
    if let Some(level) = cli {
        return Ok(level);
    }
    if let Ok(value) = std::env::var(LOG_ENV_VAR) {
        return value
            .parse()
            .with_context(|| format!("invalid {LOG_ENV_VAR} value '{value}'"));
    }
    config
        .level
        .parse()
        .with_context(|| format!("invalid logging level '{}'", config.level))
}

/// Installs the global logger.
///
/// Logs go to the configured file when there is one and to stderr otherwise. Nothing
/// is installed when the level is `off`, keeping command output free of diagnostics.
pub fn init(config: &LoggingConfig, cli: Option<LevelFilter>) -> Result<()> {
    let level = effective_level(config, cli)?;
    if level == LevelFilter::Off {
        return Ok(());
    }

    let log_config = simplelog::Config::default();
    match config.file_path() {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            WriteLogger::init(level, log_config, file)?;
        }
        None => {
            TermLogger::init(level, log_config, TerminalMode::Stderr, ColorChoice::Auto)?;
        }
    }
    Ok(())
}

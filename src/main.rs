use anyhow::Result;
use argh::FromArgs;
use log::{LevelFilter, info};
use myshell::Interpreter;
use myshell::command::ExitCode;
use myshell::config::Config;
use myshell::io_adapters::{EditorReader, LineReader, PipedReader};
use std::io::{self, IsTerminal};
use std::path::PathBuf;

#[derive(FromArgs)]
/// A small interactive shell.
struct Args {
    /// configuration file to use instead of ~/.config/myshell/config.toml
    #[argh(option)]
    config: Option<PathBuf>,

    /// log level (off, error, warn, info, debug, trace); overrides MYSHELL_LOG
    #[argh(option)]
    log_level: Option<LevelFilter>,
}

fn run(args: Args) -> Result<ExitCode> {
    let config = Config::load(args.config.as_deref())?;
    myshell::logging::init(&config.logging, args.log_level)?;
    info!("starting with {:?}", config.settings);

    let mut sh = Interpreter::with_settings(&config.settings);
    let mut reader: Box<dyn LineReader> = if io::stdin().is_terminal() {
        Box::new(EditorReader::new(
            config.settings.history_size,
            config.settings.history_path(),
        )?)
    } else {
        Box::new(PipedReader::new(io::stdin().lock(), io::stdout()))
    };
    let code = sh.repl(reader.as_mut())?;
    info!("exiting with {code}");
    Ok(code)
}

fn main() {
    let args: Args = argh::from_env();
    // `run` returns before exiting so the line editor saves its history.
    let code = match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("myshell: {e:#}");
            1
        }
    };
    std::process::exit(code);
}

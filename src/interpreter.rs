use crate::command::{CommandOutcome, ExecutableCommand, ExitCode};
use crate::config::Settings;
use crate::env::ShellState;
use crate::external::{ExternalCommand, Resolution};
use crate::io_adapters::{Destinations, LineReader, ReadOutcome};
use crate::lexer;
use crate::parser::{self, RedirectStream};
use anyhow::{Context, Result};
use log::{debug, error, warn};
use std::io::{self, Write};

/// What the read loop should do after a line has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStatus {
    Continue,
    /// `exit` was run; stop with this code.
    Exit(ExitCode),
}

/// A minimal interactive shell.
///
/// Each line goes through the same steps: split into words, cut off the redirections,
/// resolve the command name, run the command with its output captured, and flush the
/// captured output to the terminal or the redirection files.
///
/// Example
/// ```
/// use myshell::{Interpreter, LineStatus};
/// let mut sh = Interpreter::default();
/// let mut out = Vec::new();
/// let mut err = Vec::new();
/// let status = sh
///     .run_line_with_terminal("echo 'hello   world'", &mut out, &mut err)
///     .unwrap();
/// assert_eq!(status, LineStatus::Continue);
/// assert_eq!(out, b"hello   world\n");
/// ```
pub struct Interpreter {
    state: ShellState,
    prompt: String,
    fatal_redirect_errors: bool,
}

impl Interpreter {
    /// Create an interpreter over `state` with the default prompt.
    pub fn new(state: ShellState) -> Self {
        Self {
            state,
            prompt: "$ ".to_string(),
            fatal_redirect_errors: false,
        }
    }

    /// Create an interpreter for the current process using configured settings.
    pub fn with_settings(settings: &Settings) -> Self {
        Self {
            state: ShellState::new(),
            prompt: settings.prompt.clone(),
            fatal_redirect_errors: settings.fatal_redirect_errors,
        }
    }

    pub fn state(&self) -> &ShellState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ShellState {
        &mut self.state
    }

    /// Run one input line against the process's standard output and error.
    pub fn run_line(&mut self, line: &str) -> Result<LineStatus> {
        let stdout = io::stdout();
        let stderr = io::stderr();
        self.run_line_with_terminal(line, &mut stdout.lock(), &mut stderr.lock())
    }

    /// Run one input line, using `terminal_out` and `terminal_err` as the terminal.
    ///
    /// Problems with the line itself (unknown command, bad arguments, a program that
    /// cannot start, an unopenable redirection target) are printed to `terminal_out`
    /// and the result is [`LineStatus::Continue`]. An `Err` is returned only for a
    /// redirection failure when `fatal_redirect_errors` is set, or when the terminal
    /// itself cannot be written.
    pub fn run_line_with_terminal(
        &mut self,
        line: &str,
        terminal_out: &mut dyn Write,
        terminal_err: &mut dyn Write,
    ) -> Result<LineStatus> {
        let words = lexer::split_into_tokens(line);
        if words.is_empty() {
            return Ok(LineStatus::Continue);
        }
        debug!("words: {:?}", words);

        let plan = match parser::plan(words) {
            Ok(plan) => plan,
            Err(e) => {
                writeln!(terminal_out, "{e}")?;
                return Ok(LineStatus::Continue);
            }
        };

        debug!(
            "stdout to {:?}, stderr to {:?}",
            plan.redirection(RedirectStream::Stdout).map(|r| &r.target),
            plan.redirection(RedirectStream::Stderr).map(|r| &r.target),
        );

        let mut destinations = match Destinations::open(&plan.redirections, &self.state.current_dir)
        {
            Ok(destinations) => destinations,
            Err(e) if self.fatal_redirect_errors => {
                error!("cannot open redirection target: {e:#}");
                return Err(e);
            }
            Err(e) => {
                warn!("cannot open redirection target: {e:#}");
                writeln!(terminal_out, "{e:#}")?;
                return Ok(LineStatus::Continue);
            }
        };

        let Some(name) = plan.name() else {
            return Ok(LineStatus::Continue);
        };
        let args = plan.args();
        let (label, command): (String, Box<dyn ExecutableCommand>) = match self.state.resolve(name)
        {
            Resolution::Builtin(factory) => {
                debug!("{name} is a builtin");
                let args: Vec<&str> = args.iter().map(String::as_str).collect();
                (format!("command {name}"), factory.create(&args))
            }
            Resolution::External(path) => {
                debug!("{name} resolved to {}", path.display());
                let label = format!("external command {}", path.display());
                let command: Box<dyn ExecutableCommand> =
                    Box::new(ExternalCommand::new(name, path, args.to_vec()));
                (label, command)
            }
            Resolution::NotFound => {
                debug!("{name} not found");
                writeln!(terminal_out, "{name}: command not found")?;
                return Ok(LineStatus::Continue);
            }
        };

        match CommandOutcome::capture(command, &mut self.state) {
            Ok(outcome) => flush(&outcome, &mut destinations, terminal_out, terminal_err)?,
            Err(e) => {
                writeln!(
                    terminal_out,
                    "Failed execute {label} with args {args:?}: {e:#}"
                )?;
            }
        }
        // Redirection files are closed here, before the next line is read.
        drop(destinations);

        Ok(match self.state.pending_exit.take() {
            Some(code) => LineStatus::Exit(code),
            None => LineStatus::Continue,
        })
    }

    /// Read and run lines from `reader` until end of input or `exit`.
    ///
    /// Returns the exit code for the process. A failed read is an error.
    pub fn repl(&mut self, reader: &mut dyn LineReader) -> Result<ExitCode> {
        loop {
            let line = match reader
                .read_line(&self.prompt)
                .context("Failed to read input")?
            {
                ReadOutcome::Line(line) => line,
                ReadOutcome::Interrupted => continue,
                ReadOutcome::Eof => return Ok(0),
            };
            if line.trim().is_empty() {
                continue;
            }
            if let LineStatus::Exit(code) = self.run_line(&line)? {
                return Ok(code);
            }
        }
    }
}

impl Default for Interpreter {
    /// An interpreter for the current process with the built-ins `exit`, `echo`,
    /// `type`, `pwd` and `cd`.
    fn default() -> Self {
        Self::new(ShellState::new())
    }
}

/// Write a finished command's output to where the line asked for it: standard output
/// first, then standard error.
///
/// A write failure does not stop the other stream from being written; it is reported
/// on `terminal_err`.
pub fn flush<'a>(
    outcome: &CommandOutcome,
    destinations: &mut Destinations,
    terminal_out: &'a mut dyn Write,
    terminal_err: &'a mut dyn Write,
) -> io::Result<()> {
    let streams = [
        (RedirectStream::Stdout, &outcome.stdout, &mut *terminal_out),
        (RedirectStream::Stderr, &outcome.stderr, &mut *terminal_err),
    ];
    let mut failures = Vec::new();
    for (stream, bytes, terminal) in streams {
        if bytes.is_empty() {
            continue;
        }
        if let Err(e) = destinations.write(stream, bytes, terminal) {
            warn!("writing {stream:?} failed: {e}");
            failures.push((stream, e));
        }
    }
    for (stream, e) in failures {
        writeln!(terminal_err, "failed to write {stream:?}: {e}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io_adapters::PipedReader;
    use std::env as stdenv;
    use std::fs;
    use std::io::Cursor;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn make_unique_temp_dir(tag: &str) -> io::Result<PathBuf> {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let p = stdenv::temp_dir().join(format!(
            "myshell_interp_{}_{}_{}",
            tag,
            std::process::id(),
            nanos
        ));
        fs::create_dir_all(&p)?;
        Ok(p)
    }

    fn shell_in(dir: &PathBuf) -> Interpreter {
        let mut sh = Interpreter::default();
        sh.state_mut().current_dir = dir.clone();
        sh
    }

    /// Runs `line` and returns (status, terminal stdout, terminal stderr).
    fn run(sh: &mut Interpreter, line: &str) -> (LineStatus, String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let status = sh.run_line_with_terminal(line, &mut out, &mut err).unwrap();
        (
            status,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn echo_truncate_then_append() {
        let dir = make_unique_temp_dir("echo_redirect").unwrap();
        let mut sh = shell_in(&dir);

        let (_, out, _) = run(&mut sh, "echo hello > out.txt");
        assert_eq!(out, "");
        assert_eq!(fs::read_to_string(dir.join("out.txt")).unwrap(), "hello\n");

        run(&mut sh, "echo again >> out.txt");
        assert_eq!(
            fs::read_to_string(dir.join("out.txt")).unwrap(),
            "hello\nagain\n"
        );

        run(&mut sh, "echo fresh 1> out.txt");
        assert_eq!(fs::read_to_string(dir.join("out.txt")).unwrap(), "fresh\n");
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn unknown_command_is_reported() {
        let mut sh = Interpreter::default();
        let before = sh.state().current_dir.clone();
        let (status, out, err) = run(&mut sh, "nonexistent-cmd arg1");
        assert_eq!(status, LineStatus::Continue);
        assert_eq!(out, "nonexistent-cmd: command not found\n");
        assert_eq!(err, "");
        assert_eq!(sh.state().current_dir, before);
    }

    #[test]
    fn cd_home_then_pwd() {
        let home = make_unique_temp_dir("home").unwrap();
        let mut sh = Interpreter::default();
        sh.state_mut()
            .set_var("HOME", home.to_string_lossy().into_owned());

        run(&mut sh, "cd ~");
        let (_, out, _) = run(&mut sh, "pwd");
        assert_eq!(out, format!("{}\n", home.display()));
        let _ = fs::remove_dir_all(home);
    }

    #[test]
    fn blank_line_does_nothing() {
        let mut sh = Interpreter::default();
        assert_eq!(run(&mut sh, "   "), (LineStatus::Continue, String::new(), String::new()));
    }

    #[test]
    fn stdout_redirect_leaves_stderr_on_terminal() {
        let dir = make_unique_temp_dir("isolation").unwrap();
        let mut sh = shell_in(&dir);

        let (_, out, err) = run(&mut sh, "type no_such_program_zz > found.txt");
        assert_eq!(out, "");
        assert_eq!(err, "no_such_program_zz: not found\n");
        assert_eq!(fs::read_to_string(dir.join("found.txt")).unwrap(), "");

        let (_, out, err) = run(&mut sh, "type no_such_program_zz 2> missing.txt");
        assert_eq!(out, "");
        assert_eq!(err, "");
        assert_eq!(
            fs::read_to_string(dir.join("missing.txt")).unwrap(),
            "no_such_program_zz: not found\n"
        );

        let (_, out, _) = run(&mut sh, "echo visible 2>> missing.txt");
        assert_eq!(out, "visible\n");
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn last_redirection_per_stream_wins() {
        let dir = make_unique_temp_dir("last_wins").unwrap();
        fs::write(dir.join("first.txt"), "stale\n").unwrap();
        fs::write(dir.join("kept.log"), "old\n").unwrap();
        let mut sh = shell_in(&dir);

        run(&mut sh, "echo x > first.txt > second.txt > third.txt");
        assert_eq!(fs::read_to_string(dir.join("first.txt")).unwrap(), "");
        assert_eq!(fs::read_to_string(dir.join("second.txt")).unwrap(), "");
        assert_eq!(fs::read_to_string(dir.join("third.txt")).unwrap(), "x\n");

        run(&mut sh, "type no_such_program_zz 2>> kept.log 2> fresh.log");
        assert_eq!(fs::read_to_string(dir.join("kept.log")).unwrap(), "old\n");
        assert_eq!(
            fs::read_to_string(dir.join("fresh.log")).unwrap(),
            "no_such_program_zz: not found\n"
        );
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn words_after_redirection_are_dropped() {
        let dir = make_unique_temp_dir("cut").unwrap();
        let mut sh = shell_in(&dir);
        run(&mut sh, "echo kept > out.txt dropped");
        assert_eq!(fs::read_to_string(dir.join("out.txt")).unwrap(), "kept\n");
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn missing_target_is_a_syntax_error() {
        let mut sh = Interpreter::default();
        let (status, out, _) = run(&mut sh, "echo hi >");
        assert_eq!(status, LineStatus::Continue);
        assert_eq!(out, "syntax error: expected a file name after '>'\n");
    }

    #[test]
    fn open_failure_skips_the_line() {
        let dir = make_unique_temp_dir("open_fail").unwrap();
        let mut sh = shell_in(&dir);
        let (status, out, _) = run(&mut sh, "exit 4 > no/such/dir/out.txt");
        assert_eq!(status, LineStatus::Continue);
        assert!(out.starts_with("no/such/dir/out.txt: "));
        assert_eq!(sh.state().pending_exit, None);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn open_failure_is_fatal_when_configured() {
        let dir = make_unique_temp_dir("open_fatal").unwrap();
        let mut settings = crate::config::Config::default_config().settings;
        settings.fatal_redirect_errors = true;
        let mut sh = Interpreter::with_settings(&settings);
        sh.state_mut().current_dir = dir.clone();

        let mut out = Vec::new();
        let mut err = Vec::new();
        let result = sh.run_line_with_terminal("echo hi > no/such/out.txt", &mut out, &mut err);
        assert!(result.is_err());
        assert!(out.is_empty());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn exit_stops_after_flushing() {
        let dir = make_unique_temp_dir("exit").unwrap();
        let mut sh = shell_in(&dir);
        let (status, out, _) = run(&mut sh, "exit 3");
        assert_eq!(status, LineStatus::Exit(3));
        assert_eq!(out, "");
        assert_eq!(sh.state().pending_exit, None);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn builtin_argument_errors_continue() {
        let mut sh = Interpreter::default();
        let (status, out, _) = run(&mut sh, "exit a b");
        assert_eq!(status, LineStatus::Continue);
        assert!(out.starts_with("Failed execute command exit with args [\"a\", \"b\"]: "));

        let (status, out, _) = run(&mut sh, "cd");
        assert_eq!(status, LineStatus::Continue);
        assert!(out.starts_with("Failed execute command cd with args []: "));
    }

    #[test]
    #[cfg(unix)]
    fn external_output_is_redirectable() {
        let dir = make_unique_temp_dir("external").unwrap();
        let mut sh = shell_in(&dir);
        sh.state_mut().search_path = vec![PathBuf::from("/bin"), PathBuf::from("/usr/bin")];

        let (_, out, err) = run(&mut sh, "sh -c 'echo out; echo err >&2; exit 2' 2> err.txt");
        assert_eq!(out, "out\n");
        assert_eq!(err, "");
        assert_eq!(fs::read_to_string(dir.join("err.txt")).unwrap(), "err\n");
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn flush_writes_both_streams() {
        let outcome = CommandOutcome {
            stdout: b"o".to_vec(),
            stderr: b"e".to_vec(),
            exit_code: 1,
        };
        let mut destinations = Destinations::default();
        let mut out = Vec::new();
        let mut err = Vec::new();
        flush(&outcome, &mut destinations, &mut out, &mut err).unwrap();
        assert_eq!(out, b"o");
        assert_eq!(err, b"e");
    }

    #[test]
    fn repl_stops_at_eof() {
        let mut sh = Interpreter::default();
        let mut reader = PipedReader::new(Cursor::new("\n   \n"), io::sink());
        assert_eq!(sh.repl(&mut reader).unwrap(), 0);
    }

    #[test]
    fn repl_returns_exit_code() {
        let mut sh = Interpreter::default();
        let mut prompts = Vec::new();
        let mut reader = PipedReader::new(Cursor::new("exit 7\necho never\n"), &mut prompts);
        assert_eq!(sh.repl(&mut reader).unwrap(), 7);
        drop(reader);
        assert_eq!(prompts, b"$ ");
    }

    #[test]
    fn repl_fails_on_read_error() {
        let mut sh = Interpreter::default();
        let mut reader = PipedReader::new(Cursor::new(vec![0xff, b'\n']), io::sink());
        let err = sh.repl(&mut reader).unwrap_err();
        assert_eq!(err.to_string(), "Failed to read input");
    }
}

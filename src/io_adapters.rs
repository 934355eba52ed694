//! Adapters between the interpreter and the outside world: files that command output
//! is redirected into, and the sources input lines are read from.

use crate::parser::{RedirectMode, RedirectStream, Redirection};
use anyhow::{Context, Result};
use log::{debug, warn};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

/// Open redirection targets for one command.
///
/// A stream without a file goes to the terminal. The files are closed when this value
/// is dropped, whichever way the command finished.
#[derive(Debug, Default)]
pub struct Destinations {
    stdout: Option<File>,
    stderr: Option<File>,
}

impl Destinations {
    /// Opens every target in `redirections` in order, resolving relative names against
    /// `base_dir`. Files are created with mode `0644` when missing.
    ///
    /// Each target is created or truncated according to its own mode, but only the
    /// last one per stream stays open to receive output.
    pub fn open(redirections: &[Redirection], base_dir: &Path) -> Result<Self> {
        let mut destinations = Destinations::default();
        for redirection in redirections {
            let file = open_target(redirection, base_dir)
                .with_context(|| redirection.target.clone())?;
            debug!(
                "{:?} redirected to {} ({:?})",
                redirection.stream, redirection.target, redirection.mode
            );
            let slot = match redirection.stream {
                RedirectStream::Stdout => &mut destinations.stdout,
                RedirectStream::Stderr => &mut destinations.stderr,
            };
            // Replacing an earlier target closes it.
            *slot = Some(file);
        }
        Ok(destinations)
    }

    /// Writes `bytes` to the file for `stream`, or to `terminal` when the stream is not
    /// redirected.
    pub fn write(
        &mut self,
        stream: RedirectStream,
        bytes: &[u8],
        terminal: &mut dyn Write,
    ) -> io::Result<()> {
        let file = match stream {
            RedirectStream::Stdout => self.stdout.as_mut(),
            RedirectStream::Stderr => self.stderr.as_mut(),
        };
        match file {
            Some(file) => file.write_all(bytes),
            None => {
                terminal.write_all(bytes)?;
                terminal.flush()
            }
        }
    }
}

fn open_target(redirection: &Redirection, base_dir: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.create(true);
    match redirection.mode {
        RedirectMode::Truncate => options.write(true).truncate(true),
        RedirectMode::Append => options.append(true),
    };
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o644);
    }
    options.open(base_dir.join(&redirection.target))
}

/// Result of asking a [`LineReader`] for the next line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A line without its trailing newline.
    Line(String),
    /// The user pressed Ctrl-C; the partial line is discarded.
    Interrupted,
    /// No more input.
    Eof,
}

/// Source of command lines for the read loop.
pub trait LineReader {
    /// Shows `prompt` and reads the next line.
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome>;
}

/// Interactive line editing on a terminal, backed by `rustyline`.
pub struct EditorReader {
    editor: DefaultEditor,
    history_file: Option<PathBuf>,
}

impl EditorReader {
    /// Creates an editor keeping at most `history_size` entries. When `history_file` is
    /// set, history is loaded from it now and written back when the reader is dropped.
    pub fn new(history_size: usize, history_file: Option<PathBuf>) -> Result<Self> {
        let config = rustyline::Config::builder()
            .max_history_size(history_size)?
            .auto_add_history(false)
            .build();
        let mut editor = DefaultEditor::with_config(config)?;
        if let Some(path) = &history_file {
            if let Err(e) = editor.load_history(path) {
                debug!("no history loaded from {}: {}", path.display(), e);
            }
        }
        Ok(Self {
            editor,
            history_file,
        })
    }
}

impl LineReader for EditorReader {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    self.editor.add_history_entry(line.as_str())?;
                }
                Ok(ReadOutcome::Line(line))
            }
            Err(ReadlineError::Interrupted) => Ok(ReadOutcome::Interrupted),
            Err(ReadlineError::Eof) => Ok(ReadOutcome::Eof),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for EditorReader {
    fn drop(&mut self) {
        if let Some(path) = &self.history_file {
            if let Err(e) = self.editor.save_history(path) {
                warn!("could not save history to {}: {}", path.display(), e);
            }
        }
    }
}

/// Plain line reading for piped or redirected input.
///
/// The prompt is still printed so transcripts look the same as interactive sessions.
pub struct PipedReader<R, W> {
    input: R,
    prompt_out: W,
}

impl<R: BufRead, W: Write> PipedReader<R, W> {
    pub fn new(input: R, prompt_out: W) -> Self {
        Self { input, prompt_out }
    }
}

impl<R: BufRead, W: Write> LineReader for PipedReader<R, W> {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome> {
        write!(self.prompt_out, "{}", prompt)?;
        self.prompt_out.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(ReadOutcome::Eof);
        }
        if let Some(stripped) = line.strip_suffix('\n') {
            let stripped = stripped.strip_suffix('\r').unwrap_or(stripped);
            line = stripped.to_string();
        }
        Ok(ReadOutcome::Line(line))
    }
}

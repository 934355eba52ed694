//! Separation of redirection operators from the real argument list.
//!
//! The lexer leaves operators such as `>` or `2>>` as ordinary words. [`plan`] finds
//! them, pairs each one with the file name that follows it and cuts the argument list
//! at the first operator.

use log::debug;
use std::fmt;

/// Output stream that a redirection applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RedirectStream {
    /// Standard output (`>`, `1>`, `>>`, `1>>`).
    Stdout,
    /// Standard error (`2>`, `2>>`).
    Stderr,
}

/// How the target file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectMode {
    /// Create the file or truncate it to zero length.
    Truncate,
    /// Create the file or append to its end.
    Append,
}

/// One effective redirection of an output stream to a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirection {
    pub stream: RedirectStream,
    pub mode: RedirectMode,
    /// File name exactly as written on the command line.
    pub target: String,
}

/// Everything needed to run one command line.
///
/// `argv[0]` is the command name. `argv` never contains redirection operators or
/// their file names. `redirections` lists every redirection in the order written;
/// the last one for a stream is where that stream's output goes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecutionPlan {
    pub argv: Vec<String>,
    pub redirections: Vec<Redirection>,
}

impl ExecutionPlan {
    /// The command name, if the line had any words at all.
    pub fn name(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }

    /// Arguments following the command name.
    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }

    /// The redirection in effect for `stream`, if any.
    pub fn redirection(&self, stream: RedirectStream) -> Option<&Redirection> {
        self.redirections.iter().rfind(|r| r.stream == stream)
    }
}

/// Errors that prevent a line from being planned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanningError {
    /// A redirection operator was the last word of the line.
    MissingTarget(String),
}

impl fmt::Display for PlanningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanningError::MissingTarget(op) => {
                write!(f, "syntax error: expected a file name after '{}'", op)
            }
        }
    }
}

impl std::error::Error for PlanningError {}

/// Recognized operators with the stream and mode each selects.
const REDIRECT_OPERATORS: &[(&[&str], RedirectStream, RedirectMode)] = &[
    (&[">", "1>"], RedirectStream::Stdout, RedirectMode::Truncate),
    (&[">>", "1>>"], RedirectStream::Stdout, RedirectMode::Append),
    (&["2>"], RedirectStream::Stderr, RedirectMode::Truncate),
    (&["2>>"], RedirectStream::Stderr, RedirectMode::Append),
];

/// Returns the stream and mode selected by `word` if it is a redirection operator.
pub fn redirect_operator(word: &str) -> Option<(RedirectStream, RedirectMode)> {
    REDIRECT_OPERATORS
        .iter()
        .find(|(spellings, _, _)| spellings.contains(&word))
        .map(|&(_, stream, mode)| (stream, mode))
}

/// Builds an [`ExecutionPlan`] from lexed words.
///
/// Scanning starts after the command name. Every word from the first operator onward
/// is excluded from `argv`, so ordinary arguments written after a redirection are
/// dropped rather than moved. Repeated redirections of a stream are all kept; the
/// last one wins when the files are opened.
pub fn plan(mut words: Vec<String>) -> Result<ExecutionPlan, PlanningError> {
    let mut redirections: Vec<Redirection> = Vec::new();
    let mut cut = None;

    let mut i = 1;
    while i < words.len() {
        let Some((stream, mode)) = redirect_operator(&words[i]) else {
            i += 1;
            continue;
        };
        let target = words
            .get(i + 1)
            .ok_or_else(|| PlanningError::MissingTarget(words[i].clone()))?;

        if cut.is_none() {
            cut = Some(i);
        }
        redirections.push(Redirection {
            stream,
            mode,
            target: target.clone(),
        });
        i += 2;
    }

    if let Some(cut) = cut {
        let dropped = words.split_off(cut);
        debug!("redirection words removed from argv: {:?}", dropped);
    }

    Ok(ExecutionPlan {
        argv: words,
        redirections,
    })
}

//! A small interactive shell.
//!
//! This crate reads command lines, splits them into words with POSIX-style quoting
//! and escaping, separates output redirections (`>`, `>>`, `2>`, ...) from the real
//! arguments, and runs either one of its built-in commands or an external program
//! found on `PATH`. Command output is captured first and then written to the terminal
//! or to the redirection files.
//!
//! The main entry point is [`Interpreter`]. The public modules expose the individual
//! stages (lexer, redirection planner, command resolution) for embedding and testing.

pub mod builtin;
pub mod command;
pub mod config;
pub mod env;
pub mod external;
pub mod interpreter;
pub mod io_adapters;
pub mod lexer;
pub mod logging;
pub mod parser;

/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::{Interpreter, LineStatus};

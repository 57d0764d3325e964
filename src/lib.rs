//! Keep a command-line tool resident and run it many times from one process.
//!
//! A [`Daemon`] reads commands from an input stream and re-invokes an
//! [`EntryPoint`] for every `run <args>` line, avoiding the start-up cost of a
//! fresh process per invocation. Input for the next run can be supplied
//! inline with `in.bytes <N>` or from disk with `in.file <path>`, and `q`
//! ends the session.
//!
//! Arguments of a `run` line are split with [`split_into_args`], which
//! understands single and double quotes. The [`command`] module holds the
//! traits a hosted tool implements; [`Toolbox`] is a ready-made tool with a
//! few builtins.

mod builtin;
pub mod command;
mod interpreter;
mod io_adapters;
mod lexer;
pub mod logging;
mod parser;

pub use builtin::{Cat, Echo, Toolbox, ToolboxStats, Wc};
pub use command::{EntryPoint, ExitCode, InvocationContext, Statistics};
pub use interpreter::{DEFAULT_PROGRAM_NAME, Daemon};
pub use io_adapters::InputReader;
pub use lexer::split_into_args;
pub use parser::{Command, ProtocolError, parse_command};

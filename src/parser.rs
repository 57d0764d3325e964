//! Classification of daemon input lines into commands.

use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;

const RUN_PREFIX: &str = "run ";
const INPUT_BYTES_PREFIX: &str = "in.bytes ";
const INPUT_FILE_PREFIX: &str = "in.file ";
const QUIT: &str = "q";

/// Leading decimal digits of an `in.bytes` argument. Anything after them is
/// ignored, a sign is not accepted.
static BYTE_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A[0-9]+").expect("byte count pattern is valid"));

/// One line of daemon input, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    /// `run <args>`: invoke the tool. Holds the raw, not yet split, arguments.
    Run(&'a str),
    /// `in.bytes <N>`: the next `N` raw bytes of input become the pending input.
    InputBytes(u64),
    /// `in.file <path>`: the file's contents become the pending input.
    InputFile(PathBuf),
    /// `q`: stop reading commands.
    Quit,
    /// Any other line. Carries nothing; such lines are skipped.
    Ignored,
}

/// Errors that can occur while classifying a line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The argument of `in.bytes` does not start with a decimal number that
    /// fits a byte count.
    #[error("expected integer (number of bytes)")]
    ExpectedByteCount(String),
}

/// Classifies a single input line.
///
/// Prefixes are checked in a fixed order and the first match wins, so a line
/// is never more than one command. `q` has to match exactly; everything
/// unrecognized becomes [`Command::Ignored`].
///
/// # Returns
///
/// * `Result<Command, ProtocolError>` - the command, or a `ProtocolError` when
///   `in.bytes` carries no usable number.
pub fn parse_command(line: &str) -> Result<Command<'_>, ProtocolError> {
    if let Some(args) = line.strip_prefix(RUN_PREFIX) {
        Ok(Command::Run(args))
    } else if let Some(count) = line.strip_prefix(INPUT_BYTES_PREFIX) {
        parse_byte_count(count).map(Command::InputBytes)
    } else if let Some(path) = line.strip_prefix(INPUT_FILE_PREFIX) {
        Ok(Command::InputFile(PathBuf::from(path.trim())))
    } else if line == QUIT {
        Ok(Command::Quit)
    } else {
        Ok(Command::Ignored)
    }
}

fn parse_byte_count(text: &str) -> Result<u64, ProtocolError> {
    BYTE_COUNT
        .find(text)
        .and_then(|digits| digits.as_str().parse().ok())
        .ok_or_else(|| ProtocolError::ExpectedByteCount(text.to_string()))
}

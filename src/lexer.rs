//! Splitting of `run` command lines into argument vectors.
//!
//! The rules are a small subset of shell word splitting: spaces and tabs
//! separate arguments, single or double quotes group text, and a backslash
//! right before a quote makes that quote literal. There is no variable
//! expansion, no globbing and no nesting of quotes.

/// Previous-character value used before the first character is scanned.
const SENTINEL: char = '\0';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SplitState {
    /// Outside of any quote region.
    Bare,
    /// Inside a region opened by the contained quote character.
    Quoted(char),
}

struct SplittingFSM<'a> {
    input: std::str::Chars<'a>,
    state: SplitState,
    last: char,
    current: String,
}

impl<'a> SplittingFSM<'a> {
    fn new(line: &'a str) -> Self {
        SplittingFSM {
            input: line.chars(),
            state: SplitState::Bare,
            last: SENTINEL,
            current: String::new(),
        }
    }

    /// Runs the scan to completion and returns the collected arguments.
    ///
    /// Never fails: an unterminated quote simply ends the last argument.
    fn make_args(mut self) -> Vec<String> {
        let mut out = Vec::new();

        while let Some(ch) = self.input.next() {
            match self.state {
                SplitState::Bare => self.handle_bare(ch, &mut out),
                SplitState::Quoted(quote) => self.handle_quoted(ch, quote),
            }
            self.last = ch;
        }

        self.flush(&mut out);
        out
    }

    fn handle_bare(&mut self, ch: char, out: &mut Vec<String>) {
        match ch {
            ' ' | '\t' => self.flush(out),
            '\'' | '"' if self.last != '\\' => self.state = SplitState::Quoted(ch),
            c => self.current.push(c),
        }
    }

    fn handle_quoted(&mut self, ch: char, quote: char) {
        if ch == quote && self.last != '\\' {
            self.state = SplitState::Bare;
        } else {
            self.current.push(ch);
        }
    }

    fn flush(&mut self, out: &mut Vec<String>) {
        if !self.current.is_empty() {
            out.push(std::mem::take(&mut self.current));
        }
    }
}

/// Splits a command line into its arguments.
///
/// # Examples
/// ```
/// use daemon_mode::split_into_args;
/// assert_eq!(split_into_args(r#"-o "out file.s" in.ll"#), ["-o", "out file.s", "in.ll"]);
/// ```
pub fn split_into_args(line: &str) -> Vec<String> {
    SplittingFSM::new(line).make_args()
}

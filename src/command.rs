use crate::io_adapters::InputReader;
use std::io::Write;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// Everything a single invocation receives besides its arguments.
///
/// Built fresh for every `run` command from a snapshot of the pending input,
/// so later `in.*` commands never change what an earlier invocation saw.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationContext {
    input: Vec<u8>,
}

impl InvocationContext {
    /// Create a context that hands `input` to the tool in place of stdin.
    pub fn new(input: Vec<u8>) -> Self {
        Self { input }
    }

    /// Bytes standing in for standard input. Empty when no `in.*` command
    /// preceded the `run`.
    pub fn input(&self) -> &[u8] {
        &self.input
    }

    /// A reader over the input, for tools written against `Read`.
    pub fn reader(&self) -> InputReader {
        InputReader::new(self.input.clone())
    }

    /// Take ownership of the input bytes.
    pub fn into_input(self) -> Vec<u8> {
        self.input
    }
}

/// Per-run statistics kept by a tool, printed and cleared by the daemon after
/// every invocation.
pub trait Statistics {
    /// Whether statistics are collected at all. Nothing else is called when
    /// this returns `false`.
    fn enabled(&self) -> bool;

    /// Write the statistics accumulated since the last reset.
    fn print(&self, out: &mut dyn Write) -> std::io::Result<()>;

    /// Forget everything accumulated so far.
    fn reset(&mut self);
}

/// A tool that the daemon invokes over and over within one process.
///
/// Only [`EntryPoint::invoke`] is required. The other methods are hooks for
/// tools that keep option or statistics state between calls.
pub trait EntryPoint {
    /// Run the tool once.
    ///
    /// `argv[0]` is a synthetic program name and is never a real argument, so
    /// `argv.len()` plays the role of `argc`. The returned code is reported
    /// verbatim; a failing tool does not stop the daemon.
    fn invoke(&mut self, argv: &[String], context: InvocationContext) -> ExitCode;

    /// Restore every option of the tool to its default so values never leak
    /// from one invocation into the next. Called before each invocation.
    fn reset_options(&mut self) {}

    /// Statistics collected by the tool, if it has any.
    fn statistics(&mut self) -> Option<&mut dyn Statistics> {
        None
    }
}

impl<F> EntryPoint for F
where
    F: FnMut(&[String], InvocationContext) -> ExitCode,
{
    fn invoke(&mut self, argv: &[String], context: InvocationContext) -> ExitCode {
        self(argv, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn context_reader_yields_snapshot() -> anyhow::Result<()> {
        let context = InvocationContext::new(b"line 1\nline 2\n".to_vec());
        let mut text = String::new();
        context.reader().read_to_string(&mut text)?;
        assert_eq!(text, "line 1\nline 2\n");
        // reading does not consume the context itself
        assert_eq!(context.input(), b"line 1\nline 2\n");
        Ok(())
    }

    #[test]
    fn default_context_is_empty() {
        assert!(InvocationContext::default().into_input().is_empty());
    }

    #[test]
    fn closures_are_entry_points() {
        let mut seen = Vec::new();
        let mut tool = |argv: &[String], context: InvocationContext| {
            seen.push((argv.to_vec(), context.into_input()));
            3
        };

        let argv = vec!["tool".to_string(), "x".to_string()];
        assert_eq!(tool.invoke(&argv, InvocationContext::new(b"in".to_vec())), 3);
        tool.reset_options();
        assert!(tool.statistics().is_none());
        drop(tool);

        assert_eq!(seen, vec![(argv, b"in".to_vec())]);
    }
}

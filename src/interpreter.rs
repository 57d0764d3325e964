use crate::command::{EntryPoint, ExitCode, InvocationContext};
use crate::io_adapters::{read_command_line, read_file_lossy, read_payload};
use crate::lexer;
use crate::parser::{self, Command, ProtocolError};
use std::io::{self, BufRead, Write};

/// Program name placed in `argv[0]` unless configured otherwise.
pub const DEFAULT_PROGRAM_NAME: &str = "daemon-mode";

/// Status returned when the loop ends on `q` or end of input.
const EXIT_OK: ExitCode = 0;
/// Status returned when `in.bytes` carries no usable number.
const EXIT_PROTOCOL: ExitCode = 1;

/// What the loop does after handling one line.
enum Flow {
    Continue,
    Stop(ExitCode),
}

/// A command loop that keeps one tool alive and invokes it on demand.
///
/// Lines are read from an input stream: `run <args>` invokes the tool,
/// `in.bytes <N>` and `in.file <path>` set the input for the next run, and
/// `q` stops the loop. After each run a line
/// `[daemon] Task finished with code <code>` is written to the output.
///
/// Example
/// ```
/// use daemon_mode::{Daemon, InvocationContext};
///
/// let mut runs = Vec::new();
/// let tool = |argv: &[String], context: InvocationContext| {
///     runs.push((argv[1..].to_vec(), context.into_input()));
///     0
/// };
///
/// let mut out = Vec::new();
/// let code = Daemon::new(tool).run(&mut &b"in.bytes 3\nabc\nrun foo\nq\n"[..], &mut out, &mut Vec::new());
/// assert_eq!(code, 0);
/// assert_eq!(out, b"[daemon] Task finished with code 0\n");
/// assert_eq!(runs, vec![(vec!["foo".to_string()], b"abc".to_vec())]);
/// ```
pub struct Daemon<T: EntryPoint> {
    tool: T,
    program_name: String,
    pending_input: Vec<u8>,
}

impl<T: EntryPoint> Daemon<T> {
    /// Create a daemon around `tool` with an empty pending input.
    pub fn new(tool: T) -> Self {
        Self {
            tool,
            program_name: DEFAULT_PROGRAM_NAME.to_string(),
            pending_input: Vec::new(),
        }
    }

    /// Use `name` as `argv[0]` for every invocation.
    pub fn with_program_name(mut self, name: impl Into<String>) -> Self {
        self.program_name = name.into();
        self
    }

    /// Borrow the hosted tool.
    pub fn tool(&self) -> &T {
        &self.tool
    }

    /// Give back the hosted tool.
    pub fn into_tool(self) -> T {
        self.tool
    }

    /// Read and execute commands until `q`, end of input, or a malformed
    /// `in.bytes` line.
    ///
    /// Completion lines go to `out`; protocol errors and tool statistics go to
    /// `err`. Returns 0 on `q` or end of input and 1 on a malformed byte
    /// count. A failure on the streams themselves ends the loop like end of
    /// input does.
    pub fn run(&mut self, input: &mut dyn BufRead, out: &mut dyn Write, err: &mut dyn Write) -> ExitCode {
        loop {
            let line = match read_command_line(input) {
                Ok(Some(line)) => line,
                Ok(None) => {
                    tracing::debug!("end of input");
                    return EXIT_OK;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "reading commands failed, stopping");
                    return EXIT_OK;
                }
            };

            match self.execute_line(&line, input, out, err) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop(code)) => return code,
                Err(e) => {
                    tracing::warn!(error = %e, "daemon stream failed, stopping");
                    return EXIT_OK;
                }
            }
        }
    }

    fn execute_line(
        &mut self,
        line: &str,
        input: &mut dyn BufRead,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> io::Result<Flow> {
        let command = match parser::parse_command(line) {
            Ok(command) => command,
            Err(e @ ProtocolError::ExpectedByteCount(_)) => {
                tracing::error!(line, "malformed in.bytes command");
                writeln!(err, "{e}")?;
                err.flush()?;
                return Ok(Flow::Stop(EXIT_PROTOCOL));
            }
        };
        tracing::debug!(?command, "command received");

        match command {
            Command::Run(args) => {
                let code = self.dispatch(args, out, err)?;
                writeln!(out, "[daemon] Task finished with code {code}")?;
                out.flush()?;
            }
            Command::InputBytes(count) => {
                self.pending_input = read_payload(input, count)?;
                if (self.pending_input.len() as u64) < count {
                    tracing::debug!(expected = count, read = self.pending_input.len(), "short in.bytes payload");
                }
            }
            Command::InputFile(path) => {
                self.pending_input = read_file_lossy(&path);
            }
            Command::Quit => return Ok(Flow::Stop(EXIT_OK)),
            Command::Ignored => {}
        }
        Ok(Flow::Continue)
    }

    /// Invoke the tool once with the arguments of a `run` line and the current
    /// pending input, which is cleared afterwards whatever the outcome.
    fn dispatch(&mut self, args: &str, out: &mut dyn Write, err: &mut dyn Write) -> io::Result<ExitCode> {
        self.tool.reset_options();

        let mut argv = vec![self.program_name.clone()];
        argv.extend(lexer::split_into_args(args));

        let context = InvocationContext::new(std::mem::take(&mut self.pending_input));
        tracing::debug!(argc = argv.len(), input_len = context.input().len(), "invoking tool");
        let code = self.tool.invoke(&argv, context);
        tracing::info!(code, "task finished");

        if let Some(stats) = self.tool.statistics() {
            if stats.enabled() {
                stats.print(err)?;
                stats.reset();
            }
        }

        io::stdout().flush()?;
        io::stderr().flush()?;
        out.flush()?;
        err.flush()?;
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Statistics;
    use std::io::{Cursor, Read};

    /// Records every invocation and replies with queued exit codes.
    #[derive(Default)]
    struct Recorder {
        calls: Vec<(Vec<String>, Vec<u8>)>,
        codes: Vec<ExitCode>,
        resets: usize,
        stats: Option<Counter>,
    }

    impl EntryPoint for Recorder {
        fn invoke(&mut self, argv: &[String], context: InvocationContext) -> ExitCode {
            self.calls.push((argv.to_vec(), context.into_input()));
            if let Some(stats) = &mut self.stats {
                stats.count += 1;
            }
            if self.codes.is_empty() { 0 } else { self.codes.remove(0) }
        }

        fn reset_options(&mut self) {
            self.resets += 1;
        }

        fn statistics(&mut self) -> Option<&mut dyn Statistics> {
            self.stats.as_mut().map(|s| s as &mut dyn Statistics)
        }
    }

    struct Counter {
        enabled: bool,
        count: u64,
    }

    impl Statistics for Counter {
        fn enabled(&self) -> bool {
            self.enabled
        }

        fn print(&self, out: &mut dyn Write) -> io::Result<()> {
            writeln!(out, "runs: {}", self.count)
        }

        fn reset(&mut self) {
            self.count = 0;
        }
    }

    struct Session {
        code: ExitCode,
        out: String,
        err: String,
        tool: Recorder,
    }

    fn session(tool: Recorder, input: &[u8]) -> Session {
        let mut daemon = Daemon::new(tool).with_program_name("tool");
        let mut out = Vec::new();
        let mut err = Vec::new();
        let code = daemon.run(&mut Cursor::new(input.to_vec()), &mut out, &mut err);
        Session {
            code,
            out: String::from_utf8_lossy(&out).into_owned(),
            err: String::from_utf8_lossy(&err).into_owned(),
            tool: daemon.into_tool(),
        }
    }

    fn argv(args: &[&str]) -> Vec<String> {
        std::iter::once("tool").chain(args.iter().copied()).map(String::from).collect()
    }

    #[test]
    fn end_to_end_single_run() {
        let tool = Recorder {
            codes: vec![42],
            ..Recorder::default()
        };
        let s = session(tool, b"in.bytes 3\nabc\nrun foo\nq\n");

        assert_eq!(s.code, 0);
        assert_eq!(s.tool.calls, vec![(argv(&["foo"]), b"abc".to_vec())]);
        assert_eq!(s.out, "[daemon] Task finished with code 42\n");
        assert!(s.err.is_empty());
    }

    #[test]
    fn pending_input_is_cleared_after_run() {
        let s = session(Recorder::default(), b"in.bytes 5\nhellorun x\nrun y\n");

        assert_eq!(
            s.tool.calls,
            vec![(argv(&["x"]), b"hello".to_vec()), (argv(&["y"]), Vec::new())]
        );
        assert_eq!(s.out.lines().count(), 2);
    }

    #[test]
    fn input_is_cleared_even_after_failure() {
        let tool = Recorder {
            codes: vec![1, 0],
            ..Recorder::default()
        };
        let s = session(tool, b"in.bytes 2\nxyrun a\nrun b\n");

        assert_eq!(s.tool.calls[1].1, Vec::<u8>::new());
        assert_eq!(
            s.out,
            "[daemon] Task finished with code 1\n[daemon] Task finished with code 0\n"
        );
    }

    #[test]
    fn later_input_overwrites_earlier() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        std::io::Write::write_all(&mut file, b"from file")?;
        let script = format!("in.bytes 3\nabc\nin.file {}\nrun z\n", file.path().display());

        let s = session(Recorder::default(), script.as_bytes());
        assert_eq!(s.tool.calls, vec![(argv(&["z"]), b"from file".to_vec())]);
        Ok(())
    }

    #[test]
    fn unreadable_file_gives_empty_input() {
        let s = session(
            Recorder::default(),
            b"in.bytes 3\nabcin.file /definitely/not/here.ll\nrun z\n",
        );
        assert_eq!(s.code, 0);
        assert_eq!(s.tool.calls, vec![(argv(&["z"]), Vec::new())]);
    }

    #[test]
    fn payload_may_contain_newlines() {
        let s = session(Recorder::default(), b"in.bytes 8\nrun a\nq\nrun b\n");
        assert_eq!(s.tool.calls, vec![(argv(&["b"]), b"run a\nq\n".to_vec())]);
    }

    #[test]
    fn short_payload_at_end_of_input() {
        let s = session(Recorder::default(), b"in.bytes 100\nabc");
        assert_eq!(s.code, 0);
        assert!(s.tool.calls.is_empty());
        assert!(s.out.is_empty());
    }

    #[test]
    fn malformed_byte_count_stops_loop() {
        let s = session(Recorder::default(), b"in.bytes abc\nrun x\n");

        assert_eq!(s.code, 1);
        assert!(s.tool.calls.is_empty());
        assert!(s.out.is_empty());
        assert_eq!(s.err, "expected integer (number of bytes)\n");
    }

    #[test]
    fn quit_stops_before_later_lines() {
        let mut daemon = Daemon::new(Recorder::default());
        let mut input = Cursor::new(b"run a\nq\nrun b\n".to_vec());
        let code = daemon.run(&mut input, &mut Vec::new(), &mut Vec::new());

        assert_eq!(code, 0);
        assert_eq!(daemon.tool().calls.len(), 1);
        let mut rest = String::new();
        input.read_to_string(&mut rest).ok();
        assert_eq!(rest, "run b\n");
    }

    #[test]
    fn unknown_lines_are_silent() {
        let s = session(Recorder::default(), b"hello\n\nrun\nquit\nrun  \n");

        assert_eq!(s.code, 0);
        assert_eq!(s.tool.calls, vec![(argv(&[]), Vec::new())]);
        assert_eq!(s.out, "[daemon] Task finished with code 0\n");
    }

    #[test]
    fn arguments_are_tokenized() {
        let s = session(Recorder::default(), b"run -o 'out file' \"a b\"  c\n");
        assert_eq!(s.tool.calls[0].0, argv(&["-o", "out file", "a b", "c"]));
    }

    #[test]
    fn default_program_name_fills_argv0() {
        let mut daemon = Daemon::new(Recorder::default());
        daemon.run(&mut Cursor::new(b"run x\n".to_vec()), &mut Vec::new(), &mut Vec::new());
        assert_eq!(daemon.tool().calls[0].0, ["daemon-mode", "x"]);
    }

    #[test]
    fn options_reset_before_each_run() {
        let s = session(Recorder::default(), b"run a\nin.bytes 0\nrun b\nrun c\n");
        assert_eq!(s.tool.resets, 3);
    }

    #[test]
    fn enabled_statistics_are_printed_and_reset() {
        let tool = Recorder {
            stats: Some(Counter {
                enabled: true,
                count: 0,
            }),
            ..Recorder::default()
        };
        let s = session(tool, b"run a\nrun b\n");

        assert_eq!(s.err, "runs: 1\nruns: 1\n");
        assert_eq!(s.tool.stats.map(|c| c.count), Some(0));
    }

    #[test]
    fn disabled_statistics_stay_untouched() {
        let tool = Recorder {
            stats: Some(Counter {
                enabled: false,
                count: 0,
            }),
            ..Recorder::default()
        };
        let s = session(tool, b"run a\nrun b\n");

        assert!(s.err.is_empty());
        assert_eq!(s.tool.stats.map(|c| c.count), Some(2));
    }

    #[test]
    fn negative_codes_are_reported_verbatim() {
        let tool = Recorder {
            codes: vec![-3],
            ..Recorder::default()
        };
        let s = session(tool, b"run x\n");
        assert_eq!(s.out, "[daemon] Task finished with code -3\n");
    }

    #[test]
    fn context_is_a_snapshot() {
        let mut seen = Vec::new();
        let mut daemon = Daemon::new(|_: &[String], context: InvocationContext| {
            seen.push(context);
            0
        });
        daemon.run(
            &mut Cursor::new(b"in.bytes 1\nArun x\nin.bytes 1\nB".to_vec()),
            &mut Vec::new(),
            &mut Vec::new(),
        );
        drop(daemon);

        assert_eq!(seen, vec![InvocationContext::new(b"A".to_vec())]);
    }
}

use crate::command::{EntryPoint, ExitCode, InvocationContext, Statistics};
use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};
use std::io::{self, BufRead, Read, Write};

/// Status of a `run` naming a tool the toolbox does not have.
const EXIT_NOT_FOUND: ExitCode = 127;

/// Small tools hosted in-process, useful for driving the daemon by hand.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) from the
/// arguments of each `run`, so no option survives from one invocation to the
/// next.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "echo" or "wc".
    fn name() -> &'static str;

    /// Executes the command against the invocation input and the toolbox output.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(self, stdin: &mut dyn BufRead, stdout: &mut dyn Write) -> Result<ExitCode>;
}

#[derive(FromArgs)]
/// write the arguments to standard output, separated by spaces.
/// by default, a trailing newline is printed.
pub struct Echo {
    #[argh(switch, short = 'n')]
    /// do not output the trailing newline.
    pub no_newline: bool,

    #[argh(positional, greedy)]
    /// values to print as-is, separated by spaces.
    pub args: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn execute(self, _stdin: &mut dyn BufRead, stdout: &mut dyn Write) -> Result<ExitCode> {
        let s = self.args.join(" ");
        if self.no_newline {
            write!(stdout, "{}", s)?;
        } else {
            writeln!(stdout, "{}", s)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// copy the pending input to standard output
pub struct Cat {}

impl BuiltinCommand for Cat {
    fn name() -> &'static str {
        "cat"
    }

    fn execute(self, stdin: &mut dyn BufRead, stdout: &mut dyn Write) -> Result<ExitCode> {
        io::copy(stdin, stdout).context("cat: copy failed")?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// count lines, words and bytes of the pending input
pub struct Wc {
    #[argh(switch, short = 'l')]
    /// print only the line count.
    pub lines: bool,
}

impl BuiltinCommand for Wc {
    fn name() -> &'static str {
        "wc"
    }

    fn execute(self, stdin: &mut dyn BufRead, stdout: &mut dyn Write) -> Result<ExitCode> {
        let mut buf = Vec::new();
        stdin.read_to_end(&mut buf)?;
        let text = String::from_utf8_lossy(&buf);
        let lines = text.lines().count();
        if self.lines {
            writeln!(stdout, "{}", lines)?;
        } else {
            let words = text.split_whitespace().count();
            writeln!(stdout, "{} {} {}", lines, words, buf.len())?;
        }
        Ok(0)
    }
}

/// Counters the toolbox keeps for the current run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ToolboxStats {
    enabled: bool,
    invocations: u64,
    input_bytes: u64,
    output_bytes: u64,
}

impl Statistics for ToolboxStats {
    fn enabled(&self) -> bool {
        self.enabled
    }

    fn print(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "invocations: {}", self.invocations)?;
        writeln!(out, "input-bytes: {}", self.input_bytes)?;
        writeln!(out, "output-bytes: {}", self.output_bytes)
    }

    fn reset(&mut self) {
        *self = Self {
            enabled: self.enabled,
            ..Self::default()
        };
    }
}

/// Output wrapper that counts what passes through it.
struct Counting<'a> {
    inner: &'a mut dyn Write,
    written: u64,
}

impl Write for Counting<'_> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(data)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// An [`EntryPoint`] dispatching `argv[1]` to one of the builtins.
///
/// `argv[1]` names the builtin and the remaining arguments are its own.
/// Everything the builtins print goes to the toolbox output.
pub struct Toolbox<W: Write> {
    out: W,
    stats: ToolboxStats,
}

impl<W: Write> Toolbox<W> {
    /// Create a toolbox printing to `out`, with statistics off.
    pub fn new(out: W) -> Self {
        Self {
            out,
            stats: ToolboxStats::default(),
        }
    }

    /// Turn statistics collection on or off.
    pub fn with_statistics(mut self, enabled: bool) -> Self {
        self.stats.enabled = enabled;
        self
    }

    /// Statistics gathered since the last reset.
    pub fn stats(&self) -> &ToolboxStats {
        &self.stats
    }

    /// Give back the output sink.
    pub fn into_output(self) -> W {
        self.out
    }

    fn run_builtin<T: BuiltinCommand>(
        name: &str,
        args: &[&str],
        stdin: &mut dyn BufRead,
        stdout: &mut dyn Write,
    ) -> ExitCode {
        let cmd = match T::from_args(&[name], args) {
            Ok(cmd) => cmd,
            Err(EarlyExit { output, status }) => {
                if let Err(e) = stdout.write_all(output.as_bytes()) {
                    tracing::warn!(error = %e, "toolbox output failed");
                }
                return if status.is_err() { 1 } else { 0 };
            }
        };
        match cmd.execute(stdin, stdout) {
            Ok(code) => code,
            Err(e) => {
                tracing::debug!(tool = name, error = %e, "builtin failed");
                if let Err(e) = writeln!(stdout, "{:#}", e) {
                    tracing::warn!(error = %e, "toolbox output failed");
                }
                1
            }
        }
    }
}

impl<W: Write> EntryPoint for Toolbox<W> {
    fn invoke(&mut self, argv: &[String], context: InvocationContext) -> ExitCode {
        let Some((name, rest)) = argv.get(1..).and_then(|a| a.split_first()) else {
            return 0;
        };
        let args: Vec<&str> = rest.iter().map(String::as_str).collect();

        let mut stdin = context.reader();
        let mut stdout = Counting {
            inner: &mut self.out,
            written: 0,
        };

        let code = match name.as_str() {
            n if n == Echo::name() => Self::run_builtin::<Echo>(n, &args, &mut stdin, &mut stdout),
            n if n == Cat::name() => Self::run_builtin::<Cat>(n, &args, &mut stdin, &mut stdout),
            n if n == Wc::name() => Self::run_builtin::<Wc>(n, &args, &mut stdin, &mut stdout),
            other => {
                if let Err(e) = writeln!(stdout, "{}: command not found", other) {
                    tracing::warn!(error = %e, "toolbox output failed");
                }
                EXIT_NOT_FOUND
            }
        };
        if let Err(e) = stdout.flush() {
            tracing::warn!(error = %e, "toolbox output failed");
        }

        self.stats.invocations += 1;
        self.stats.input_bytes += context.input().len() as u64;
        self.stats.output_bytes += stdout.written;
        code
    }

    fn statistics(&mut self) -> Option<&mut dyn Statistics> {
        Some(&mut self.stats)
    }
}

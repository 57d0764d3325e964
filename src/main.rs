use argh::FromArgs;
use daemon_mode::{DEFAULT_PROGRAM_NAME, Daemon, Toolbox, logging};
use std::io;

#[derive(FromArgs)]
/// Run the builtin toolbox in daemon mode, reading commands from stdin.
struct Args {
    #[argh(option, default = "DEFAULT_PROGRAM_NAME.to_string()")]
    /// name passed as argv[0] to every invocation.
    program_name: String,

    #[argh(switch)]
    /// print per-run statistics to stderr after every invocation.
    stats: bool,
}

fn main() {
    logging::init();
    let args: Args = argh::from_env();

    let toolbox = Toolbox::new(io::stdout()).with_statistics(args.stats);
    let mut daemon = Daemon::new(toolbox).with_program_name(args.program_name);
    let code = daemon.run(&mut io::stdin().lock(), &mut io::stdout(), &mut io::stderr());
    std::process::exit(code);
}

//! The `rsmv` command-line interpreter.
//!
//! Batch mode runs a single reachability query (`--reach`); without one,
//! an interactive loop reads commands from stdin:
//!
//! ```text
//! > read-model counter.smv
//! > check-init
//! > reach c = 10
//! > witness
//! > quit
//! ```

mod session;

use clap::Parser;
use session::Session;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rsmv", version, about = "SAT-based symbolic model checker")]
struct Opts {
    /// Model file to load at startup.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Run a single reachability query and exit.
    #[arg(long)]
    reach: Option<String>,

    /// Constraint applied along forward unrollings (repeatable).
    #[arg(long = "forward")]
    forward: Vec<String>,

    /// Constraint applied along backward unrollings (repeatable).
    #[arg(long = "backward")]
    backward: Vec<String>,

    /// Constraint applied in both directions (repeatable).
    #[arg(long = "constraint")]
    global: Vec<String>,

    /// Strategies to race: all, forward, backward or combined.
    #[arg(long, default_value = "all")]
    strategy: String,

    /// Verbosity; repeat for more detail.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("rsmv={default}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let opts = Opts::parse();
    init_tracing(opts.verbose);

    let mut session = Session::new();

    if let Err(code) = session.set_strategy(&opts.strategy) {
        return code;
    }

    if let Some(path) = &opts.model {
        if !session.read_model(path) {
            return ExitCode::from(2);
        }
    }

    if let Some(target) = &opts.reach {
        let retcode = session.reach(target, &opts.forward, &opts.backward, &opts.global);
        return ExitCode::from(retcode);
    }

    session.repl()
}

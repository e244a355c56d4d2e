use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;

pub const USAGE: &str =
    "usage: parley [--config <PATH>] [--log-level <FILTER>] [--no-stream] <PROVIDER>";

/// Parley: chat with a model that can call tools from a local provider.
#[derive(Parser, Debug)]
#[command(name = "parley", version, about)]
pub struct Args {
    /// Tool provider program (.py, .js, .mjs or .sh).
    pub provider: PathBuf,

    /// Config file path override.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log filter override (e.g. debug, parley=trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Print answers only once complete.
    #[arg(long)]
    pub no_stream: bool,
}

/// Parse the process arguments. Help and version print and exit 0; any
/// other problem prints the one-line usage to stderr and exits 1.
pub fn parse() -> Result<Args, ExitCode> {
    Args::try_parse().map_err(|e| ExitCode::from(report(&e)))
}

/// Print what the user should see and return the exit status.
fn report(e: &clap::Error) -> u8 {
    match e.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = e.print();
            0
        }
        _ => {
            eprintln!("{USAGE}");
            1
        }
    }
}

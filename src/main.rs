pub mod config;
pub mod coordinator;
pub mod counter;
pub mod ring;
pub mod shutdown;
pub mod validate;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use flexi_logger::Logger;

#[derive(Parser)]
#[command(name = "pc-batch", about = "Batch perfect-clear solver")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Enumerate every piece sequence and persist the solved ones.
    ///
    /// Height, thread count, and output path are build-time constants; an
    /// interrupted run resumes from its checkpoint.
    Solve,
    /// Check solution files and report their counts.
    Validate { paths: Vec<PathBuf> },
}

fn main() -> anyhow::Result<()> {
    let _logger = Logger::try_with_env_or_str("info")?.start()?;

    match Cli::parse().command {
        Command::Solve => coordinator::run_solve(),
        Command::Validate { paths } => validate::run(&paths),
    }
}

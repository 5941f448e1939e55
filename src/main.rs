mod cli;
mod execute;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;
use crate::cli::CLI;

/// Overrides the log filter, e.g. `STENCIL_LOG=stencil=trace`.
const LOG_ENV: &str = "STENCIL_LOG";

fn init_logging(debug: bool) {
    let default = if debug { "stencil=debug" } else { "stencil=info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn main() {
    let cli = CLI::parse();
    init_logging(cli.debug);
    let debug = cli.debug;
    let code = match execute::execute(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            if debug {
                eprintln!("{:?}", e);
            }
            1
        }
    };
    std::process::exit(code);
}

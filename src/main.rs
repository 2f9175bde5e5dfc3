//! vendorchat CLI
//!
//! Loads the configuration, installs logging, runs one command and exits
//! with a deterministic code.

use clap::Parser;
use vendorchat::cli::{init_logging, run_cli, Args, EXIT_FAILURE};
use vendorchat::config::Config;

fn main() {
    let args = Args::parse();

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(EXIT_FAILURE);
        }
    };

    let guard = match init_logging(args.log_level.as_deref(), &config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(EXIT_FAILURE);
        }
    };

    let exit_code = run_cli(args, &config);
    drop(guard);
    std::process::exit(exit_code);
}

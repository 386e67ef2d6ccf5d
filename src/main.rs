mod builtins;
mod config;
mod error;
mod exec;
mod input;
mod jobs;
mod parser;
mod pipeline;
mod redirect;
mod shell;
mod signals;
mod supervisor;
mod utils;

use config::{Config, Invocation, LOG_ENV};
use std::env;
use tracing_subscriber::EnvFilter;

fn main() {
    // Parse command-line arguments.
    let config = match Config::from_args(env::args().skip(1)) {
        Invocation::Run(config) => config,
        Invocation::Usage => utils::print_usage(),
    };

    init_logging(&config);

    // Install signal handlers.
    if let Err(e) = signals::install_signal_handlers() {
        utils::error(&e);
    }

    // Run the main shell loop with the options.
    if let Err(e) = shell::run_shell(&config) {
        utils::error(&e);
    }
}

/// Diagnostics go to stderr. `TISH_LOG` overrides the level picked from `-v`.
fn init_logging(config: &Config) {
    let default = if config.verbose { "tish=debug" } else { "tish=warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

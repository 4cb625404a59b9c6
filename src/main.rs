//! Pipeworks CLI - content pipeline project controller
//!
//! Command-line front end for editing and building content projects.

use clap::Parser;
use env_logger::Env;
use log::debug;
use tracing_subscriber::EnvFilter;

use pipeworks::cli::{commands, Cli};
use pipeworks::PipelineError;

fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };

    // Initialize logger
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    // Build supervision reports through tracing
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .try_init();

    debug!("Pipeworks v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = commands::run(cli) {
        eprintln!("Error: {:#}", e);
        if let Some(hint) = e
            .downcast_ref::<PipelineError>()
            .and_then(PipelineError::recovery_suggestion)
        {
            eprintln!("Hint: {}", hint);
        }
        std::process::exit(1);
    }
}

mod cli;
mod completion;
mod config;
mod dispatch;
mod render;

#[cfg(test)]
mod tests;

use std::process::ExitCode;

use clap::Parser;
use ccmup_core::find_install_error;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::dispatch::run_cli;
use crate::render::TerminalRenderer;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run_cli(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            TerminalRenderer::current().print_error(&format!("{err:#}"));
            ExitCode::from(exit_status_for(&err))
        }
    }
}

/// Categorized failures keep their distinct status; anything else is a generic failure.
pub(crate) fn exit_status_for(err: &anyhow::Error) -> u8 {
    find_install_error(err)
        .and_then(|install_error| u8::try_from(install_error.exit_code()).ok())
        .unwrap_or(1)
}

pub(crate) fn default_log_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

fn init_logging(verbosity: u8) {
    let rust_log_set = std::env::var("RUST_LOG").is_ok_and(|value| !value.trim().is_empty());
    let filter = if verbosity == 0 && rust_log_set {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(default_log_directive(verbosity))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

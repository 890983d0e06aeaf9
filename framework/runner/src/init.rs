use crate::cli::StressCli;
use clap::Parser;

/// Initialise logging and parse the CLI for the stress orchestrator.
pub fn init() -> StressCli {
    env_logger::init();

    StressCli::parse()
}

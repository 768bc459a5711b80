//! Defier CLI entry point.

use clap::Parser;

use defier::cli::{handle_error, Cli};
use defier::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    let config = match defier::cli::load_config(&cli) {
        Ok(config) => config,
        Err(err) => handle_error(err, json),
    };

    // Held for the whole run so buffered file logs are flushed on exit.
    let _logger = match LoggerImpl::init(&LogConfig::from(&config.logging)) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, json),
    };

    if let Err(err) = defier::cli::run(cli, config).await {
        handle_error(err, json);
    }
}

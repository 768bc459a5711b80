//! Command-line interface.

pub mod commands;
pub mod output;
pub mod session;
pub mod types;

pub use session::Session;
pub use types::{Cli, Commands};

use anyhow::Result;
use console::style;

use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

/// Load the configuration the CLI runs with: an explicit file, or the
/// project directory layered with environment overrides.
pub fn load_config(cli: &Cli) -> Result<Config> {
    match cli.config {
        Some(ref path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Dispatch a parsed command line.
///
/// `init` runs without a participant; every other command opens a session.
pub async fn run(cli: Cli, config: Config) -> Result<()> {
    let json = cli.json;
    match cli.command {
        Commands::Init(args) => commands::init::execute(args, json).await,
        command => {
            let session = Session::open(&config, cli.actor).await?;
            execute(command, &session, json).await
        }
    }
}

/// Run one command against an open session.
pub async fn execute(command: Commands, session: &Session, json: bool) -> Result<()> {
    match command {
        Commands::Init(args) => commands::init::execute(args, json).await,
        Commands::Enroll(args) => commands::roster::enroll(args, session, json).await,
        Commands::Unenroll => commands::roster::unenroll(session, json).await,
        Commands::Join(args) => commands::roster::join(args, session, json).await,
        Commands::Opponents { block } => commands::invite::opponents(&block, session, json).await,
        Commands::Invite(args) => commands::invite::execute(args, session, json).await,
        Commands::Defy(args) => commands::defy::execute(args, session, json).await,
        Commands::Standings => commands::standings::standings(session, json).await,
        Commands::Leaderboard(args) => commands::standings::leaderboard(args, session, json).await,
    }
}

/// Report a failed command and exit with status 1.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let body = serde_json::json!({
            "success": false,
            "error": format!("{err:#}"),
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {err:#}", style("error:").red().bold());
    }
    std::process::exit(1)
}

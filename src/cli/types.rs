//! CLI type definitions
//!
//! This module contains the top-level clap structures; each command's own
//! arguments live next to its implementation in `commands`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::commands::defy::DefyArgs;
use super::commands::init::InitArgs;
use super::commands::invite::InviteArgs;
use super::commands::roster::{EnrollArgs, JoinArgs};
use super::commands::standings::LeaderboardArgs;

#[derive(Parser, Debug)]
#[command(name = "defier")]
#[command(about = "Defier - pairwise skill challenges for course blocks", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Participant to act as
    #[arg(long = "as", global = true, env = "DEFIER_USER", value_name = "NAME")]
    pub actor: Option<String>,

    /// Configuration file (defaults to .defier/config.yaml plus overrides)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize Defier configuration and database
    Init(InitArgs),

    /// Enroll the participant in the course
    Enroll(EnrollArgs),

    /// Remove the participant and all of its block memberships
    Unenroll,

    /// Join one block, or every configured block
    Join(JoinArgs),

    /// List participants that can be challenged in a block
    Opponents {
        /// Block id
        block: String,
    },

    /// Send, accept, reject and list invitations
    Invite(InviteArgs),

    /// Play and inspect defies
    Defy(DefyArgs),

    /// Show the participant's standings in every block
    Standings,

    /// Show the ranking of a block
    Leaderboard(LeaderboardArgs),
}

//! Read-only views: a participant's standings and a block leaderboard.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::cli::output::{format_score, list_table, output, render_list, CommandOutput};
use crate::cli::Session;
use crate::domain::models::{ParticipantStats, ScoreVector};
use crate::services::{LeaderboardEntry, Standings};

#[derive(Args, Debug)]
pub struct LeaderboardArgs {
    /// Block id
    pub block: String,
}

#[derive(Debug, Serialize)]
pub struct StandingsOutput {
    pub participant: String,
    pub stats: ParticipantStats,
    pub wins_required: u32,
    pub blocks: Vec<BlockStandingOutput>,
}

#[derive(Debug, Serialize)]
pub struct BlockStandingOutput {
    pub block: String,
    pub joined: bool,
    pub activated: bool,
    pub done: bool,
    pub wins: u32,
    pub lost: u32,
    pub score: Option<ScoreVector>,
    pub progress: u32,
}

impl StandingsOutput {
    fn new(standings: Standings, wins_required: u32) -> Self {
        let blocks = standings
            .blocks
            .into_iter()
            .map(|b| match b.membership {
                Some(m) => BlockStandingOutput {
                    block: b.block_id,
                    joined: true,
                    activated: m.activated,
                    done: m.done,
                    wins: m.wins,
                    lost: m.lost,
                    score: Some(m.score),
                    progress: b.progress,
                },
                None => BlockStandingOutput {
                    block: b.block_id,
                    joined: false,
                    activated: false,
                    done: false,
                    wins: 0,
                    lost: 0,
                    score: None,
                    progress: b.progress,
                },
            })
            .collect();

        Self {
            participant: standings.participant.name,
            stats: standings.participant.stats,
            wins_required,
            blocks,
        }
    }
}

impl CommandOutput for StandingsOutput {
    fn to_human(&self) -> String {
        let s = &self.stats;
        let mut lines = vec![
            format!("Participant: {}", self.participant),
            format!(
                "Total: {} points, {} won, {} lost ({} attempts, {} fails, {} hints)",
                s.score, s.wins, s.lost, s.attempts, s.fails, s.hints
            ),
            String::new(),
        ];

        let mut table = list_table(&["block", "wins", "lost", "score", "progress", "status"]);
        for b in &self.blocks {
            let status = if !b.joined {
                "not joined"
            } else if b.done {
                "done"
            } else if b.activated {
                "playing"
            } else {
                "joined"
            };
            table.add_row(vec![
                b.block.clone(),
                format!("{}/{}", b.wins, self.wins_required),
                b.lost.to_string(),
                b.score.as_ref().map_or_else(|| "-".to_string(), format_score),
                format!("{}%", b.progress),
                status.to_string(),
            ]);
        }
        lines.push(table.to_string());
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct LeaderboardOutput {
    pub block: String,
    pub entries: Vec<LeaderboardEntry>,
}

impl CommandOutput for LeaderboardOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["#", "participant", "points", "wins", "lost", "progress"]);
        for e in &self.entries {
            table.add_row(vec![
                e.rank.to_string(),
                if e.done { format!("{} *", e.name) } else { e.name.clone() },
                e.points.to_string(),
                e.wins.to_string(),
                e.lost.to_string(),
                format!("{}%", e.progress),
            ]);
        }
        render_list(("participant", "participants"), &table, self.entries.len())
    }
}

pub async fn standings(session: &Session, json_mode: bool) -> Result<()> {
    let ctx = &session.ctx;
    let standings = session.roster.standings(ctx).await?;
    output(&StandingsOutput::new(standings, ctx.wins_required()), json_mode);
    Ok(())
}

pub async fn leaderboard(args: LeaderboardArgs, session: &Session, json_mode: bool) -> Result<()> {
    let entries = session.roster.block_leaderboard(&session.ctx, &args.block).await?;
    output(
        &LeaderboardOutput {
            block: args.block,
            entries,
        },
        json_mode,
    );
    Ok(())
}

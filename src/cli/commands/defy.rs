//! Defy commands: list, show, and play.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use crate::cli::output::{
    colorize_state, format_score, list_table, output, render_list, short_id, CommandOutput,
};
use crate::cli::Session;
use crate::domain::models::{AnswerEvent, Defy, DefySide, EndSignal, ScoreVector};
use crate::services::FinalizeOutcome;

#[derive(Args, Debug)]
pub struct DefyArgs {
    #[command(subcommand)]
    pub command: DefyCommands,
}

#[derive(Subcommand, Debug)]
pub enum DefyCommands {
    /// List defies in a block
    List {
        /// Block id
        #[arg(short, long)]
        block: String,
        /// Include finished defies
        #[arg(long)]
        all: bool,
    },
    /// Show defy details
    Show {
        /// Defy ID
        id: Uuid,
    },
    /// Record the round the participant is playing
    Round {
        /// Defy ID
        id: Uuid,
        /// Round number, starting at 1
        round: u32,
    },
    /// Record an answered exercise
    Answer {
        /// Defy ID (read from the event location when omitted)
        id: Option<Uuid>,
        /// Attempt number, 1 for a first-try answer
        #[arg(short, long, required_unless_present = "event")]
        attempt: Option<u32>,
        /// Hints used
        #[arg(long, default_value = "0")]
        hints: u32,
        /// Raw answer event as JSON (attemptNumber, hintsUsed, location)
        #[arg(long, conflicts_with_all = ["attempt", "hints"])]
        event: Option<String>,
    },
    /// Signal that the participant finished playing
    End {
        /// Defy ID
        id: Uuid,
    },
    /// Score a defy both sides have ended
    Finalize {
        /// Defy ID
        id: Uuid,
    },
}

#[derive(Debug, Serialize)]
pub struct SideOutput {
    pub name: String,
    pub round: u32,
    pub ended: bool,
    pub score: ScoreVector,
}

impl From<&DefySide> for SideOutput {
    fn from(side: &DefySide) -> Self {
        Self {
            name: side.name.clone(),
            round: side.round,
            ended: side.ended,
            score: side.score,
        }
    }
}

/// A defy from the point of view of the participant looking at it.
#[derive(Debug, Serialize)]
pub struct DefyOutput {
    pub id: String,
    pub block: String,
    pub state: String,
    pub outcome: Option<String>,
    /// Which side the viewer plays, when it plays one
    pub side: Option<String>,
    pub right: SideOutput,
    pub left: SideOutput,
    pub created_at: String,
}

impl DefyOutput {
    pub fn new(defy: &Defy, viewer: &str) -> Self {
        Self {
            id: defy.id.to_string(),
            block: defy.block_id.clone(),
            state: defy.state().as_str().to_string(),
            outcome: defy.outcome.map(|o| o.as_str().to_string()),
            side: defy.side_of(viewer).map(|s| s.as_str().to_string()),
            right: SideOutput::from(&defy.right),
            left: SideOutput::from(&defy.left),
            created_at: defy.created_at.to_rfc3339(),
        }
    }
}

impl CommandOutput for DefyOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Defy: {}", self.id),
            format!("Block: {}", self.block),
            format!("State: {}", colorize_state(&self.state)),
        ];
        if let Some(ref outcome) = self.outcome {
            lines.push(format!("Outcome: {}", colorize_state(outcome)));
        }
        if let Some(ref side) = self.side {
            lines.push(format!("You play: {side}"));
        }
        for (label, side) in [("Right", &self.right), ("Left", &self.left)] {
            lines.push(format!(
                "{label}: {} (round {}, {}) {}",
                side.name,
                side.round,
                if side.ended { "ended" } else { "playing" },
                format_score(&side.score)
            ));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct DefyListOutput {
    pub block: String,
    pub defies: Vec<DefyOutput>,
}

impl CommandOutput for DefyListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "right", "left", "state", "outcome"]);
        for defy in &self.defies {
            table.add_row(vec![
                defy.id.chars().take(8).collect::<String>(),
                format!("{} {}", defy.right.name, format_score(&defy.right.score)),
                format!("{} {}", defy.left.name, format_score(&defy.left.score)),
                colorize_state(&defy.state).to_string(),
                defy.outcome.clone().unwrap_or_else(|| "-".to_string()),
            ]);
        }
        render_list(("defy", "defies"), &table, self.defies.len())
    }
}

#[derive(Debug, Serialize)]
pub struct DefyActionOutput {
    pub success: bool,
    pub message: String,
    pub defy: Option<DefyOutput>,
}

impl CommandOutput for DefyActionOutput {
    fn to_human(&self) -> String {
        match self.defy {
            Some(ref defy) => format!("{}\n\n{}", self.message, defy.to_human()),
            None => self.message.clone(),
        }
    }
}

pub async fn execute(args: DefyArgs, session: &Session, json_mode: bool) -> Result<()> {
    let ctx = &session.ctx;
    let service = &session.defies;

    match args.command {
        DefyCommands::List { block, all } => {
            let defies = session.matchmaking.list_defies(ctx, &block, all).await?;
            let out = DefyListOutput {
                defies: defies.iter().map(|d| DefyOutput::new(d, &ctx.actor)).collect(),
                block,
            };
            output(&out, json_mode);
        }

        DefyCommands::Show { id } => {
            let view = service.get_defy(ctx, id).await?;
            output(&DefyOutput::new(&view.defy, &ctx.actor), json_mode);
        }

        DefyCommands::Round { id, round } => {
            let defy = service.submit_round(ctx, id, round).await?;
            output(
                &DefyActionOutput {
                    success: true,
                    message: format!("Round {round} recorded for defy {}", short_id(&id)),
                    defy: Some(DefyOutput::new(&defy, &ctx.actor)),
                },
                json_mode,
            );
        }

        DefyCommands::Answer { id, attempt, hints, event } => {
            let answer = match event {
                Some(ref payload) => AnswerEvent::from_json(payload)?,
                None => AnswerEvent::new(
                    attempt.context("--attempt is required unless --event is given")?,
                    hints,
                ),
            };
            let defy = match id {
                Some(id) => service.submit_answer(ctx, id, &answer).await?,
                None => service.submit_answer_event(ctx, &answer).await?,
            };
            output(
                &DefyActionOutput {
                    success: true,
                    message: format!("Answer recorded for defy {}", short_id(&defy.id)),
                    defy: Some(DefyOutput::new(&defy, &ctx.actor)),
                },
                json_mode,
            );
        }

        DefyCommands::End { id } => {
            let report = service.signal_end(ctx, id).await?;
            let message = match (report.signal, report.outcome) {
                (_, Some(outcome)) => format!("Defy finished: {}", outcome.as_str()),
                (EndSignal::AlreadyEnded, None) => "You had already ended this defy".to_string(),
                (_, None) => "Ended. Waiting for the opponent to finish".to_string(),
            };
            output(
                &DefyActionOutput {
                    success: true,
                    message,
                    defy: Some(DefyOutput::new(&report.defy, &ctx.actor)),
                },
                json_mode,
            );
        }

        DefyCommands::Finalize { id } => {
            let message = match service.finalize(ctx, id).await? {
                FinalizeOutcome::Finalized(outcome) => format!("Defy finalized: {}", outcome.as_str()),
                FinalizeOutcome::AlreadyFinalized(outcome) => {
                    format!("Defy was already finalized: {}", outcome.as_str())
                }
            };
            let view = service.get_defy(ctx, id).await?;
            output(
                &DefyActionOutput {
                    success: true,
                    message,
                    defy: Some(DefyOutput::new(&view.defy, &ctx.actor)),
                },
                json_mode,
            );
        }
    }

    Ok(())
}

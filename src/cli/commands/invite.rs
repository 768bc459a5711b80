//! Matchmaking commands: `opponents` and `invite`.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use super::defy::DefyOutput;
use crate::cli::output::{list_table, output, render_list, CommandOutput};
use crate::cli::Session;
use crate::services::{AcceptOutcome, InviteOutcome};

#[derive(Args, Debug)]
pub struct InviteArgs {
    #[command(subcommand)]
    pub command: InviteCommands,
}

#[derive(Subcommand, Debug)]
pub enum InviteCommands {
    /// Invite a participant to a defy
    Send {
        /// Participant to challenge
        to: String,
        /// Block id
        #[arg(short, long)]
        block: String,
    },
    /// Accept an invitation, creating the defy
    Accept {
        /// Participant who sent the invitation
        from: String,
        /// Block id
        #[arg(short, long)]
        block: String,
    },
    /// Reject an invitation
    Reject {
        /// Participant who sent the invitation
        from: String,
        /// Block id
        #[arg(short, long)]
        block: String,
    },
    /// List pending invitations in a block
    List {
        /// Block id
        #[arg(short, long)]
        block: String,
    },
}

#[derive(Debug, Serialize)]
pub struct OpponentsOutput {
    pub block: String,
    pub opponents: Vec<String>,
}

impl CommandOutput for OpponentsOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["opponent"]);
        for name in &self.opponents {
            table.add_row(vec![name]);
        }
        render_list(("opponent", "opponents"), &table, self.opponents.len())
    }
}

#[derive(Debug, Serialize)]
pub struct InviteListOutput {
    pub block: String,
    pub incoming: Vec<String>,
    pub outgoing: Vec<String>,
}

impl CommandOutput for InviteListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["participant", "direction"]);
        for name in &self.incoming {
            table.add_row(vec![name.as_str(), "incoming"]);
        }
        for name in &self.outgoing {
            table.add_row(vec![name.as_str(), "outgoing"]);
        }
        render_list(
            ("invitation", "invitations"),
            &table,
            self.incoming.len() + self.outgoing.len(),
        )
    }
}

#[derive(Debug, Serialize)]
pub struct InviteActionOutput {
    pub success: bool,
    pub status: String,
    pub message: String,
    pub defy: Option<DefyOutput>,
}

impl CommandOutput for InviteActionOutput {
    fn to_human(&self) -> String {
        match self.defy {
            Some(ref defy) => format!("{}\n\n{}", self.message, defy.to_human()),
            None => self.message.clone(),
        }
    }
}

pub async fn opponents(block: &str, session: &Session, json_mode: bool) -> Result<()> {
    let pool = session.matchmaking.eligible_opponents(&session.ctx, block).await?;
    output(
        &OpponentsOutput {
            block: block.to_string(),
            opponents: pool.to_vec(),
        },
        json_mode,
    );
    Ok(())
}

pub async fn execute(args: InviteArgs, session: &Session, json_mode: bool) -> Result<()> {
    let ctx = &session.ctx;
    let service = &session.matchmaking;

    match args.command {
        InviteCommands::Send { to, block } => {
            let outcome = service.send_invite(ctx, &to, &block).await?;
            let message = match outcome {
                InviteOutcome::Sent => format!("Invited {to} in block {block}"),
                InviteOutcome::AlreadyPending => {
                    format!("An invitation between you and {to} is already pending")
                }
                InviteOutcome::NotEligible => {
                    format!("{to} cannot be challenged in block {block}")
                }
            };
            output(
                &InviteActionOutput {
                    success: outcome == InviteOutcome::Sent,
                    status: outcome.as_str().to_string(),
                    message,
                    defy: None,
                },
                json_mode,
            );
        }

        InviteCommands::Accept { from, block } => {
            let out = match service.accept_invite(ctx, &from, &block).await? {
                AcceptOutcome::Created(defy) => InviteActionOutput {
                    success: true,
                    status: "created".to_string(),
                    message: format!("Defy against {from} created"),
                    defy: Some(DefyOutput::new(&defy, &ctx.actor)),
                },
                AcceptOutcome::NoPendingInvite => InviteActionOutput {
                    success: false,
                    status: "no_pending_invite".to_string(),
                    message: format!("No pending invitation from {from} in block {block}"),
                    defy: None,
                },
                AcceptOutcome::NotEligible => InviteActionOutput {
                    success: false,
                    status: "not_eligible".to_string(),
                    message: format!("A defy with {from} cannot be started in block {block}"),
                    defy: None,
                },
            };
            output(&out, json_mode);
        }

        InviteCommands::Reject { from, block } => {
            let rejected = service.reject_invite(ctx, &from, &block).await?;
            let message = if rejected {
                format!("Rejected invitation from {from}")
            } else {
                format!("No pending invitation from {from} in block {block}")
            };
            output(
                &InviteActionOutput {
                    success: rejected,
                    status: if rejected { "rejected" } else { "no_pending_invite" }.to_string(),
                    message,
                    defy: None,
                },
                json_mode,
            );
        }

        InviteCommands::List { block } => {
            let (incoming, outgoing) = futures::try_join!(
                service.list_incoming_invites(ctx, &block),
                service.list_outgoing_invites(ctx, &block),
            )?;
            output(
                &InviteListOutput {
                    block,
                    incoming,
                    outgoing,
                },
                json_mode,
            );
        }
    }

    Ok(())
}

//! Enrollment commands: `enroll`, `unenroll` and `join`.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::cli::Session;

#[derive(Args, Debug)]
pub struct EnrollArgs {
    /// Also join every configured block
    #[arg(long)]
    pub join: bool,
}

#[derive(Args, Debug)]
pub struct JoinArgs {
    /// Block id (all configured blocks when omitted)
    #[arg(short, long)]
    pub block: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RosterActionOutput {
    pub success: bool,
    pub message: String,
    pub participant: String,
    pub blocks: Vec<String>,
}

impl CommandOutput for RosterActionOutput {
    fn to_human(&self) -> String {
        if self.blocks.is_empty() {
            return self.message.clone();
        }
        format!("{}\nBlocks: {}", self.message, self.blocks.join(", "))
    }
}

pub async fn enroll(args: EnrollArgs, session: &Session, json_mode: bool) -> Result<()> {
    let ctx = &session.ctx;
    let enrollment = session.roster.enroll(ctx).await?;

    let blocks = if args.join {
        session
            .roster
            .join_all_blocks(ctx)
            .await?
            .into_iter()
            .map(|m| m.block_id)
            .collect()
    } else {
        Vec::new()
    };

    let message = if enrollment.newly_enrolled {
        format!("Enrolled {} in course {}", ctx.actor, ctx.course.name)
    } else {
        format!("{} is already enrolled in course {}", ctx.actor, ctx.course.name)
    };
    output(
        &RosterActionOutput {
            success: true,
            message,
            participant: enrollment.participant.name,
            blocks,
        },
        json_mode,
    );
    Ok(())
}

pub async fn unenroll(session: &Session, json_mode: bool) -> Result<()> {
    let ctx = &session.ctx;
    let removed = session.roster.unenroll(ctx).await?;

    let message = if removed {
        format!("Unenrolled {}", ctx.actor)
    } else {
        format!("{} was not enrolled", ctx.actor)
    };
    output(
        &RosterActionOutput {
            success: removed,
            message,
            participant: ctx.actor.clone(),
            blocks: Vec::new(),
        },
        json_mode,
    );
    Ok(())
}

pub async fn join(args: JoinArgs, session: &Session, json_mode: bool) -> Result<()> {
    let ctx = &session.ctx;
    let memberships = match args.block {
        Some(ref block) => vec![session.roster.ensure_membership(ctx, block).await?],
        None => session.roster.join_all_blocks(ctx).await?,
    };

    output(
        &RosterActionOutput {
            success: true,
            message: format!("{} joined {} block(s)", ctx.actor, memberships.len()),
            participant: ctx.actor.clone(),
            blocks: memberships.into_iter().map(|m| m.block_id).collect(),
        },
        json_mode,
    );
    Ok(())
}

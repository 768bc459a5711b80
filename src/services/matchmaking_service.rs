//! Matchmaking: who may be challenged, and the invite handshake that creates defies.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;
use tracing::{debug, info};

use super::{RetryPolicy, Store};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{BoardBlock, Defy, RequestContext};
use crate::domain::ports::DefyFilter;

/// Result of [`MatchmakingService::send_invite`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteOutcome {
    Sent,
    /// One of the two already invited the other; nothing changed.
    AlreadyPending,
    /// Missing membership, self-invite, or the pair already has an open defy.
    NotEligible,
}

impl InviteOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::AlreadyPending => "already_pending",
            Self::NotEligible => "not_eligible",
        }
    }
}

/// Result of [`MatchmakingService::accept_invite`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "defy", rename_all = "snake_case")]
pub enum AcceptOutcome {
    Created(Defy),
    /// No such invitation (never sent, or already accepted or rejected).
    NoPendingInvite,
    NotEligible,
}

/// Snapshot of everything needed to decide who `participant` may challenge in a block.
///
/// [`OpponentPool::iter`] filters lazily and can be restarted any number of
/// times; it yields names in group enumeration order.
#[derive(Debug, Clone, Default)]
pub struct OpponentPool {
    participant: String,
    members: Vec<String>,
    engaged: HashSet<String>,
    pending: BTreeSet<String>,
    paired: HashSet<String>,
}

impl OpponentPool {
    fn empty(participant: &str) -> Self {
        Self {
            participant: participant.to_string(),
            ..Self::default()
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.members
            .iter()
            .map(String::as_str)
            .filter(move |name| self.admits(name))
    }

    /// True if `name` is an eligible opponent.
    pub fn contains(&self, name: &str) -> bool {
        self.members.iter().any(|m| m == name) && self.admits(name)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.iter().map(str::to_string).collect()
    }

    fn admits(&self, name: &str) -> bool {
        name != self.participant
            && self.engaged.contains(name)
            && !self.pending.contains(name)
            && !self.paired.contains(name)
    }
}

pub struct MatchmakingService {
    store: Store,
    retry: RetryPolicy,
}

impl MatchmakingService {
    pub fn new(store: Store, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Group members the acting participant may challenge in `block_id`.
    ///
    /// Excluded: the participant itself, anyone without a membership in the
    /// block, anyone with a pending invitation either way, and anyone already
    /// sharing an unresolved defy in the block.
    pub async fn eligible_opponents(&self, ctx: &RequestContext, block_id: &str) -> DomainResult<OpponentPool> {
        let board_block = self.store.board_block(ctx, block_id).await?;

        let Some(own) = self.store.memberships.get(&ctx.actor, block_id).await? else {
            return Ok(OpponentPool::empty(&ctx.actor));
        };

        let group = self
            .store
            .groups
            .get_by_name(&ctx.course.name)
            .await?
            .ok_or_else(|| DomainError::GroupNotFound(ctx.course.name.clone()))?;

        let (members, block_members, open_defies) = futures::try_join!(
            self.store.participants.list_group_members(group.id),
            self.store.memberships.list_for_block(block_id),
            self.store.defies.list_for_board_block(
                board_block.id,
                DefyFilter::for_participant(ctx.actor.clone()).unresolved()
            ),
        )?;

        let paired = open_defies
            .iter()
            .filter_map(|d| d.opponent_of(&ctx.actor))
            .map(str::to_string)
            .collect();

        Ok(OpponentPool {
            participant: ctx.actor.clone(),
            members: members.into_iter().map(|p| p.name).collect(),
            engaged: block_members.into_iter().map(|m| m.participant_name).collect(),
            pending: own.outgoing_invites.union(&own.incoming_invites).cloned().collect(),
            paired,
        })
    }

    /// Invite `to` to a defy in `block_id`.
    pub async fn send_invite(&self, ctx: &RequestContext, to: &str, block_id: &str) -> DomainResult<InviteOutcome> {
        let board_block = self.store.board_block(ctx, block_id).await?;
        self.retry
            .execute("send_invite", || self.send_invite_once(ctx, to, &board_block))
            .await
    }

    async fn send_invite_once(&self, ctx: &RequestContext, to: &str, board_block: &BoardBlock) -> DomainResult<InviteOutcome> {
        let from = ctx.actor.as_str();
        let block_id = board_block.block_id.as_str();
        if from == to {
            return Ok(InviteOutcome::NotEligible);
        }

        let (Some(mut sender), Some(mut receiver)) = (
            self.store.memberships.get(from, block_id).await?,
            self.store.memberships.get(to, block_id).await?,
        ) else {
            debug!(from, to, block_id, "invite without membership");
            return Ok(InviteOutcome::NotEligible);
        };

        if sender.has_pending_invite_with(to) {
            return Ok(InviteOutcome::AlreadyPending);
        }

        let open = self
            .store
            .defies
            .list_for_board_block(board_block.id, DefyFilter::for_participant(from).unresolved())
            .await?;
        if open.iter().any(|d| d.pairs(from, to)) {
            return Ok(InviteOutcome::NotEligible);
        }

        sender.add_outgoing(to);
        receiver.add_incoming(from);
        self.store.memberships.update_pair(&sender, &receiver).await?;

        info!(from, to, block_id, "invite sent");
        Ok(InviteOutcome::Sent)
    }

    /// Accept the invitation `inviter` sent to the acting participant.
    ///
    /// This is the only way a defy comes into existence: the inviter plays
    /// right, the accepter left.
    pub async fn accept_invite(&self, ctx: &RequestContext, inviter: &str, block_id: &str) -> DomainResult<AcceptOutcome> {
        let board_block = self.store.board_block(ctx, block_id).await?;
        self.retry
            .execute("accept_invite", || self.accept_invite_once(ctx, inviter, &board_block))
            .await
    }

    async fn accept_invite_once(&self, ctx: &RequestContext, inviter: &str, board_block: &BoardBlock) -> DomainResult<AcceptOutcome> {
        let accepter = ctx.actor.as_str();
        let block_id = board_block.block_id.as_str();

        let Some(mut accepter_m) = self.store.memberships.get(accepter, block_id).await? else {
            return Ok(AcceptOutcome::NotEligible);
        };
        if !accepter_m.remove_incoming(inviter) {
            return Ok(AcceptOutcome::NoPendingInvite);
        }

        // Both halves of the invitation must still exist.
        let inviter_m = self.store.memberships.get(inviter, block_id).await?;
        let mut inviter_m = match inviter_m.and_then(|mut m| m.remove_outgoing(accepter).then_some(m)) {
            Some(m) => m,
            None => {
                self.store.memberships.update(&accepter_m).await?;
                debug!(accepter, inviter, block_id, "dropped stale invite");
                return Ok(AcceptOutcome::NoPendingInvite);
            }
        };
        accepter_m.activate();
        inviter_m.activate();

        let defy = Defy::new(board_block.id, block_id, inviter, accepter);
        self.store
            .defies
            .create_from_invite(&accepter_m, &inviter_m, &defy)
            .await?;

        info!(defy_id = %defy.id, right = inviter, left = accepter, block_id, "defy created");
        Ok(AcceptOutcome::Created(defy))
    }

    /// Decline the invitation `inviter` sent. Returns false if there was none.
    pub async fn reject_invite(&self, ctx: &RequestContext, inviter: &str, block_id: &str) -> DomainResult<bool> {
        if ctx.course.block(block_id).is_none() {
            return Err(DomainError::BlockNotConfigured(block_id.to_string()));
        }
        self.retry
            .execute("reject_invite", || self.reject_invite_once(ctx, inviter, block_id))
            .await
    }

    async fn reject_invite_once(&self, ctx: &RequestContext, inviter: &str, block_id: &str) -> DomainResult<bool> {
        let Some(mut rejecter_m) = self.store.memberships.get(&ctx.actor, block_id).await? else {
            return Ok(false);
        };
        if !rejecter_m.remove_incoming(inviter) {
            return Ok(false);
        }

        match self.store.memberships.get(inviter, block_id).await? {
            Some(mut inviter_m) => {
                inviter_m.remove_outgoing(&ctx.actor);
                self.store.memberships.update_pair(&rejecter_m, &inviter_m).await?;
            }
            // The inviter unenrolled; just drop the stale entry.
            None => self.store.memberships.update(&rejecter_m).await?,
        }

        info!(rejecter = %ctx.actor, inviter, block_id, "invite rejected");
        Ok(true)
    }

    /// Names waiting for the acting participant's answer.
    pub async fn list_incoming_invites(&self, ctx: &RequestContext, block_id: &str) -> DomainResult<Vec<String>> {
        Ok(self
            .store
            .memberships
            .get(&ctx.actor, block_id)
            .await?
            .map(|m| m.incoming_invites.into_iter().collect())
            .unwrap_or_default())
    }

    /// Names the acting participant invited that have not answered yet.
    pub async fn list_outgoing_invites(&self, ctx: &RequestContext, block_id: &str) -> DomainResult<Vec<String>> {
        Ok(self
            .store
            .memberships
            .get(&ctx.actor, block_id)
            .await?
            .map(|m| m.outgoing_invites.into_iter().collect())
            .unwrap_or_default())
    }

    /// Unresolved defies of the acting participant in `block_id`.
    pub async fn list_active_challenges(&self, ctx: &RequestContext, block_id: &str) -> DomainResult<Vec<Defy>> {
        self.list_defies(ctx, block_id, false).await
    }

    pub async fn list_defies(&self, ctx: &RequestContext, block_id: &str, include_resolved: bool) -> DomainResult<Vec<Defy>> {
        let board_block = self.store.board_block(ctx, block_id).await?;
        let mut filter = DefyFilter::for_participant(ctx.actor.clone());
        filter.unresolved_only = !include_resolved;
        self.store.defies.list_for_board_block(board_block.id, filter).await
    }
}

//! Roster service: enrollment, block memberships and standings.

use serde::Serialize;
use tracing::info;

use super::{RetryPolicy, Store};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    BlockMembership, Board, BoardBlock, Group, Participant, RequestContext,
};

/// Result of [`RosterService::enroll`].
#[derive(Debug, Clone, Serialize)]
pub struct Enrollment {
    pub participant: Participant,
    /// False when the participant was already enrolled.
    pub newly_enrolled: bool,
}

/// One configured block as seen by a participant.
#[derive(Debug, Clone, Serialize)]
pub struct BlockStanding {
    pub block_id: String,
    /// `None` until the participant first interacts with the block.
    pub membership: Option<BlockMembership>,
    pub progress: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Standings {
    pub participant: Participant,
    pub blocks: Vec<BlockStanding>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub name: String,
    pub points: u32,
    pub wins: u32,
    pub lost: u32,
    pub done: bool,
    pub progress: u32,
}

pub struct RosterService {
    store: Store,
    retry: RetryPolicy,
}

impl RosterService {
    pub fn new(store: Store, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Enroll the acting participant in the course.
    ///
    /// Creates the course group, the participant and the course board with one
    /// board block per configured block, each only if missing.
    pub async fn enroll(&self, ctx: &RequestContext) -> DomainResult<Enrollment> {
        if ctx.actor.trim().is_empty() {
            return Err(DomainError::ValidationFailed("participant name cannot be empty".to_string()));
        }

        let group = self.retry.execute("ensure_group", || self.ensure_group(ctx)).await?;
        let enrollment = self
            .retry
            .execute("enroll", || self.enroll_once(ctx, &group))
            .await?;
        let board = self.retry.execute("ensure_board", || self.ensure_board(ctx)).await?;

        if enrollment.newly_enrolled {
            info!(participant = %ctx.actor, course = %group.name, board_id = %board.id, "participant enrolled");
        }
        Ok(enrollment)
    }

    async fn ensure_group(&self, ctx: &RequestContext) -> DomainResult<Group> {
        if let Some(group) = self.store.groups.get_by_name(&ctx.course.name).await? {
            return Ok(group);
        }
        let group = Group::new(ctx.course.name.clone());
        self.store.groups.create(&group).await?;
        Ok(group)
    }

    async fn enroll_once(&self, ctx: &RequestContext, group: &Group) -> DomainResult<Enrollment> {
        if let Some(mut participant) = self.store.participants.get_by_name(&ctx.actor).await? {
            if !participant.in_group(group.id) {
                self.store.participants.add_to_group(participant.id, group.id).await?;
                participant.groups.push(group.id);
            }
            return Ok(Enrollment {
                participant,
                newly_enrolled: false,
            });
        }

        let participant = Participant::new(ctx.actor.clone(), group.id);
        self.store.participants.create(&participant).await?;
        Ok(Enrollment {
            participant,
            newly_enrolled: true,
        })
    }

    async fn ensure_board(&self, ctx: &RequestContext) -> DomainResult<Board> {
        if let Some(board) = self.store.boards.get_by_name(&ctx.course.name).await? {
            for block_id in ctx.course.block_ids() {
                self.store.boards.add_block(&BoardBlock::new(board.id, block_id)).await?;
            }
            return Ok(board);
        }

        let board = Board::new(ctx.course.name.clone());
        let blocks: Vec<_> = ctx
            .course
            .block_ids()
            .map(|block_id| BoardBlock::new(board.id, block_id))
            .collect();
        self.store.boards.create(&board, &blocks).await?;
        Ok(board)
    }

    /// Remove the acting participant and all of its block memberships.
    ///
    /// Pending invitations to or from the participant are dropped from every
    /// other membership of the same blocks, in the same transaction. Returns
    /// false if there was nothing to remove.
    pub async fn unenroll(&self, ctx: &RequestContext) -> DomainResult<bool> {
        self.retry.execute("unenroll", || self.unenroll_once(ctx)).await
    }

    async fn unenroll_once(&self, ctx: &RequestContext) -> DomainResult<bool> {
        let Some(participant) = self.store.participants.get_by_name(&ctx.actor).await? else {
            return Ok(false);
        };

        let mut peers = Vec::new();
        for membership in self.store.memberships.list_for_participant(&ctx.actor).await? {
            for mut peer in self.store.memberships.list_for_block(&membership.block_id).await? {
                if peer.participant_id != participant.id && peer.forget_invites_with(&ctx.actor) {
                    peers.push(peer);
                }
            }
        }

        let removed = match self.store.memberships.remove_participant(participant.id, &peers).await {
            Ok(removed) => removed,
            // Lost a race with another unenroll.
            Err(e) if e.is_not_found() => return Ok(false),
            Err(e) => return Err(e),
        };

        info!(
            participant = %ctx.actor,
            memberships = removed,
            invites_dropped = peers.len(),
            "participant unenrolled"
        );
        Ok(true)
    }

    /// The acting participant's membership in `block_id`, created on first use.
    pub async fn ensure_membership(&self, ctx: &RequestContext, block_id: &str) -> DomainResult<BlockMembership> {
        if ctx.course.block(block_id).is_none() {
            return Err(DomainError::BlockNotConfigured(block_id.to_string()));
        }
        self.retry
            .execute("ensure_membership", || self.ensure_membership_once(ctx, block_id))
            .await
    }

    async fn ensure_membership_once(&self, ctx: &RequestContext, block_id: &str) -> DomainResult<BlockMembership> {
        let participant = self
            .store
            .participants
            .get_by_name(&ctx.actor)
            .await?
            .ok_or_else(|| DomainError::ParticipantNotFound(ctx.actor.clone()))?;

        if let Some(membership) = self.store.memberships.get(&ctx.actor, block_id).await? {
            return Ok(membership);
        }

        let membership = BlockMembership::new(participant.id, participant.name, block_id);
        self.store.memberships.create(&membership).await?;
        info!(participant = %ctx.actor, block_id, "joined block");
        Ok(membership)
    }

    /// Join every configured block.
    pub async fn join_all_blocks(&self, ctx: &RequestContext) -> DomainResult<Vec<BlockMembership>> {
        let mut memberships = Vec::with_capacity(ctx.course.blocks.len());
        for block_id in ctx.course.block_ids() {
            memberships.push(self.ensure_membership(ctx, block_id).await?);
        }
        Ok(memberships)
    }

    pub async fn has_memberships(&self, ctx: &RequestContext) -> DomainResult<bool> {
        Ok(!self.store.memberships.list_for_participant(&ctx.actor).await?.is_empty())
    }

    /// Aggregates of the acting participant plus one row per configured block.
    pub async fn standings(&self, ctx: &RequestContext) -> DomainResult<Standings> {
        let participant = self
            .store
            .participants
            .get_by_name(&ctx.actor)
            .await?
            .ok_or_else(|| DomainError::ParticipantNotFound(ctx.actor.clone()))?;

        let mut memberships = self.store.memberships.list_for_participant(&ctx.actor).await?;
        let wins_required = ctx.wins_required();

        let blocks = ctx
            .course
            .block_ids()
            .map(|block_id| {
                let membership = memberships
                    .iter()
                    .position(|m| m.block_id == block_id)
                    .map(|i| memberships.swap_remove(i));
                BlockStanding {
                    block_id: block_id.to_string(),
                    progress: membership.as_ref().map_or(0, |m| m.progress_percent(wins_required)),
                    membership,
                }
            })
            .collect();

        Ok(Standings { participant, blocks })
    }

    /// Everyone in `block_id`, best first: points, then wins, then fewest losses.
    pub async fn block_leaderboard(&self, ctx: &RequestContext, block_id: &str) -> DomainResult<Vec<LeaderboardEntry>> {
        if ctx.course.block(block_id).is_none() {
            return Err(DomainError::BlockNotConfigured(block_id.to_string()));
        }

        let mut memberships = self.store.memberships.list_for_block(block_id).await?;
        memberships.sort_by(|a, b| {
            b.score
                .points
                .cmp(&a.score.points)
                .then(b.wins.cmp(&a.wins))
                .then(a.lost.cmp(&b.lost))
                .then_with(|| a.participant_name.cmp(&b.participant_name))
        });

        let wins_required = ctx.wins_required();
        Ok(memberships
            .into_iter()
            .enumerate()
            .map(|(i, m)| LeaderboardEntry {
                rank: i + 1,
                progress: m.progress_percent(wins_required),
                name: m.participant_name,
                points: m.score.points,
                wins: m.wins,
                lost: m.lost,
                done: m.done,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ScoreVector;
    use crate::services::testing::{context, store};

    async fn setup() -> (RosterService, Store) {
        let store = store().await;
        (RosterService::new(store.clone(), RetryPolicy::default()), store)
    }

    #[tokio::test]
    async fn test_enroll_is_idempotent() {
        let (roster, store) = setup().await;
        let ctx = context("alice");

        let first = roster.enroll(&ctx).await.unwrap();
        assert!(first.newly_enrolled);
        let second = roster.enroll(&ctx).await.unwrap();
        assert!(!second.newly_enrolled);
        assert_eq!(first.participant.id, second.participant.id);

        let board = store.boards.get_by_name(&ctx.course.name).await.unwrap().unwrap();
        let blocks = store.boards.list_blocks(board.id).await.unwrap();
        assert_eq!(blocks.len(), ctx.course.blocks.len());
    }

    #[tokio::test]
    async fn test_enroll_rejects_blank_name() {
        let (roster, _) = setup().await;
        let err = roster.enroll(&context("  ")).await.unwrap_err();
        assert!(matches!(err, DomainError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn test_memberships_are_lazy_and_unique() {
        let (roster, _) = setup().await;
        let ctx = context("alice");
        roster.enroll(&ctx).await.unwrap();
        assert!(!roster.has_memberships(&ctx).await.unwrap());

        let a = roster.ensure_membership(&ctx, "intro").await.unwrap();
        let b = roster.ensure_membership(&ctx, "intro").await.unwrap();
        assert_eq!(a.id, b.id);
        assert!(roster.has_memberships(&ctx).await.unwrap());

        let all = roster.join_all_blocks(&ctx).await.unwrap();
        assert_eq!(all.len(), 2);

        let err = roster.ensure_membership(&ctx, "nope").await.unwrap_err();
        assert!(matches!(err, DomainError::BlockNotConfigured(_)));
    }

    #[tokio::test]
    async fn test_membership_requires_enrollment() {
        let (roster, _) = setup().await;
        let err = roster.ensure_membership(&context("ghost"), "intro").await.unwrap_err();
        assert!(matches!(err, DomainError::ParticipantNotFound(_)));
    }

    #[tokio::test]
    async fn test_unenroll_cascades() {
        let (roster, store) = setup().await;
        let ctx = context("alice");
        roster.enroll(&ctx).await.unwrap();
        roster.join_all_blocks(&ctx).await.unwrap();

        assert!(roster.unenroll(&ctx).await.unwrap());
        assert!(store.participants.get_by_name("alice").await.unwrap().is_none());
        assert!(store.memberships.list_for_participant("alice").await.unwrap().is_empty());
        assert!(!roster.unenroll(&ctx).await.unwrap());
    }

    #[tokio::test]
    async fn test_unenroll_drops_invites_held_by_others() {
        let (roster, store) = setup().await;
        for name in ["alice", "bob", "carol"] {
            let ctx = context(name);
            roster.enroll(&ctx).await.unwrap();
            roster.ensure_membership(&ctx, "intro").await.unwrap();
        }

        let mut alice = store.memberships.get("alice", "intro").await.unwrap().unwrap();
        let mut bob = store.memberships.get("bob", "intro").await.unwrap().unwrap();
        let mut carol = store.memberships.get("carol", "intro").await.unwrap().unwrap();
        alice.add_outgoing("bob");
        bob.add_incoming("alice");
        store.memberships.update_pair(&alice, &bob).await.unwrap();
        carol.add_outgoing("alice");
        carol.add_outgoing("bob");
        store.memberships.update(&carol).await.unwrap();

        assert!(roster.unenroll(&context("alice")).await.unwrap());

        let bob = store.memberships.get("bob", "intro").await.unwrap().unwrap();
        assert!(bob.incoming_invites.is_empty());
        let carol = store.memberships.get("carol", "intro").await.unwrap().unwrap();
        assert_eq!(carol.outgoing_invites.iter().collect::<Vec<_>>(), vec!["bob"]);
    }

    #[tokio::test]
    async fn test_standings_and_leaderboard() {
        let (roster, store) = setup().await;
        for name in ["alice", "bob", "carol"] {
            let ctx = context(name);
            roster.enroll(&ctx).await.unwrap();
            roster.ensure_membership(&ctx, "intro").await.unwrap();
        }

        let mut bob = store.memberships.get("bob", "intro").await.unwrap().unwrap();
        bob.apply_result(&ScoreVector::new(50, 1, 0, 0), true, 3);
        store.memberships.update(&bob).await.unwrap();
        let mut carol = store.memberships.get("carol", "intro").await.unwrap().unwrap();
        carol.apply_result(&ScoreVector::new(20, 3, 2, 0), false, 3);
        store.memberships.update(&carol).await.unwrap();

        let board = roster.block_leaderboard(&context("alice"), "intro").await.unwrap();
        let names: Vec<_> = board.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["bob", "alice", "carol"]);
        assert_eq!(board[0].rank, 1);
        assert_eq!(board[0].progress, 33);

        let standings = roster.standings(&context("bob")).await.unwrap();
        assert_eq!(standings.blocks.len(), 2);
        assert_eq!(standings.blocks[0].block_id, "intro");
        assert_eq!(standings.blocks[0].progress, 33);
        assert!(standings.blocks[1].membership.is_none());
    }
}

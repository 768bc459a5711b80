//! Service layer: the engine operations, written against the repository ports.

pub mod defy_service;
pub mod matchmaking_service;
pub mod retry;
pub mod roster_service;
pub mod scoring;

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::adapters::sqlite::{
    SqliteBoardRepository, SqliteDefyRepository, SqliteGroupRepository,
    SqliteMembershipRepository, SqliteParticipantRepository,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Board, BoardBlock, RequestContext};
use crate::domain::ports::{
    BoardRepository, DefyRepository, GroupRepository, MembershipRepository, ParticipantRepository,
};

pub use defy_service::{DefyService, DefyView, EndReport, FinalizeOutcome};
pub use matchmaking_service::{AcceptOutcome, InviteOutcome, MatchmakingService, OpponentPool};
pub use retry::RetryPolicy;
pub use roster_service::{BlockStanding, Enrollment, LeaderboardEntry, RosterService, Standings};
pub use scoring::{answer_delta, score_answer, OrderedTieBreak, WinnerRule};

/// Handles to every record store the services use.
#[derive(Clone)]
pub struct Store {
    pub groups: Arc<dyn GroupRepository>,
    pub participants: Arc<dyn ParticipantRepository>,
    pub memberships: Arc<dyn MembershipRepository>,
    pub boards: Arc<dyn BoardRepository>,
    pub defies: Arc<dyn DefyRepository>,
}

impl Store {
    pub fn sqlite(pool: SqlitePool) -> Self {
        Self {
            groups: Arc::new(SqliteGroupRepository::new(pool.clone())),
            participants: Arc::new(SqliteParticipantRepository::new(pool.clone())),
            memberships: Arc::new(SqliteMembershipRepository::new(pool.clone())),
            boards: Arc::new(SqliteBoardRepository::new(pool.clone())),
            defies: Arc::new(SqliteDefyRepository::new(pool)),
        }
    }

    pub(crate) async fn course_board(&self, ctx: &RequestContext) -> DomainResult<Board> {
        self.boards
            .get_by_name(&ctx.course.name)
            .await?
            .ok_or_else(|| DomainError::BoardBlockNotFound(ctx.course.name.clone()))
    }

    /// The board block for `block_id` in the caller's course.
    pub(crate) async fn board_block(&self, ctx: &RequestContext, block_id: &str) -> DomainResult<BoardBlock> {
        if ctx.course.block(block_id).is_none() {
            return Err(DomainError::BlockNotConfigured(block_id.to_string()));
        }
        let board = self.course_board(ctx).await?;
        self.boards
            .get_block(board.id, block_id)
            .await?
            .ok_or_else(|| DomainError::BoardBlockNotFound(block_id.to_string()))
    }
}

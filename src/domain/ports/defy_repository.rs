//! Defy port, including the two multi-record atomic commits the engine relies on.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{BlockMembership, Defy, Participant};

/// Filter criteria for listing the defies of a board block.
#[derive(Debug, Clone, Default)]
pub struct DefyFilter {
    /// Only defies where this participant plays either side.
    pub participant: Option<String>,
    /// Drop defies that reached `BothEnded`.
    pub unresolved_only: bool,
}

impl DefyFilter {
    pub fn for_participant(name: impl Into<String>) -> Self {
        Self {
            participant: Some(name.into()),
            unresolved_only: false,
        }
    }

    pub fn unresolved(mut self) -> Self {
        self.unresolved_only = true;
        self
    }
}

/// Repository interface for defy persistence.
#[async_trait]
pub trait DefyRepository: Send + Sync {
    /// Get a defy by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Defy>>;

    /// Optimistic single-record update (version checked).
    async fn update(&self, defy: &Defy) -> DomainResult<()>;

    /// Defies of a board block, oldest first.
    async fn list_for_board_block(&self, board_block_id: Uuid, filter: DefyFilter) -> DomainResult<Vec<Defy>>;

    /// Accept an invitation: write both memberships (invite sets already
    /// updated by the caller) and insert the new defy, all or nothing.
    async fn create_from_invite(
        &self,
        accepter: &BlockMembership,
        inviter: &BlockMembership,
        defy: &Defy,
    ) -> DomainResult<()>;

    /// Persist a scored defy together with every aggregate it touches.
    ///
    /// All rows are version checked inside one transaction; on any conflict
    /// nothing is written and `ConcurrencyConflict` is returned.
    async fn commit_finalization(
        &self,
        defy: &Defy,
        memberships: &[BlockMembership],
        participants: &[Participant],
    ) -> DomainResult<()>;
}

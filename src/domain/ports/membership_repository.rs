//! Block membership port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::BlockMembership;

/// Repository interface for per-block participant state.
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Insert a membership. Fails if the participant already has one for the block.
    async fn create(&self, membership: &BlockMembership) -> DomainResult<()>;

    /// Get the membership of `participant` in `block_id`.
    async fn get(&self, participant: &str, block_id: &str) -> DomainResult<Option<BlockMembership>>;

    /// Optimistic single-record update (version checked).
    async fn update(&self, membership: &BlockMembership) -> DomainResult<()>;

    /// Update two memberships atomically, both version checked.
    async fn update_pair(&self, first: &BlockMembership, second: &BlockMembership) -> DomainResult<()>;

    /// All memberships of a participant, in block creation order.
    async fn list_for_participant(&self, participant: &str) -> DomainResult<Vec<BlockMembership>>;

    /// All memberships in a block.
    async fn list_for_block(&self, block_id: &str) -> DomainResult<Vec<BlockMembership>>;

    /// Remove a participant in one transaction.
    ///
    /// `peers` are other participants' memberships with invitations to or from
    /// the leaving participant already dropped; each is version checked. Then
    /// the participant's memberships and the participant row are deleted.
    /// Returns how many memberships were removed, or `ParticipantNotFound` if
    /// the participant is already gone.
    async fn remove_participant(&self, participant_id: Uuid, peers: &[BlockMembership]) -> DomainResult<u64>;
}

//! Matchmaking board port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Board, BoardBlock};

#[async_trait]
pub trait BoardRepository: Send + Sync {
    /// Create a board and its blocks in one transaction.
    async fn create(&self, board: &Board, blocks: &[BoardBlock]) -> DomainResult<()>;

    async fn get_by_name(&self, name: &str) -> DomainResult<Option<Board>>;

    /// Add a block to an existing board. No-op if the block is already present.
    async fn add_block(&self, block: &BoardBlock) -> DomainResult<()>;

    async fn get_block(&self, board_id: Uuid, block_id: &str) -> DomainResult<Option<BoardBlock>>;

    async fn list_blocks(&self, board_id: Uuid) -> DomainResult<Vec<BoardBlock>>;
}

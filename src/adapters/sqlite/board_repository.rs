//! SQLite implementation of the BoardRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{parse_datetime, parse_uuid};
use crate::domain::errors::DomainResult;
use crate::domain::models::{Board, BoardBlock};
use crate::domain::ports::BoardRepository;

#[derive(Clone)]
pub struct SqliteBoardRepository {
    pool: SqlitePool,
}

impl SqliteBoardRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BoardRepository for SqliteBoardRepository {
    async fn create(&self, board: &Board, blocks: &[BoardBlock]) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO boards (id, name, created_at) VALUES (?, ?, ?)")
            .bind(board.id.to_string())
            .bind(&board.name)
            .bind(board.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;

        for block in blocks {
            sqlx::query("INSERT INTO board_blocks (id, board_id, block_id) VALUES (?, ?, ?)")
                .bind(block.id.to_string())
                .bind(block.board_id.to_string())
                .bind(&block.block_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_by_name(&self, name: &str) -> DomainResult<Option<Board>> {
        let row: Option<(String, String, String)> =
            sqlx::query_as("SELECT id, name, created_at FROM boards WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(id, name, created_at)| {
            Ok(Board {
                id: parse_uuid(&id)?,
                name,
                created_at: parse_datetime(&created_at)?,
            })
        })
        .transpose()
    }

    async fn add_block(&self, block: &BoardBlock) -> DomainResult<()> {
        sqlx::query("INSERT OR IGNORE INTO board_blocks (id, board_id, block_id) VALUES (?, ?, ?)")
            .bind(block.id.to_string())
            .bind(block.board_id.to_string())
            .bind(&block.block_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_block(&self, board_id: Uuid, block_id: &str) -> DomainResult<Option<BoardBlock>> {
        let row: Option<BoardBlockRow> = sqlx::query_as(
            "SELECT id, board_id, block_id FROM board_blocks WHERE board_id = ? AND block_id = ?",
        )
        .bind(board_id.to_string())
        .bind(block_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.try_into()).transpose()
    }

    async fn list_blocks(&self, board_id: Uuid) -> DomainResult<Vec<BoardBlock>> {
        let rows: Vec<BoardBlockRow> = sqlx::query_as(
            "SELECT id, board_id, block_id FROM board_blocks WHERE board_id = ? ORDER BY rowid",
        )
        .bind(board_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }
}

#[derive(sqlx::FromRow)]
struct BoardBlockRow {
    id: String,
    board_id: String,
    block_id: String,
}

impl TryFrom<BoardBlockRow> for BoardBlock {
    type Error = crate::domain::errors::DomainError;

    fn try_from(row: BoardBlockRow) -> Result<Self, Self::Error> {
        Ok(BoardBlock {
            id: parse_uuid(&row.id)?,
            board_id: parse_uuid(&row.board_id)?,
            block_id: row.block_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;

    #[tokio::test]
    async fn test_board_with_blocks() {
        let pool = create_migrated_test_pool().await.unwrap();
        let repo = SqliteBoardRepository::new(pool);

        let board = Board::new("course-a");
        let blocks = vec![
            BoardBlock::new(board.id, "intro"),
            BoardBlock::new(board.id, "loops"),
        ];
        repo.create(&board, &blocks).await.unwrap();

        let found = repo.get_by_name("course-a").await.unwrap().unwrap();
        assert_eq!(found.id, board.id);

        let loops = repo.get_block(board.id, "loops").await.unwrap().unwrap();
        assert_eq!(loops.id, blocks[1].id);
        assert!(repo.get_block(board.id, "missing").await.unwrap().is_none());

        // Adding an existing block is a no-op.
        repo.add_block(&BoardBlock::new(board.id, "intro")).await.unwrap();
        repo.add_block(&BoardBlock::new(board.id, "recursion")).await.unwrap();
        let ids: Vec<_> = repo
            .list_blocks(board.id)
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.block_id)
            .collect();
        assert_eq!(ids, vec!["intro", "loops", "recursion"]);
    }
}

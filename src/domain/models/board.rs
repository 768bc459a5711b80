//! Matchmaking board: one per course, one board block per content block.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub id: Uuid,
    /// Course namespace this board belongs to.
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Board {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// Owns the list of defies created for a single block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardBlock {
    pub id: Uuid,
    pub board_id: Uuid,
    pub block_id: String,
}

impl BoardBlock {
    pub fn new(board_id: Uuid, block_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            board_id,
            block_id: block_id.into(),
        }
    }
}

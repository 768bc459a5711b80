//! Domain errors for the defier challenge engine.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors that can occur while running challenges.
///
/// The variants fall into three families that callers handle differently:
/// - not-found errors are rendered as "not eligible" or ignored,
/// - invalid-state errors are rejected actions on a defy,
/// - concurrency conflicts mean a whole read-modify-write must be retried.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Participant not found: {0}")]
    ParticipantNotFound(String),

    #[error("Group not found: {0}")]
    GroupNotFound(String),

    #[error("Block membership not found: {participant} in block {block_id}")]
    MembershipNotFound { participant: String, block_id: String },

    #[error("Board block not found: {0}")]
    BoardBlockNotFound(String),

    #[error("Block is not configured for this course: {0}")]
    BlockNotConfigured(String),

    #[error("Defy not found: {0}")]
    DefyNotFound(Uuid),

    #[error("Cannot {action} defy {defy_id} in state {state}")]
    InvalidState {
        defy_id: Uuid,
        state: String,
        action: String,
    },

    #[error("{participant} is not a side of defy {defy_id}")]
    NotADefySide { defy_id: Uuid, participant: String },

    #[error("Concurrency conflict: {entity} {id} was modified")]
    ConcurrencyConflict { entity: String, id: String },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    pub fn conflict(entity: &str, id: impl ToString) -> Self {
        Self::ConcurrencyConflict {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// True for errors that mean "the referenced record does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ParticipantNotFound(_)
                | Self::GroupNotFound(_)
                | Self::MembershipNotFound { .. }
                | Self::BoardBlockNotFound(_)
                | Self::BlockNotConfigured(_)
                | Self::DefyNotFound(_)
        )
    }

    /// True when the operation lost a race and must be re-run from a fresh read.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState { .. } | Self::NotADefySide { .. })
    }
}

/// SQLite result codes that mean another writer got there first.
///
/// 5/6 and their extended forms are BUSY/LOCKED; 2067 and 1555 are
/// UNIQUE and PRIMARY KEY violations from two racing inserts.
const CONFLICT_CODES: [&str; 7] = ["5", "6", "261", "262", "517", "2067", "1555"];

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        let code = err
            .as_database_error()
            .and_then(|db| db.code())
            .map(|c| c.into_owned());
        match code {
            Some(code) if CONFLICT_CODES.contains(&code.as_str()) => Self::ConcurrencyConflict {
                entity: "database".to_string(),
                id: format!("sqlite code {code}"),
            },
            _ => Self::DatabaseError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

//! SQLite implementation of the DefyRepository.

use async_trait::async_trait;
use sqlx::{Executor, Sqlite, SqlitePool};
use uuid::Uuid;

use super::membership_repository::update_membership;
use super::participant_repository::update_participant;
use super::{parse_counter, parse_datetime, parse_json, parse_optional_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{BlockMembership, Defy, DefyOutcome, DefySide, Participant, ScoreVector};
use crate::domain::ports::{DefyFilter, DefyRepository};

const DEFY_COLUMNS: &str = "id, board_block_id, block_id, right_name, left_name, right_round, left_round, right_ended, left_ended, right_score, left_score, right_last_activity, left_last_activity, outcome, finalized_at, created_at, updated_at, version";

#[derive(Clone)]
pub struct SqliteDefyRepository {
    pool: SqlitePool,
}

impl SqliteDefyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DefyRepository for SqliteDefyRepository {
    async fn get(&self, id: Uuid) -> DomainResult<Option<Defy>> {
        let row: Option<DefyRow> = sqlx::query_as(&format!("SELECT {DEFY_COLUMNS} FROM defies WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.try_into()).transpose()
    }

    async fn update(&self, defy: &Defy) -> DomainResult<()> {
        update_defy(&self.pool, defy).await
    }

    async fn list_for_board_block(&self, board_block_id: Uuid, filter: DefyFilter) -> DomainResult<Vec<Defy>> {
        let mut query = format!("SELECT {DEFY_COLUMNS} FROM defies WHERE board_block_id = ?");
        let mut bindings: Vec<String> = vec![board_block_id.to_string()];

        if let Some(participant) = &filter.participant {
            query.push_str(" AND (right_name = ? OR left_name = ?)");
            bindings.push(participant.clone());
            bindings.push(participant.clone());
        }

        if filter.unresolved_only {
            query.push_str(" AND status <> 'both_ended'");
        }

        query.push_str(" ORDER BY created_at, rowid");

        let mut q = sqlx::query_as::<_, DefyRow>(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }

        let rows: Vec<DefyRow> = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn create_from_invite(
        &self,
        accepter: &BlockMembership,
        inviter: &BlockMembership,
        defy: &Defy,
    ) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;
        update_membership(&mut *tx, accepter).await?;
        update_membership(&mut *tx, inviter).await?;
        insert_defy(&mut *tx, defy).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn commit_finalization(
        &self,
        defy: &Defy,
        memberships: &[BlockMembership],
        participants: &[Participant],
    ) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;
        update_defy(&mut *tx, defy).await?;
        for membership in memberships {
            update_membership(&mut *tx, membership).await?;
        }
        for participant in participants {
            update_participant(&mut *tx, participant).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

async fn insert_defy<'e, E>(executor: E, defy: &Defy) -> DomainResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"INSERT INTO defies (id, board_block_id, block_id, status, right_name, left_name,
           right_round, left_round, right_ended, left_ended, right_score, left_score,
           right_last_activity, left_last_activity, outcome, finalized_at, created_at, updated_at, version)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(defy.id.to_string())
    .bind(defy.board_block_id.to_string())
    .bind(&defy.block_id)
    .bind(defy.state().as_str())
    .bind(&defy.right.name)
    .bind(&defy.left.name)
    .bind(i64::from(defy.right.round))
    .bind(i64::from(defy.left.round))
    .bind(defy.right.ended)
    .bind(defy.left.ended)
    .bind(serde_json::to_string(&defy.right.score)?)
    .bind(serde_json::to_string(&defy.left.score)?)
    .bind(defy.right.last_activity.map(|t| t.to_rfc3339()))
    .bind(defy.left.last_activity.map(|t| t.to_rfc3339()))
    .bind(defy.outcome.map(|o| o.as_str()))
    .bind(defy.finalized_at.map(|t| t.to_rfc3339()))
    .bind(defy.created_at.to_rfc3339())
    .bind(defy.updated_at.to_rfc3339())
    .bind(i64::from(defy.version))
    .execute(executor)
    .await?;

    Ok(())
}

async fn update_defy<'e, E>(executor: E, defy: &Defy) -> DomainResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"UPDATE defies SET status = ?, right_round = ?, left_round = ?, right_ended = ?, left_ended = ?,
           right_score = ?, left_score = ?, right_last_activity = ?, left_last_activity = ?,
           outcome = ?, finalized_at = ?, updated_at = ?, version = version + 1
           WHERE id = ? AND version = ?"#,
    )
    .bind(defy.state().as_str())
    .bind(i64::from(defy.right.round))
    .bind(i64::from(defy.left.round))
    .bind(defy.right.ended)
    .bind(defy.left.ended)
    .bind(serde_json::to_string(&defy.right.score)?)
    .bind(serde_json::to_string(&defy.left.score)?)
    .bind(defy.right.last_activity.map(|t| t.to_rfc3339()))
    .bind(defy.left.last_activity.map(|t| t.to_rfc3339()))
    .bind(defy.outcome.map(|o| o.as_str()))
    .bind(defy.finalized_at.map(|t| t.to_rfc3339()))
    .bind(defy.updated_at.to_rfc3339())
    .bind(defy.id.to_string())
    .bind(i64::from(defy.version))
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DomainError::conflict("defy", defy.id));
    }
    Ok(())
}

#[derive(sqlx::FromRow)]
struct DefyRow {
    id: String,
    board_block_id: String,
    block_id: String,
    right_name: String,
    left_name: String,
    right_round: i64,
    left_round: i64,
    right_ended: bool,
    left_ended: bool,
    right_score: String,
    left_score: String,
    right_last_activity: Option<String>,
    left_last_activity: Option<String>,
    outcome: Option<String>,
    finalized_at: Option<String>,
    created_at: String,
    updated_at: String,
    version: i64,
}

impl TryFrom<DefyRow> for Defy {
    type Error = DomainError;

    fn try_from(row: DefyRow) -> Result<Self, Self::Error> {
        let right_score: ScoreVector = parse_json(&row.right_score)?;
        let left_score: ScoreVector = parse_json(&row.left_score)?;

        let outcome = row
            .outcome
            .map(|s| {
                DefyOutcome::from_str(&s)
                    .ok_or_else(|| DomainError::SerializationError(format!("Invalid outcome: {s}")))
            })
            .transpose()?;

        Ok(Defy {
            id: parse_uuid(&row.id)?,
            board_block_id: parse_uuid(&row.board_block_id)?,
            block_id: row.block_id,
            right: DefySide {
                name: row.right_name,
                round: parse_counter(row.right_round, "right_round")?,
                ended: row.right_ended,
                score: right_score,
                last_activity: parse_optional_datetime(row.right_last_activity)?,
            },
            left: DefySide {
                name: row.left_name,
                round: parse_counter(row.left_round, "left_round")?,
                ended: row.left_ended,
                score: left_score,
                last_activity: parse_optional_datetime(row.left_last_activity)?,
            },
            outcome,
            finalized_at: parse_optional_datetime(row.finalized_at)?,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
            version: parse_counter(row.version, "version")?,
        })
    }
}

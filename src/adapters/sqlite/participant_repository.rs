//! SQLite implementation of the roster repositories.

use async_trait::async_trait;
use sqlx::{Executor, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{parse_counter, parse_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Group, Participant, ParticipantStats};
use crate::domain::ports::{GroupRepository, ParticipantRepository};

const PARTICIPANT_COLUMNS: &str =
    "id, name, score, attempts, fails, hints, wins, lost, created_at, updated_at, version";

#[derive(Clone)]
pub struct SqliteGroupRepository {
    pool: SqlitePool,
}

impl SqliteGroupRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GroupRepository for SqliteGroupRepository {
    async fn create(&self, group: &Group) -> DomainResult<()> {
        sqlx::query("INSERT INTO course_groups (id, name, created_at) VALUES (?, ?, ?)")
            .bind(group.id.to_string())
            .bind(&group.name)
            .bind(group.created_at.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_by_name(&self, name: &str) -> DomainResult<Option<Group>> {
        let row: Option<(String, String, String)> =
            sqlx::query_as("SELECT id, name, created_at FROM course_groups WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(id, name, created_at)| {
            Ok(Group {
                id: parse_uuid(&id)?,
                name,
                created_at: parse_datetime(&created_at)?,
            })
        })
        .transpose()
    }
}

#[derive(Clone)]
pub struct SqliteParticipantRepository {
    pool: SqlitePool,
}

impl SqliteParticipantRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_groups(&self, participant_id: &str) -> DomainResult<Vec<Uuid>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT group_id FROM participant_groups WHERE participant_id = ? ORDER BY seq",
        )
        .bind(participant_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|(id,)| parse_uuid(id)).collect()
    }

    async fn hydrate(&self, row: ParticipantRow) -> DomainResult<Participant> {
        let groups = self.load_groups(&row.id).await?;
        row.into_participant(groups)
    }
}

#[async_trait]
impl ParticipantRepository for SqliteParticipantRepository {
    async fn create(&self, participant: &Participant) -> DomainResult<()> {
        participant.validate().map_err(DomainError::ValidationFailed)?;

        let mut tx = self.pool.begin().await?;
        let stats = &participant.stats;
        sqlx::query(
            r#"INSERT INTO participants (id, name, score, attempts, fails, hints, wins, lost, created_at, updated_at, version)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(participant.id.to_string())
        .bind(&participant.name)
        .bind(i64::from(stats.score))
        .bind(i64::from(stats.attempts))
        .bind(i64::from(stats.fails))
        .bind(i64::from(stats.hints))
        .bind(i64::from(stats.wins))
        .bind(i64::from(stats.lost))
        .bind(participant.created_at.to_rfc3339())
        .bind(participant.updated_at.to_rfc3339())
        .bind(i64::from(participant.version))
        .execute(&mut *tx)
        .await?;

        for group_id in &participant.groups {
            sqlx::query("INSERT INTO participant_groups (participant_id, group_id) VALUES (?, ?)")
                .bind(participant.id.to_string())
                .bind(group_id.to_string())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Participant>> {
        let row: Option<ParticipantRow> =
            sqlx::query_as(&format!("SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE id = ?"))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn get_by_name(&self, name: &str) -> DomainResult<Option<Participant>> {
        let row: Option<ParticipantRow> =
            sqlx::query_as(&format!("SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE name = ?"))
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn update(&self, participant: &Participant) -> DomainResult<()> {
        update_participant(&self.pool, participant).await
    }

    async fn add_to_group(&self, participant_id: Uuid, group_id: Uuid) -> DomainResult<()> {
        sqlx::query("INSERT OR IGNORE INTO participant_groups (participant_id, group_id) VALUES (?, ?)")
            .bind(participant_id.to_string())
            .bind(group_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM participants WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ParticipantNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn list_group_members(&self, group_id: Uuid) -> DomainResult<Vec<Participant>> {
        let rows: Vec<ParticipantRow> = sqlx::query_as(
            r#"SELECT p.id, p.name, p.score, p.attempts, p.fails, p.hints, p.wins, p.lost,
                      p.created_at, p.updated_at, p.version
               FROM participants p
               JOIN participant_groups pg ON pg.participant_id = p.id
               WHERE pg.group_id = ?
               ORDER BY pg.seq"#,
        )
        .bind(group_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut members = Vec::with_capacity(rows.len());
        for row in rows {
            members.push(self.hydrate(row).await?);
        }
        Ok(members)
    }
}

/// Version-checked counter update, usable on the pool or inside a transaction.
pub(crate) async fn update_participant<'e, E>(executor: E, participant: &Participant) -> DomainResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let stats = &participant.stats;
    let result = sqlx::query(
        r#"UPDATE participants SET score = ?, attempts = ?, fails = ?, hints = ?, wins = ?, lost = ?,
           updated_at = ?, version = version + 1
           WHERE id = ? AND version = ?"#,
    )
    .bind(i64::from(stats.score))
    .bind(i64::from(stats.attempts))
    .bind(i64::from(stats.fails))
    .bind(i64::from(stats.hints))
    .bind(i64::from(stats.wins))
    .bind(i64::from(stats.lost))
    .bind(participant.updated_at.to_rfc3339())
    .bind(participant.id.to_string())
    .bind(i64::from(participant.version))
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DomainError::conflict("participant", &participant.name));
    }
    Ok(())
}

#[derive(sqlx::FromRow)]
struct ParticipantRow {
    id: String,
    name: String,
    score: i64,
    attempts: i64,
    fails: i64,
    hints: i64,
    wins: i64,
    lost: i64,
    created_at: String,
    updated_at: String,
    version: i64,
}

impl ParticipantRow {
    fn into_participant(self, groups: Vec<Uuid>) -> DomainResult<Participant> {
        Ok(Participant {
            id: parse_uuid(&self.id)?,
            name: self.name,
            groups,
            stats: ParticipantStats {
                score: parse_counter(self.score, "score")?,
                attempts: parse_counter(self.attempts, "attempts")?,
                fails: parse_counter(self.fails, "fails")?,
                hints: parse_counter(self.hints, "hints")?,
                wins: parse_counter(self.wins, "wins")?,
                lost: parse_counter(self.lost, "lost")?,
            },
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
            version: parse_counter(self.version, "version")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;

    async fn setup() -> (SqliteGroupRepository, SqliteParticipantRepository, Group) {
        let pool = create_migrated_test_pool().await.unwrap();
        let groups = SqliteGroupRepository::new(pool.clone());
        let group = Group::new("course-a");
        groups.create(&group).await.unwrap();
        (groups, SqliteParticipantRepository::new(pool), group)
    }

    #[tokio::test]
    async fn test_group_unique_name() {
        let (groups, _, group) = setup().await;
        let found = groups.get_by_name("course-a").await.unwrap().unwrap();
        assert_eq!(found.id, group.id);
        assert!(groups.create(&Group::new("course-a")).await.is_err());
        assert!(groups.get_by_name("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (_, repo, group) = setup().await;
        let alice = Participant::new("alice", group.id);
        repo.create(&alice).await.unwrap();

        let by_id = repo.get(alice.id).await.unwrap().unwrap();
        assert_eq!(by_id.name, "alice");
        assert_eq!(by_id.groups, vec![group.id]);

        let by_name = repo.get_by_name("alice").await.unwrap().unwrap();
        assert_eq!(by_name.id, alice.id);
        assert!(repo.get_by_name("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_is_version_checked() {
        let (_, repo, group) = setup().await;
        let mut alice = Participant::new("alice", group.id);
        repo.create(&alice).await.unwrap();

        let stale = alice.clone();
        alice.stats.wins = 1;
        repo.update(&alice).await.unwrap();

        let err = repo.update(&stale).await.unwrap_err();
        assert!(err.is_conflict());

        let stored = repo.get(alice.id).await.unwrap().unwrap();
        assert_eq!(stored.stats.wins, 1);
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn test_group_members_in_join_order() {
        let (_, repo, group) = setup().await;
        for name in ["carol", "alice", "bob"] {
            repo.create(&Participant::new(name, group.id)).await.unwrap();
        }
        let names: Vec<_> = repo
            .list_group_members(group.id)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["carol", "alice", "bob"]);
    }

    #[tokio::test]
    async fn test_add_to_second_group() {
        let (groups, repo, group) = setup().await;
        let other = Group::new("course-b");
        groups.create(&other).await.unwrap();

        let alice = Participant::new("alice", group.id);
        repo.create(&alice).await.unwrap();
        repo.add_to_group(alice.id, other.id).await.unwrap();
        repo.add_to_group(alice.id, other.id).await.unwrap();

        let stored = repo.get(alice.id).await.unwrap().unwrap();
        assert_eq!(stored.groups, vec![group.id, other.id]);
        assert_eq!(repo.list_group_members(other.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let (_, repo, group) = setup().await;
        let alice = Participant::new("alice", group.id);
        repo.create(&alice).await.unwrap();
        repo.delete(alice.id).await.unwrap();
        assert!(repo.get(alice.id).await.unwrap().is_none());
        assert!(repo.list_group_members(group.id).await.unwrap().is_empty());
        assert!(repo.delete(alice.id).await.unwrap_err().is_not_found());
    }
}

//! SQLite implementation of the MembershipRepository.

use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::{Executor, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{parse_counter, parse_datetime, parse_json, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{BlockMembership, ScoreVector};
use crate::domain::ports::MembershipRepository;

const MEMBERSHIP_COLUMNS: &str = "id, participant_id, participant_name, block_id, activated, done, score, wins, lost, outgoing_invites, incoming_invites, created_at, updated_at, version";

#[derive(Clone)]
pub struct SqliteMembershipRepository {
    pool: SqlitePool,
}

impl SqliteMembershipRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipRepository for SqliteMembershipRepository {
    async fn create(&self, membership: &BlockMembership) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO block_memberships (id, participant_id, participant_name, block_id, activated, done,
               score, wins, lost, outgoing_invites, incoming_invites, created_at, updated_at, version)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(membership.id.to_string())
        .bind(membership.participant_id.to_string())
        .bind(&membership.participant_name)
        .bind(&membership.block_id)
        .bind(membership.activated)
        .bind(membership.done)
        .bind(serde_json::to_string(&membership.score)?)
        .bind(i64::from(membership.wins))
        .bind(i64::from(membership.lost))
        .bind(serde_json::to_string(&membership.outgoing_invites)?)
        .bind(serde_json::to_string(&membership.incoming_invites)?)
        .bind(membership.created_at.to_rfc3339())
        .bind(membership.updated_at.to_rfc3339())
        .bind(i64::from(membership.version))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, participant: &str, block_id: &str) -> DomainResult<Option<BlockMembership>> {
        let row: Option<MembershipRow> = sqlx::query_as(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM block_memberships WHERE participant_name = ? AND block_id = ?"
        ))
        .bind(participant)
        .bind(block_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.try_into()).transpose()
    }

    async fn update(&self, membership: &BlockMembership) -> DomainResult<()> {
        update_membership(&self.pool, membership).await
    }

    async fn update_pair(&self, first: &BlockMembership, second: &BlockMembership) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;
        update_membership(&mut *tx, first).await?;
        update_membership(&mut *tx, second).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_for_participant(&self, participant: &str) -> DomainResult<Vec<BlockMembership>> {
        let rows: Vec<MembershipRow> = sqlx::query_as(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM block_memberships WHERE participant_name = ? ORDER BY created_at"
        ))
        .bind(participant)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn list_for_block(&self, block_id: &str) -> DomainResult<Vec<BlockMembership>> {
        let rows: Vec<MembershipRow> = sqlx::query_as(&format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM block_memberships WHERE block_id = ? ORDER BY created_at"
        ))
        .bind(block_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn remove_participant(&self, participant_id: Uuid, peers: &[BlockMembership]) -> DomainResult<u64> {
        let mut tx = self.pool.begin().await?;
        for peer in peers {
            update_membership(&mut *tx, peer).await?;
        }

        let removed = sqlx::query("DELETE FROM block_memberships WHERE participant_id = ?")
            .bind(participant_id.to_string())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let deleted = sqlx::query("DELETE FROM participants WHERE id = ?")
            .bind(participant_id.to_string())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(DomainError::ParticipantNotFound(participant_id.to_string()));
        }

        tx.commit().await?;
        Ok(removed)
    }
}

/// Version-checked membership update, usable on the pool or inside a transaction.
pub(crate) async fn update_membership<'e, E>(executor: E, membership: &BlockMembership) -> DomainResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"UPDATE block_memberships SET activated = ?, done = ?, score = ?, wins = ?, lost = ?,
           outgoing_invites = ?, incoming_invites = ?, updated_at = ?, version = version + 1
           WHERE id = ? AND version = ?"#,
    )
    .bind(membership.activated)
    .bind(membership.done)
    .bind(serde_json::to_string(&membership.score)?)
    .bind(i64::from(membership.wins))
    .bind(i64::from(membership.lost))
    .bind(serde_json::to_string(&membership.outgoing_invites)?)
    .bind(serde_json::to_string(&membership.incoming_invites)?)
    .bind(membership.updated_at.to_rfc3339())
    .bind(membership.id.to_string())
    .bind(i64::from(membership.version))
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DomainError::conflict(
            "block membership",
            format!("{}/{}", membership.participant_name, membership.block_id),
        ));
    }
    Ok(())
}

#[derive(sqlx::FromRow)]
struct MembershipRow {
    id: String,
    participant_id: String,
    participant_name: String,
    block_id: String,
    activated: bool,
    done: bool,
    score: String,
    wins: i64,
    lost: i64,
    outgoing_invites: String,
    incoming_invites: String,
    created_at: String,
    updated_at: String,
    version: i64,
}

impl TryFrom<MembershipRow> for BlockMembership {
    type Error = DomainError;

    fn try_from(row: MembershipRow) -> Result<Self, Self::Error> {
        let score: ScoreVector = parse_json(&row.score)?;
        let outgoing_invites: BTreeSet<String> = parse_json(&row.outgoing_invites)?;
        let incoming_invites: BTreeSet<String> = parse_json(&row.incoming_invites)?;

        Ok(BlockMembership {
            id: parse_uuid(&row.id)?,
            participant_id: parse_uuid(&row.participant_id)?,
            participant_name: row.participant_name,
            block_id: row.block_id,
            activated: row.activated,
            done: row.done,
            score,
            wins: parse_counter(row.wins, "wins")?,
            lost: parse_counter(row.lost, "lost")?,
            outgoing_invites,
            incoming_invites,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
            version: parse_counter(row.version, "version")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{
        create_migrated_test_pool, SqliteGroupRepository, SqliteParticipantRepository,
    };
    use crate::domain::models::{Group, Participant};
    use crate::domain::ports::{GroupRepository, ParticipantRepository};

    async fn setup(names: &[&str]) -> (SqliteMembershipRepository, Vec<Participant>) {
        let pool = create_migrated_test_pool().await.unwrap();
        let group = Group::new("course-a");
        SqliteGroupRepository::new(pool.clone()).create(&group).await.unwrap();
        let participants_repo = SqliteParticipantRepository::new(pool.clone());
        let mut participants = Vec::new();
        for name in names {
            let p = Participant::new(*name, group.id);
            participants_repo.create(&p).await.unwrap();
            participants.push(p);
        }
        (SqliteMembershipRepository::new(pool), participants)
    }

    #[tokio::test]
    async fn test_create_get_and_unique() {
        let (repo, people) = setup(&["alice"]).await;
        let m = BlockMembership::new(people[0].id, "alice", "block-1");
        repo.create(&m).await.unwrap();

        let found = repo.get("alice", "block-1").await.unwrap().unwrap();
        assert_eq!(found.id, m.id);
        assert!(found.outgoing_invites.is_empty());
        assert!(repo.get("alice", "block-2").await.unwrap().is_none());

        let dup = BlockMembership::new(people[0].id, "alice", "block-1");
        assert!(repo.create(&dup).await.is_err());
    }

    #[tokio::test]
    async fn test_update_pair_is_all_or_nothing() {
        let (repo, people) = setup(&["alice", "bob"]).await;
        let mut a = BlockMembership::new(people[0].id, "alice", "block-1");
        let mut b = BlockMembership::new(people[1].id, "bob", "block-1");
        repo.create(&a).await.unwrap();
        repo.create(&b).await.unwrap();

        a.add_outgoing("bob");
        b.add_incoming("alice");
        repo.update_pair(&a, &b).await.unwrap();

        let stored_b = repo.get("bob", "block-1").await.unwrap().unwrap();
        assert!(stored_b.incoming_invites.contains("alice"));
        assert_eq!(stored_b.version, 2);

        // `b` is now stale: the whole pair must be rejected.
        let mut a2 = repo.get("alice", "block-1").await.unwrap().unwrap();
        a2.add_outgoing("carol");
        let err = repo.update_pair(&a2, &b).await.unwrap_err();
        assert!(err.is_conflict());
        let stored_a = repo.get("alice", "block-1").await.unwrap().unwrap();
        assert!(!stored_a.outgoing_invites.contains("carol"));
    }

    #[tokio::test]
    async fn test_list_and_remove_participant() {
        let (repo, people) = setup(&["alice", "bob"]).await;
        repo.create(&BlockMembership::new(people[0].id, "alice", "block-1")).await.unwrap();
        repo.create(&BlockMembership::new(people[0].id, "alice", "block-2")).await.unwrap();
        let mut bob = BlockMembership::new(people[1].id, "bob", "block-1");
        bob.add_incoming("alice");
        repo.create(&bob).await.unwrap();

        assert_eq!(repo.list_for_participant("alice").await.unwrap().len(), 2);
        assert_eq!(repo.list_for_block("block-1").await.unwrap().len(), 2);

        let mut peer = repo.get("bob", "block-1").await.unwrap().unwrap();
        peer.forget_invites_with("alice");
        assert_eq!(repo.remove_participant(people[0].id, &[peer]).await.unwrap(), 2);
        assert!(repo.list_for_participant("alice").await.unwrap().is_empty());

        let stored_bob = repo.get("bob", "block-1").await.unwrap().unwrap();
        assert!(stored_bob.incoming_invites.is_empty());
        assert_eq!(stored_bob.version, 2);

        let err = repo.remove_participant(people[0].id, &[]).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_remove_participant_rolls_back_on_stale_peer() {
        let (repo, people) = setup(&["alice", "bob"]).await;
        repo.create(&BlockMembership::new(people[0].id, "alice", "block-1")).await.unwrap();
        let mut bob = BlockMembership::new(people[1].id, "bob", "block-1");
        bob.add_incoming("alice");
        repo.create(&bob).await.unwrap();

        // Somebody else touched bob's membership in between.
        let mut fresh = repo.get("bob", "block-1").await.unwrap().unwrap();
        fresh.add_incoming("carol");
        repo.update(&fresh).await.unwrap();

        bob.forget_invites_with("alice");
        let err = repo.remove_participant(people[0].id, &[bob]).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(repo.list_for_participant("alice").await.unwrap().len(), 1);
        let stored_bob = repo.get("bob", "block-1").await.unwrap().unwrap();
        assert!(stored_bob.incoming_invites.contains("alice"));
    }
}

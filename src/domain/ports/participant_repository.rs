//! Roster ports: participants and course groups.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Group, Participant};

/// Repository interface for course groups.
#[async_trait]
pub trait GroupRepository: Send + Sync {
    /// Create a new group. Fails if the name is taken.
    async fn create(&self, group: &Group) -> DomainResult<()>;

    /// Get a group by its unique name.
    async fn get_by_name(&self, name: &str) -> DomainResult<Option<Group>>;
}

/// Repository interface for participant persistence.
#[async_trait]
pub trait ParticipantRepository: Send + Sync {
    /// Insert a participant together with its group memberships.
    async fn create(&self, participant: &Participant) -> DomainResult<()>;

    /// Get a participant by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Participant>>;

    /// Get a participant by its unique name.
    async fn get_by_name(&self, name: &str) -> DomainResult<Option<Participant>>;

    /// Update aggregate counters.
    ///
    /// Optimistic: succeeds only if the stored version still equals
    /// `participant.version`, otherwise returns `ConcurrencyConflict`.
    async fn update(&self, participant: &Participant) -> DomainResult<()>;

    /// Add an existing participant to another group. No-op if already a member.
    async fn add_to_group(&self, participant_id: Uuid, group_id: Uuid) -> DomainResult<()>;

    /// Delete a participant and, with it, all of its block memberships.
    async fn delete(&self, id: Uuid) -> DomainResult<()>;

    /// Members of a group, in the order they joined it.
    async fn list_group_members(&self, group_id: Uuid) -> DomainResult<Vec<Participant>>;
}

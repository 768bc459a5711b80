//! Roster domain model: participants and the course groups they belong to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::score::ScoreVector;

/// A course-scoped container of participants.
///
/// The group name is the course namespace and is unique per course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// Aggregate counters for a participant across every finished defy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantStats {
    pub score: u32,
    pub attempts: u32,
    pub fails: u32,
    pub hints: u32,
    pub wins: u32,
    pub lost: u32,
}

impl ParticipantStats {
    /// Fold one side's final score vector into the totals.
    ///
    /// Attempts, fails and hints always count. Points and a win are only
    /// credited to the winner; everybody else records a loss.
    pub fn apply_result(&mut self, side: &ScoreVector, won: bool) {
        self.attempts = self.attempts.saturating_add(side.attempts);
        self.fails = self.fails.saturating_add(side.fails);
        self.hints = self.hints.saturating_add(side.hints);
        if won {
            self.score = self.score.saturating_add(side.points);
            self.wins = self.wins.saturating_add(1);
        } else {
            self.lost = self.lost.saturating_add(1);
        }
    }
}

/// An enrolled participant, identified by a unique name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: Uuid,
    pub name: String,
    /// Groups this participant belongs to (at least one).
    pub groups: Vec<Uuid>,
    pub stats: ParticipantStats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic-lock version, bumped on every successful update.
    pub version: u32,
}

impl Participant {
    pub fn new(name: impl Into<String>, group_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            groups: vec![group_id],
            stats: ParticipantStats::default(),
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    pub fn in_group(&self, group_id: Uuid) -> bool {
        self.groups.contains(&group_id)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Participant name cannot be empty".to_string());
        }
        if self.groups.is_empty() {
            return Err(format!("Participant {} must belong to a group", self.name));
        }
        Ok(())
    }
}

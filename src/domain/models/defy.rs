//! Defy domain model.
//!
//! A defy is a pairwise challenge between two participants inside one block.
//! Both sides play their rounds independently and each signals the end of
//! its own play. The defy becomes terminal once both sides have ended; that
//! is the single point where the result is scored into the standings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::score::ScoreVector;
use crate::domain::errors::{DomainError, DomainResult};

/// Which half of a defy a participant plays.
///
/// The inviter always plays `Right` and the accepter `Left`; the roles carry
/// no other meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Right,
    Left,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Right => "right",
            Self::Left => "left",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "right" | "r" => Some(Self::Right),
            "left" | "l" => Some(Self::Left),
            _ => None,
        }
    }

    pub fn other(&self) -> Self {
        match self {
            Self::Right => Self::Left,
            Self::Left => Self::Right,
        }
    }
}

/// Lifecycle state, derived from the two sides.
///
/// ```text
/// Created -> RoundInProgress -> OneSideEnded -> BothEnded
/// ```
/// `BothEnded` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefyState {
    Created,
    RoundInProgress,
    OneSideEnded,
    BothEnded,
}

impl DefyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::RoundInProgress => "round_in_progress",
            Self::OneSideEnded => "one_side_ended",
            Self::BothEnded => "both_ended",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "created" => Some(Self::Created),
            "round_in_progress" => Some(Self::RoundInProgress),
            "one_side_ended" => Some(Self::OneSideEnded),
            "both_ended" => Some(Self::BothEnded),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::BothEnded)
    }
}

impl std::fmt::Display for DefyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a scored defy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefyOutcome {
    Winner(Side),
    /// Nobody is credited a win; both sides record a loss.
    Draw,
}

impl DefyOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Winner(Side::Right) => "right",
            Self::Winner(Side::Left) => "left",
            Self::Draw => "draw",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draw" => Some(Self::Draw),
            other => Side::from_str(other).map(Self::Winner),
        }
    }

    pub fn is_winner(&self, side: Side) -> bool {
        matches!(self, Self::Winner(s) if *s == side)
    }
}

/// What a call to [`Defy::signal_end`] changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndSignal {
    /// The side had already ended; nothing changed.
    AlreadyEnded,
    /// The side is now ended, the other one is still playing.
    Ended,
    /// This call ended the last open side: the defy must be finalized.
    BothEnded,
}

/// One participant's half of a defy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefySide {
    pub name: String,
    pub round: u32,
    pub ended: bool,
    pub score: ScoreVector,
    pub last_activity: Option<DateTime<Utc>>,
}

impl DefySide {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            round: 0,
            ended: false,
            score: ScoreVector::default(),
            last_activity: None,
        }
    }

    fn has_activity(&self) -> bool {
        self.round > 0 || !self.score.is_zero()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defy {
    pub id: Uuid,
    pub board_block_id: Uuid,
    pub block_id: String,
    pub right: DefySide,
    pub left: DefySide,
    /// Set exactly once, in the same write that aggregates the standings.
    pub outcome: Option<DefyOutcome>,
    pub finalized_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u32,
}

impl Defy {
    /// Create a defy for an accepted invitation: the inviter plays right.
    pub fn new(
        board_block_id: Uuid,
        block_id: impl Into<String>,
        inviter: impl Into<String>,
        accepter: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            board_block_id,
            block_id: block_id.into(),
            right: DefySide::new(inviter),
            left: DefySide::new(accepter),
            outcome: None,
            finalized_at: None,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    pub fn state(&self) -> DefyState {
        match (self.right.ended, self.left.ended) {
            (true, true) => DefyState::BothEnded,
            (true, false) | (false, true) => DefyState::OneSideEnded,
            _ if self.right.has_activity() || self.left.has_activity() => {
                DefyState::RoundInProgress
            }
            _ => DefyState::Created,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn side(&self, side: Side) -> &DefySide {
        match side {
            Side::Right => &self.right,
            Side::Left => &self.left,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut DefySide {
        match side {
            Side::Right => &mut self.right,
            Side::Left => &mut self.left,
        }
    }

    /// Resolve which side `name` plays, if any.
    pub fn side_of(&self, name: &str) -> Option<Side> {
        if self.right.name == name {
            Some(Side::Right)
        } else if self.left.name == name {
            Some(Side::Left)
        } else {
            None
        }
    }

    /// Same as [`Defy::side_of`] but reports strangers as an error.
    pub fn require_side(&self, name: &str) -> DomainResult<Side> {
        self.side_of(name).ok_or_else(|| DomainError::NotADefySide {
            defy_id: self.id,
            participant: name.to_string(),
        })
    }

    pub fn involves(&self, name: &str) -> bool {
        self.side_of(name).is_some()
    }

    /// True if this defy is between `a` and `b`, in either side order.
    pub fn pairs(&self, a: &str, b: &str) -> bool {
        (self.right.name == a && self.left.name == b) || (self.right.name == b && self.left.name == a)
    }

    pub fn opponent_of(&self, name: &str) -> Option<&str> {
        self.side_of(name).map(|s| self.side(s.other()).name.as_str())
    }

    /// Set a side's round counter. Rejected once the defy is terminal.
    pub fn submit_round(&mut self, side: Side, round: u32) -> DomainResult<()> {
        self.ensure_open("submit a round to")?;
        let now = Utc::now();
        let s = self.side_mut(side);
        s.round = round;
        s.last_activity = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Fold a scored answer into a side's score vector.
    pub fn record_answer(&mut self, side: Side, delta: &ScoreVector) -> DomainResult<()> {
        self.ensure_open("record an answer in")?;
        let now = Utc::now();
        let s = self.side_mut(side);
        s.score.accumulate(delta);
        s.last_activity = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Mark a side as finished. Idempotent.
    pub fn signal_end(&mut self, side: Side) -> EndSignal {
        if self.side(side).ended {
            return EndSignal::AlreadyEnded;
        }
        let now = Utc::now();
        let s = self.side_mut(side);
        s.ended = true;
        s.last_activity = Some(now);
        self.updated_at = now;

        if self.side(side.other()).ended {
            EndSignal::BothEnded
        } else {
            EndSignal::Ended
        }
    }

    /// Terminal but not yet scored into the standings.
    pub fn needs_finalization(&self) -> bool {
        self.is_resolved() && self.outcome.is_none()
    }

    pub fn mark_finalized(&mut self, outcome: DefyOutcome) {
        let now = Utc::now();
        self.outcome = Some(outcome);
        self.finalized_at = Some(now);
        self.updated_at = now;
    }

    fn ensure_open(&self, action: &str) -> DomainResult<()> {
        let state = self.state();
        if state.is_terminal() {
            return Err(DomainError::InvalidState {
                defy_id: self.id,
                state: state.as_str().to_string(),
                action: action.to_string(),
            });
        }
        Ok(())
    }
}

//! Block membership: a participant's progress and invitation state in one block.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::score::ScoreVector;

/// Exactly one per (participant, block). Created lazily on first interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMembership {
    pub id: Uuid,
    pub participant_id: Uuid,
    pub participant_name: String,
    pub block_id: String,
    /// Set once the participant has played (or is playing) a defy in this block.
    pub activated: bool,
    /// Monotonic: once the wins threshold is reached it never goes back.
    pub done: bool,
    pub score: ScoreVector,
    pub wins: u32,
    pub lost: u32,
    /// Names this participant has invited and who have not answered yet.
    pub outgoing_invites: BTreeSet<String>,
    /// Names that invited this participant and are waiting for an answer.
    pub incoming_invites: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u32,
}

impl BlockMembership {
    pub fn new(participant_id: Uuid, participant_name: impl Into<String>, block_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            participant_id,
            participant_name: participant_name.into(),
            block_id: block_id.into(),
            activated: false,
            done: false,
            score: ScoreVector::default(),
            wins: 0,
            lost: 0,
            outgoing_invites: BTreeSet::new(),
            incoming_invites: BTreeSet::new(),
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    /// True if `name` is already in either invitation set.
    pub fn has_pending_invite_with(&self, name: &str) -> bool {
        self.outgoing_invites.contains(name) || self.incoming_invites.contains(name)
    }

    /// Record an invitation sent to `to`. Returns false if it was already pending.
    pub fn add_outgoing(&mut self, to: &str) -> bool {
        let changed = self.outgoing_invites.insert(to.to_string());
        self.touch_if(changed)
    }

    /// Record an invitation received from `from`. Returns false if it was already pending.
    pub fn add_incoming(&mut self, from: &str) -> bool {
        let changed = self.incoming_invites.insert(from.to_string());
        self.touch_if(changed)
    }

    pub fn remove_outgoing(&mut self, to: &str) -> bool {
        let changed = self.outgoing_invites.remove(to);
        self.touch_if(changed)
    }

    pub fn remove_incoming(&mut self, from: &str) -> bool {
        let changed = self.incoming_invites.remove(from);
        self.touch_if(changed)
    }

    /// Drop every pending invitation to or from `name`.
    pub fn forget_invites_with(&mut self, name: &str) -> bool {
        let outgoing = self.remove_outgoing(name);
        let incoming = self.remove_incoming(name);
        outgoing || incoming
    }

    pub fn activate(&mut self) {
        if !self.activated {
            self.activated = true;
            self.updated_at = Utc::now();
        }
    }

    /// Fold a finished defy into this membership.
    ///
    /// Counters at indices 1..3 always grow. Points and a win go to the winner
    /// only, and `done` flips once `wins >= wins_required`.
    pub fn apply_result(&mut self, side: &ScoreVector, won: bool, wins_required: u32) {
        self.score.add_counters(side);
        if won {
            self.score.add_points(side.points);
            self.wins = self.wins.saturating_add(1);
            if self.wins >= wins_required {
                self.done = true;
            }
        } else {
            self.lost = self.lost.saturating_add(1);
        }
        self.updated_at = Utc::now();
    }

    /// Completion percentage towards the wins threshold, capped at 100.
    pub fn progress_percent(&self, wins_required: u32) -> u32 {
        if wins_required == 0 {
            return 100;
        }
        (self.wins.saturating_mul(100) / wins_required).min(100)
    }

    fn touch_if(&mut self, changed: bool) -> bool {
        if changed {
            self.updated_at = Utc::now();
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn membership() -> BlockMembership {
        BlockMembership::new(Uuid::new_v4(), "alice", "block-1")
    }

    #[test]
    fn test_invite_sets() {
        let mut m = membership();
        assert!(m.add_outgoing("bob"));
        assert!(!m.add_outgoing("bob"));
        assert!(m.add_incoming("carol"));
        assert!(m.has_pending_invite_with("bob"));
        assert!(m.has_pending_invite_with("carol"));
        assert!(!m.has_pending_invite_with("dave"));

        assert!(m.remove_incoming("carol"));
        assert!(!m.remove_incoming("carol"));
        assert!(!m.has_pending_invite_with("carol"));

        let before = m.updated_at;
        assert!(m.remove_outgoing("bob"));
        assert!(!m.remove_outgoing("bob"));
        assert!(m.updated_at >= before);
        assert!(m.outgoing_invites.is_empty());
    }

    #[test]
    fn test_forget_invites_with() {
        let mut m = membership();
        m.add_outgoing("bob");
        m.add_incoming("bob");
        m.add_incoming("carol");

        assert!(m.forget_invites_with("bob"));
        assert!(!m.forget_invites_with("bob"));
        assert!(m.outgoing_invites.is_empty());
        assert_eq!(m.incoming_invites.iter().collect::<Vec<_>>(), vec!["carol"]);
    }

    #[test]
    fn test_done_flips_at_threshold() {
        let mut m = membership();
        m.wins = 1;
        m.apply_result(&ScoreVector::new(50, 1, 0, 0), true, 2);
        assert_eq!(m.wins, 2);
        assert!(m.done);
        assert_eq!(m.score, ScoreVector::new(50, 1, 0, 0));

        // A later loss never clears done.
        m.apply_result(&ScoreVector::new(20, 3, 2, 0), false, 2);
        assert!(m.done);
        assert_eq!(m.lost, 1);
        assert_eq!(m.score, ScoreVector::new(50, 4, 2, 0));
    }

    #[test]
    fn test_progress_percent() {
        let mut m = membership();
        assert_eq!(m.progress_percent(3), 0);
        m.wins = 2;
        assert_eq!(m.progress_percent(3), 66);
        m.wins = 5;
        assert_eq!(m.progress_percent(3), 100);
    }
}

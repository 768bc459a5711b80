//! Round scoring and winner determination.
//!
//! Everything here is pure: the services feed in score vectors and records
//! that were read inside the current attempt and persist whatever comes out.

use std::cmp::Ordering;
use std::fmt::Debug;

use tracing::warn;

use crate::domain::models::{
    AnswerEvent, BlockMembership, Defy, DefyOutcome, Participant, ScoreVector, Side,
};

/// Points for a first-try answer without hints.
pub const BASE_POINTS: u32 = 50;
/// Deducted per hint used.
pub const HINT_PENALTY: u32 = 15;
/// Deducted per failed attempt before the correct one.
pub const RETRY_PENALTY: u32 = 15;

/// Points earned by one answered exercise. Never negative.
///
/// An `attempt_number` of 0 is treated like a first attempt.
pub fn score_answer(attempt_number: u32, hints_used: u32) -> u32 {
    let fails = attempt_number.saturating_sub(1);
    let penalty = HINT_PENALTY
        .saturating_mul(hints_used)
        .saturating_add(RETRY_PENALTY.saturating_mul(fails));
    BASE_POINTS.saturating_sub(penalty)
}

/// The contribution of one answer to a side's score vector.
pub fn answer_delta(event: &AnswerEvent) -> ScoreVector {
    ScoreVector::new(
        score_answer(event.attempt_number, event.hints_used),
        event.attempt_number,
        event.attempt_number.saturating_sub(1),
        event.hints_used,
    )
}

/// Decides who won a defy from the two final score vectors.
pub trait WinnerRule: Send + Sync + Debug {
    fn decide(&self, right: &ScoreVector, left: &ScoreVector) -> DefyOutcome;
}

/// Higher points win; ties go to more attempts, then to more hints.
/// A tie on all three is a draw.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderedTieBreak;

impl WinnerRule for OrderedTieBreak {
    fn decide(&self, right: &ScoreVector, left: &ScoreVector) -> DefyOutcome {
        let ordering = right
            .points
            .cmp(&left.points)
            .then(right.attempts.cmp(&left.attempts))
            .then(right.hints.cmp(&left.hints));

        match ordering {
            Ordering::Greater => DefyOutcome::Winner(Side::Right),
            Ordering::Less => DefyOutcome::Winner(Side::Left),
            Ordering::Equal => DefyOutcome::Draw,
        }
    }
}

/// Records one side of a finished defy touches, as read for this attempt.
#[derive(Debug)]
pub struct SideRecords {
    pub side: Side,
    pub membership: Option<BlockMembership>,
    pub participant: Option<Participant>,
}

/// Fold a decided defy into the aggregates of both sides.
///
/// Missing records (the participant unenrolled mid-defy) are skipped for
/// that side only. Returns the records that must be written back.
pub fn aggregate(
    defy: &Defy,
    outcome: DefyOutcome,
    sides: Vec<SideRecords>,
    wins_required: u32,
) -> (Vec<BlockMembership>, Vec<Participant>) {
    let mut memberships = Vec::with_capacity(2);
    let mut participants = Vec::with_capacity(2);

    for records in sides {
        let played = defy.side(records.side);
        let won = outcome.is_winner(records.side);

        match records.membership {
            Some(mut membership) => {
                membership.apply_result(&played.score, won, wins_required);
                memberships.push(membership);
            }
            None => warn!(defy_id = %defy.id, participant = %played.name, "no block membership, skipping aggregation"),
        }

        match records.participant {
            Some(mut participant) => {
                participant.stats.apply_result(&played.score, won);
                participant.updated_at = chrono::Utc::now();
                participants.push(participant);
            }
            None => warn!(defy_id = %defy.id, participant = %played.name, "participant gone, skipping aggregation"),
        }
    }

    (memberships, participants)
}

//! Defy lifecycle: rounds, answers, end signals and finalization.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::scoring::{self, OrderedTieBreak, SideRecords, WinnerRule};
use super::{RetryPolicy, Store};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AnswerEvent, Defy, DefyOutcome, DefyState, EndSignal, RequestContext, Side,
};

/// A defy as seen by one of its two participants.
#[derive(Debug, Clone, Serialize)]
pub struct DefyView {
    pub defy: Defy,
    pub side: Side,
    pub state: DefyState,
}

/// Result of [`DefyService::signal_end`].
#[derive(Debug, Clone)]
pub struct EndReport {
    pub defy: Defy,
    pub signal: EndSignal,
    /// Set when this call scored the defy into the standings.
    pub outcome: Option<DefyOutcome>,
}

/// Result of [`DefyService::finalize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "outcome", rename_all = "snake_case")]
pub enum FinalizeOutcome {
    Finalized(DefyOutcome),
    AlreadyFinalized(DefyOutcome),
}

pub struct DefyService {
    store: Store,
    retry: RetryPolicy,
    rule: Arc<dyn WinnerRule>,
}

impl DefyService {
    pub fn new(store: Store, retry: RetryPolicy) -> Self {
        Self::with_rule(store, retry, Arc::new(OrderedTieBreak))
    }

    pub fn with_rule(store: Store, retry: RetryPolicy, rule: Arc<dyn WinnerRule>) -> Self {
        Self { store, retry, rule }
    }

    async fn load(&self, id: Uuid) -> DomainResult<Defy> {
        self.store
            .defies
            .get(id)
            .await?
            .ok_or(DomainError::DefyNotFound(id))
    }

    /// Fetch a defy the acting participant plays in.
    pub async fn get_defy(&self, ctx: &RequestContext, id: Uuid) -> DomainResult<DefyView> {
        let defy = self.load(id).await?;
        let side = defy.require_side(&ctx.actor)?;
        Ok(DefyView {
            state: defy.state(),
            side,
            defy,
        })
    }

    /// Move the acting participant's round counter to `round` (1-based).
    pub async fn submit_round(&self, ctx: &RequestContext, id: Uuid, round: u32) -> DomainResult<Defy> {
        let rounds = ctx.course.defy.rounds;
        if round == 0 || round > rounds {
            return Err(DomainError::ValidationFailed(format!(
                "round must be between 1 and {rounds}, got {round}"
            )));
        }

        self.retry
            .execute("submit_round", || async move {
                let mut defy = self.load(id).await?;
                let side = defy.require_side(&ctx.actor)?;
                defy.submit_round(side, round)?;
                self.store.defies.update(&defy).await?;
                defy.version += 1;
                debug!(defy_id = %id, side = side.as_str(), round, "round submitted");
                Ok(defy)
            })
            .await
    }

    /// Score an answered exercise into the acting participant's side.
    pub async fn submit_answer(&self, ctx: &RequestContext, id: Uuid, event: &AnswerEvent) -> DomainResult<Defy> {
        event.validate()?;
        let delta = scoring::answer_delta(event);

        self.retry
            .execute("submit_answer", || async move {
                let mut defy = self.load(id).await?;
                let side = defy.require_side(&ctx.actor)?;
                defy.record_answer(side, &delta)?;
                self.store.defies.update(&defy).await?;
                defy.version += 1;
                debug!(defy_id = %id, side = side.as_str(), points = delta.points, "answer scored");
                Ok(defy)
            })
            .await
    }

    /// Same as [`DefyService::submit_answer`], with the defy taken from the event's location.
    pub async fn submit_answer_event(&self, ctx: &RequestContext, event: &AnswerEvent) -> DomainResult<Defy> {
        let id = event.defy_id()?;
        self.submit_answer(ctx, id, event).await
    }

    /// Mark the acting participant's side as finished.
    ///
    /// The call that ends the second side also decides the winner and
    /// commits every aggregate in the same transaction, so a defy is scored
    /// exactly once no matter how the two signals interleave.
    pub async fn signal_end(&self, ctx: &RequestContext, id: Uuid) -> DomainResult<EndReport> {
        self.retry
            .execute("signal_end", || self.signal_end_once(ctx, id))
            .await
    }

    async fn signal_end_once(&self, ctx: &RequestContext, id: Uuid) -> DomainResult<EndReport> {
        let mut defy = self.load(id).await?;
        let side = defy.require_side(&ctx.actor)?;

        let signal = defy.signal_end(side);
        let outcome = match signal {
            EndSignal::AlreadyEnded if defy.needs_finalization() => {
                Some(self.commit_result(ctx, &mut defy).await?)
            }
            EndSignal::AlreadyEnded => None,
            EndSignal::Ended => {
                self.store.defies.update(&defy).await?;
                defy.version += 1;
                info!(defy_id = %id, side = side.as_str(), "side ended");
                None
            }
            EndSignal::BothEnded => Some(self.commit_result(ctx, &mut defy).await?),
        };

        Ok(EndReport {
            defy,
            signal,
            outcome,
        })
    }

    /// Score a defy that has reached `BothEnded`. Safe to call repeatedly.
    pub async fn finalize(&self, ctx: &RequestContext, id: Uuid) -> DomainResult<FinalizeOutcome> {
        self.retry
            .execute("finalize", || async move {
                let mut defy = self.load(id).await?;
                defy.require_side(&ctx.actor)?;

                if let Some(outcome) = defy.outcome {
                    return Ok(FinalizeOutcome::AlreadyFinalized(outcome));
                }
                if !defy.is_resolved() {
                    return Err(DomainError::InvalidState {
                        defy_id: id,
                        state: defy.state().to_string(),
                        action: "finalize".to_string(),
                    });
                }
                let outcome = self.commit_result(ctx, &mut defy).await?;
                Ok(FinalizeOutcome::Finalized(outcome))
            })
            .await
    }

    /// Decide the winner and write the defy plus all aggregates atomically.
    ///
    /// Memberships and participants are read here, within the current attempt,
    /// so a retry after a conflict never folds into stale counters.
    async fn commit_result(&self, ctx: &RequestContext, defy: &mut Defy) -> DomainResult<DefyOutcome> {
        let outcome = self.rule.decide(&defy.right.score, &defy.left.score);
        defy.mark_finalized(outcome);

        let mut sides = Vec::with_capacity(2);
        for side in [Side::Right, Side::Left] {
            let name = defy.side(side).name.clone();
            sides.push(SideRecords {
                side,
                membership: self.store.memberships.get(&name, &defy.block_id).await?,
                participant: self.store.participants.get_by_name(&name).await?,
            });
        }

        let (memberships, participants) =
            scoring::aggregate(defy, outcome, sides, ctx.wins_required());
        self.store
            .defies
            .commit_finalization(defy, &memberships, &participants)
            .await?;
        defy.version += 1;

        info!(
            defy_id = %defy.id,
            block_id = %defy.block_id,
            outcome = outcome.as_str(),
            right = ?defy.right.score.as_array(),
            left = ?defy.left.score.as_array(),
            "defy finalized"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{RequestContext, ScoreVector};
    use crate::services::testing::{context, course, store};
    use crate::services::{AcceptOutcome, MatchmakingService, RosterService};

    struct Fixture {
        service: DefyService,
        store: Store,
        defy: Defy,
    }

    async fn setup_with(wins_required: u32) -> Fixture {
        let store = store().await;
        let retry = RetryPolicy::default();
        let roster = RosterService::new(store.clone(), retry.clone());
        let course = course(wins_required);
        for name in ["alice", "bob"] {
            let ctx = RequestContext::new(name, course.clone());
            roster.enroll(&ctx).await.unwrap();
            roster.ensure_membership(&ctx, "intro").await.unwrap();
        }

        let mm = MatchmakingService::new(store.clone(), retry.clone());
        let alice = RequestContext::new("alice", course.clone());
        mm.send_invite(&alice, "bob", "intro").await.unwrap();
        let AcceptOutcome::Created(defy) = mm
            .accept_invite(&alice.acting_as("bob"), "alice", "intro")
            .await
            .unwrap()
        else {
            panic!("expected a defy");
        };

        Fixture {
            service: DefyService::new(store.clone(), retry),
            store,
            defy,
        }
    }

    async fn setup() -> Fixture {
        setup_with(3).await
    }

    #[tokio::test]
    async fn test_get_defy_resolves_side() {
        let f = setup().await;
        let view = f.service.get_defy(&context("bob"), f.defy.id).await.unwrap();
        assert_eq!(view.side, Side::Left);
        assert_eq!(view.state, DefyState::Created);

        let err = f.service.get_defy(&context("mallory"), f.defy.id).await.unwrap_err();
        assert!(matches!(err, DomainError::NotADefySide { .. }));

        let err = f.service.get_defy(&context("bob"), Uuid::new_v4()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_rounds_and_answers_accumulate() {
        let f = setup().await;
        let alice = context("alice");

        f.service.submit_round(&alice, f.defy.id, 1).await.unwrap();
        f.service.submit_answer(&alice, f.defy.id, &AnswerEvent::new(1, 0)).await.unwrap();
        f.service.submit_answer(&alice, f.defy.id, &AnswerEvent::new(2, 1)).await.unwrap();
        let defy = f.service.submit_round(&alice, f.defy.id, 2).await.unwrap();

        assert_eq!(defy.right.round, 2);
        assert_eq!(defy.right.score, ScoreVector::new(70, 3, 1, 1));
        assert_eq!(defy.left.score, ScoreVector::default());
        assert_eq!(defy.state(), DefyState::RoundInProgress);

        let stored = f.store.defies.get(f.defy.id).await.unwrap().unwrap();
        assert_eq!(stored, defy);
    }

    #[tokio::test]
    async fn test_round_out_of_range_rejected() {
        let f = setup().await;
        let alice = context("alice");
        assert!(f.service.submit_round(&alice, f.defy.id, 0).await.is_err());
        assert!(f.service.submit_round(&alice, f.defy.id, 4).await.is_err());
    }

    #[tokio::test]
    async fn test_answer_from_location() {
        let f = setup().await;
        let event = AnswerEvent::from_json(&format!(
            r#"{{"attemptNumber": 1, "hintsUsed": 0, "location": "/arena?defy%3D{}"}}"#,
            f.defy.id
        ))
        .unwrap();
        let defy = f.service.submit_answer_event(&context("bob"), &event).await.unwrap();
        assert_eq!(defy.left.score, ScoreVector::new(50, 1, 0, 0));

        let err = f.service.submit_answer_event(&context("mallory"), &event).await.unwrap_err();
        assert!(err.is_invalid_state());
    }

    #[tokio::test]
    async fn test_signal_end_finalizes_once() {
        let f = setup().await;
        let alice = context("alice");
        let bob = context("bob");
        f.service.submit_answer(&alice, f.defy.id, &AnswerEvent::new(1, 0)).await.unwrap();
        f.service.submit_answer(&bob, f.defy.id, &AnswerEvent::new(2, 0)).await.unwrap();

        let first = f.service.signal_end(&alice, f.defy.id).await.unwrap();
        assert_eq!(first.signal, EndSignal::Ended);
        assert_eq!(first.outcome, None);

        let again = f.service.signal_end(&alice, f.defy.id).await.unwrap();
        assert_eq!(again.signal, EndSignal::AlreadyEnded);

        let last = f.service.signal_end(&bob, f.defy.id).await.unwrap();
        assert_eq!(last.signal, EndSignal::BothEnded);
        assert_eq!(last.outcome, Some(DefyOutcome::Winner(Side::Right)));

        // Everything after the terminal transition is a no-op.
        let late = f.service.signal_end(&bob, f.defy.id).await.unwrap();
        assert_eq!(late.signal, EndSignal::AlreadyEnded);
        assert_eq!(late.outcome, None);
        assert_eq!(
            f.service.finalize(&bob, f.defy.id).await.unwrap(),
            FinalizeOutcome::AlreadyFinalized(DefyOutcome::Winner(Side::Right))
        );
        assert!(f.service.submit_round(&bob, f.defy.id, 3).await.unwrap_err().is_invalid_state());

        let winner = f.store.memberships.get("alice", "intro").await.unwrap().unwrap();
        assert_eq!(winner.wins, 1);
        assert_eq!(winner.score, ScoreVector::new(50, 1, 0, 0));
        let loser = f.store.memberships.get("bob", "intro").await.unwrap().unwrap();
        assert_eq!(loser.lost, 1);
        assert_eq!(loser.score, ScoreVector::new(0, 2, 1, 0));

        let alice_p = f.store.participants.get_by_name("alice").await.unwrap().unwrap();
        assert_eq!((alice_p.stats.score, alice_p.stats.wins), (50, 1));
        let bob_p = f.store.participants.get_by_name("bob").await.unwrap().unwrap();
        assert_eq!((bob_p.stats.lost, bob_p.stats.attempts, bob_p.stats.fails), (1, 2, 1));
    }

    #[tokio::test]
    async fn test_finalize_requires_both_ended() {
        let f = setup().await;
        let alice = context("alice");
        f.service.signal_end(&alice, f.defy.id).await.unwrap();
        let err = f.service.finalize(&alice, f.defy.id).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_winner_reaching_threshold_is_done() {
        let f = setup_with(2).await;
        let mut alice_m = f.store.memberships.get("alice", "intro").await.unwrap().unwrap();
        alice_m.wins = 1;
        f.store.memberships.update(&alice_m).await.unwrap();

        let alice = RequestContext::new("alice", course(2));
        let bob = alice.acting_as("bob");
        f.service.submit_answer(&alice, f.defy.id, &AnswerEvent::new(1, 0)).await.unwrap();
        f.service.signal_end(&alice, f.defy.id).await.unwrap();
        f.service.signal_end(&bob, f.defy.id).await.unwrap();

        let alice_m = f.store.memberships.get("alice", "intro").await.unwrap().unwrap();
        assert_eq!(alice_m.wins, 2);
        assert!(alice_m.done);
    }

    #[tokio::test]
    async fn test_unenrolled_side_is_skipped() {
        let f = setup().await;
        let roster = RosterService::new(f.store.clone(), RetryPolicy::default());
        let alice = context("alice");
        let bob = context("bob");

        f.service.submit_answer(&bob, f.defy.id, &AnswerEvent::new(1, 0)).await.unwrap();
        f.service.signal_end(&alice, f.defy.id).await.unwrap();
        roster.unenroll(&alice).await.unwrap();

        let report = f.service.signal_end(&bob, f.defy.id).await.unwrap();
        assert_eq!(report.outcome, Some(DefyOutcome::Winner(Side::Left)));
        let bob_m = f.store.memberships.get("bob", "intro").await.unwrap().unwrap();
        assert_eq!(bob_m.wins, 1);
    }
}

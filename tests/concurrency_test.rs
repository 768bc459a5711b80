//! Racing end signals on a real connection pool.
//!
//! Both sides of every defy signal the end at the same moment from separate
//! tasks; exactly one of them must score the defy, and the standings must
//! reflect each defy exactly once.

mod common;

use common::{Harness, BLOCK};
use defier::domain::models::ScoreVector;

const DEFIES: usize = 8;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_simultaneous_end_signals_finalize_exactly_once() {
    common::setup_test_logging();
    let h = Harness::file_backed(100).await;

    let names: Vec<String> = (0..=DEFIES).map(|i| format!("p{i}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    h.enroll(&refs).await;

    // p0 challenges everybody else and always wins on points.
    let mut ids = Vec::with_capacity(DEFIES);
    for opponent in &refs[1..] {
        let defy = h.start_defy("p0", opponent).await;
        h.set_scores(defy.id, ScoreVector::new(50, 1, 0, 0), ScoreVector::new(20, 2, 1, 1))
            .await;
        ids.push((defy.id, (*opponent).to_string()));
    }

    let mut handles = Vec::new();
    for (id, opponent) in ids {
        for actor in ["p0".to_string(), opponent] {
            let defies = h.defies.clone();
            let ctx = h.ctx(&actor);
            handles.push(tokio::spawn(async move { defies.signal_end(&ctx, id).await }));
        }
    }

    let mut finalized = 0;
    for handle in futures::future::join_all(handles).await {
        let report = handle.expect("task panicked").expect("signal_end failed");
        if report.outcome.is_some() {
            finalized += 1;
        }
    }
    assert_eq!(finalized, DEFIES);

    let winner = h.membership_of("p0").await;
    assert_eq!(winner.wins as usize, DEFIES);
    assert_eq!(winner.lost, 0);
    assert_eq!(winner.score.points as usize, 50 * DEFIES);
    assert_eq!(winner.score.attempts as usize, DEFIES);

    let totals = h.participant("p0").await.stats;
    assert_eq!(totals.wins as usize, DEFIES);

    for opponent in &refs[1..] {
        let m = h.membership_of(opponent).await;
        assert_eq!((m.wins, m.lost), (0, 1), "{opponent}");
        assert_eq!(m.score, ScoreVector::new(0, 2, 1, 1), "{opponent}");
    }

    let open = h.matchmaking.list_active_challenges(&h.ctx("p0"), BLOCK).await.unwrap();
    assert!(open.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_answers_from_both_sides_are_all_kept() {
    let h = Harness::file_backed(3).await;
    h.enroll(&["ana", "ben"]).await;
    let defy = h.start_defy("ana", "ben").await;

    let mut handles = Vec::new();
    for _ in 0..5 {
        for actor in ["ana", "ben"] {
            let defies = h.defies.clone();
            let ctx = h.ctx(actor);
            let id = defy.id;
            handles.push(tokio::spawn(async move {
                defies
                    .submit_answer(&ctx, id, &defier::AnswerEvent::new(1, 0))
                    .await
            }));
        }
    }
    for handle in futures::future::join_all(handles).await {
        handle.expect("task panicked").expect("submit_answer failed");
    }

    let view = h.defies.get_defy(&h.ctx("ana"), defy.id).await.unwrap();
    assert_eq!(view.defy.right.score, ScoreVector::new(250, 5, 0, 0));
    assert_eq!(view.defy.left.score, ScoreVector::new(250, 5, 0, 0));
}

//! Common test utilities for integration tests
//!
//! Provides a fully wired engine over a fresh database plus helpers to
//! bring participants to the point a test cares about.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;
use uuid::Uuid;

use defier::adapters::sqlite::{create_migrated_test_pool, initialize_database};
use defier::domain::models::{
    BlockConfig, CourseConfig, DatabaseConfig, Defy, RequestContext, ScoreVector,
};
use defier::services::{AcceptOutcome, InviteOutcome};
use defier::{DefyService, MatchmakingService, RetryPolicy, RosterService, Store};

pub const BLOCK: &str = "intro";

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn course(wins_required: u32) -> Arc<CourseConfig> {
    Arc::new(CourseConfig {
        name: "course-it".to_string(),
        wins_required,
        blocks: vec![BlockConfig::new(BLOCK), BlockConfig::new("loops")],
        ..CourseConfig::default()
    })
}

pub struct Harness {
    pub store: Store,
    pub course: Arc<CourseConfig>,
    pub roster: RosterService,
    pub matchmaking: MatchmakingService,
    pub defies: Arc<DefyService>,
    /// Keeps a file-backed database alive for the test's duration.
    _dir: Option<TempDir>,
}

impl Harness {
    /// In-memory database.
    pub async fn new(wins_required: u32) -> Self {
        let pool = create_migrated_test_pool().await.expect("test pool");
        Self::with_store(Store::sqlite(pool), wins_required, None)
    }

    /// File-backed database with a real connection pool, for concurrency tests.
    pub async fn file_backed(wins_required: u32) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path: PathBuf = dir.path().join("defier.db");
        let config = DatabaseConfig {
            path: path.display().to_string(),
            max_connections: 8,
        };
        let pool = initialize_database(&config).await.expect("file pool");
        Self::with_store(Store::sqlite(pool), wins_required, Some(dir))
    }

    fn with_store(store: Store, wins_required: u32, dir: Option<TempDir>) -> Self {
        let retry = RetryPolicy::new(20, 1, 20);
        Self {
            course: course(wins_required),
            roster: RosterService::new(store.clone(), retry.clone()),
            matchmaking: MatchmakingService::new(store.clone(), retry.clone()),
            defies: Arc::new(DefyService::new(store.clone(), retry)),
            store,
            _dir: dir,
        }
    }

    pub fn ctx(&self, actor: &str) -> RequestContext {
        RequestContext::new(actor, Arc::clone(&self.course))
    }

    /// Enroll every name and join it to `BLOCK`.
    pub async fn enroll(&self, names: &[&str]) {
        for name in names {
            let ctx = self.ctx(name);
            self.roster.enroll(&ctx).await.expect("enroll");
            self.roster.ensure_membership(&ctx, BLOCK).await.expect("join");
        }
    }

    /// Invite and accept, returning the new defy with `inviter` on the right.
    pub async fn start_defy(&self, inviter: &str, accepter: &str) -> Defy {
        let outcome = self
            .matchmaking
            .send_invite(&self.ctx(inviter), accepter, BLOCK)
            .await
            .expect("send invite");
        assert_eq!(outcome, InviteOutcome::Sent);

        match self
            .matchmaking
            .accept_invite(&self.ctx(accepter), inviter, BLOCK)
            .await
            .expect("accept invite")
        {
            AcceptOutcome::Created(defy) => defy,
            other => panic!("expected a defy, got {other:?}"),
        }
    }

    /// Overwrite both score vectors, as if the sides had played to them.
    pub async fn set_scores(&self, id: Uuid, right: ScoreVector, left: ScoreVector) {
        let mut defy = self.store.defies.get(id).await.unwrap().unwrap();
        defy.right.score = right;
        defy.left.score = left;
        self.store.defies.update(&defy).await.unwrap();
    }

    pub async fn membership_of(&self, name: &str) -> defier::BlockMembership {
        self.store
            .memberships
            .get(name, BLOCK)
            .await
            .unwrap()
            .expect("membership")
    }

    pub async fn participant(&self, name: &str) -> defier::Participant {
        self.store
            .participants
            .get_by_name(name)
            .await
            .unwrap()
            .expect("participant")
    }
}

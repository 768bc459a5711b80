//! Wiring shared by every command that talks to the engine.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::adapters::sqlite::initialize_database;
use crate::domain::models::{Config, RequestContext};
use crate::services::{DefyService, MatchmakingService, RetryPolicy, RosterService, Store};

/// An open database plus the services, acting as one participant.
pub struct Session {
    pub ctx: RequestContext,
    pub roster: RosterService,
    pub matchmaking: MatchmakingService,
    pub defies: DefyService,
}

impl Session {
    pub async fn open(config: &Config, actor: Option<String>) -> Result<Self> {
        let actor = actor
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .context("No participant given. Pass --as <name> or set DEFIER_USER.")?;

        let pool = initialize_database(&config.database)
            .await
            .context("Failed to initialize database. Run 'defier init' first.")?;

        Ok(Self::with_store(Store::sqlite(pool), config, actor))
    }

    pub fn with_store(store: Store, config: &Config, actor: impl Into<String>) -> Self {
        let retry = RetryPolicy::from(&config.retry);
        Self {
            ctx: RequestContext::new(actor, Arc::new(config.course.clone())),
            roster: RosterService::new(store.clone(), retry.clone()),
            matchmaking: MatchmakingService::new(store.clone(), retry.clone()),
            defies: DefyService::new(store, retry),
        }
    }
}

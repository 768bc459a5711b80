//! Defier - pairwise skill challenges for course blocks
//!
//! Participants of a course challenge each other to *defies* inside content
//! blocks. A defy pairs two participants who each play a few rounds of
//! exercises; every answer is scored, and once both sides have signalled the
//! end of their play the better score vector wins and the result is folded
//! into block and course standings exactly once.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, state machine and repository ports
//! - **Adapters** (`adapters`): `SQLite` implementations of the ports
//! - **Service Layer** (`services`): matchmaking, defy lifecycle, scoring, standings
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use defier::adapters::sqlite::create_migrated_test_pool;
//! use defier::domain::models::{CourseConfig, RequestContext};
//! use defier::services::{MatchmakingService, RetryPolicy, RosterService, Store};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Store::sqlite(create_migrated_test_pool().await?);
//!     let roster = RosterService::new(store.clone(), RetryPolicy::default());
//!     let ctx = RequestContext::new("alice", Arc::new(CourseConfig::default()));
//!     roster.enroll(&ctx).await?;
//!     roster.join_all_blocks(&ctx).await?;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    AnswerEvent, BlockMembership, Config, CourseConfig, DatabaseConfig, Defy, DefyOutcome,
    DefyState, LoggingConfig, Participant, RequestContext, RetryConfig, ScoreVector, Side,
};
pub use domain::ports::{
    BoardRepository, DefyRepository, GroupRepository, MembershipRepository,
    ParticipantRepository,
};
pub use domain::{DomainError, DomainResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{DefyService, MatchmakingService, RetryPolicy, RosterService, Store};

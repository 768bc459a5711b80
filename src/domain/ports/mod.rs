//! Port trait definitions (Hexagonal Architecture)
//!
//! These are the record-store contracts the engine needs: lookup by key,
//! parameterized equality filters and atomic versioned writes. The SQLite
//! adapters in `crate::adapters::sqlite` implement all of them.

pub mod board_repository;
pub mod defy_repository;
pub mod membership_repository;
pub mod participant_repository;

pub use board_repository::BoardRepository;
pub use defy_repository::{DefyFilter, DefyRepository};
pub use membership_repository::MembershipRepository;
pub use participant_repository::{GroupRepository, ParticipantRepository};

pub mod answer;
pub mod board;
pub mod config;
pub mod context;
pub mod defy;
pub mod membership;
pub mod participant;
pub mod score;

pub use answer::{parse_location_token, AnswerEvent};
pub use board::{Board, BoardBlock};
pub use config::{
    BlockConfig, Config, CourseConfig, DatabaseConfig, DefyConfig, LoggingConfig, RetryConfig,
};
pub use context::RequestContext;
pub use defy::{Defy, DefyOutcome, DefySide, DefyState, EndSignal, Side};
pub use membership::BlockMembership;
pub use participant::{Group, Participant, ParticipantStats};
pub use score::ScoreVector;

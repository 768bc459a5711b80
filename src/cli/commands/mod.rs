//! CLI command implementations.

pub mod defy;
pub mod init;
pub mod invite;
pub mod roster;
pub mod standings;

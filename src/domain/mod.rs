//! Domain layer for the defier challenge engine
//!
//! This module contains the core data model, the defy state machine and the
//! repository ports the rest of the crate is written against.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};

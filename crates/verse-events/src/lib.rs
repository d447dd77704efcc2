//! Shared record types for the agent simulation.
//!
//! This crate contains pure data structures with no orchestration logic.
//! It is a dependency for all other crates in the workspace.

pub mod message;
pub mod record;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;

pub use message::{AgentProfile, Message, MessageKind, Receivers, Reply};
pub use record::{Observation, StepResult, TurnRecord};

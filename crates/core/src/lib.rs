//! Core domain types and configuration for tickety.
//!
//! This crate is the leaf of the workspace: shared types for the dialogue
//! model, capability calls and results, tracker field values, ticket drafts,
//! and the platform thread shape, plus layered configuration and the error
//! taxonomy used across crates.

pub mod capability;
pub mod config;
pub mod dialogue;
pub mod errors;
pub mod fields;
pub mod thread;
pub mod ticket;

pub use capability::{CapabilityCall, CapabilityResult, FailureDetail};
pub use dialogue::{DialogueMessage, Role};
pub use fields::{FieldOption, FieldValueMap};
pub use thread::{SourceMessage, SourceThread};
pub use ticket::{CreatedTicket, TicketDraft};

//! Agent Runtime - LLM-powered capability orchestration
//!
//! This crate is the "brain" of the tickety system - the agent loop that:
//! - Reconstructs a role-tagged dialogue from a platform thread
//! - Asks the language model which capabilities to invoke
//! - Dispatches requested capabilities in parallel with isolated failure
//! - Folds results back into the dialogue and obtains the final answer
//!
//! # Architecture
//!
//! The loop is bounded by design:
//! 1. **Reconstruction** (`conversation`) - platform thread → dialogue
//! 2. **Initial dispatch** (`runtime`) - model call with the capability manifest
//! 3. **Fan-out / fan-in** (`runtime` + `registry`) - parallel execution, one
//!    result per call, join barrier
//! 4. **Followup dispatch** (`runtime`) - second model call, capabilities
//!    disabled, final answer
//!
//! At most one capability round runs per user turn; the model cannot chain a
//! third round trip to react to tool results with more tool calls.
//!
//! # Key Types
//!
//! - `AgentLoop` - the orchestrating state machine (see `runtime`)
//! - `LlmClient` - pluggable chat-completion client (OpenAI/Anthropic/Ollama)
//! - `CapabilityRegistry` - closed registry of typed capability handlers
//! - `FieldValueCache` - single-flight memoized tracker field snapshot
//! - `GuardrailPolicy` - code-level creation gates
//!
//! # Safety Principle
//!
//! The LLM decides *which* capabilities to call, never whether a ticket may
//! be created: creation runs behind code-level guardrails that require a
//! prior confirmation exchange and reject field values absent from the
//! tracker's catalog snapshot.

pub mod capabilities;
pub mod conversation;
pub mod fieldcache;
pub mod guardrails;
pub mod llm;
pub mod policy;
pub mod registry;
pub mod runtime;

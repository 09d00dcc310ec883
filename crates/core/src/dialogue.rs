use serde::{Deserialize, Serialize};

use crate::capability::CapabilityCall;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One ordered entry in an invocation's conversational context.
///
/// A dialogue is an append-only sequence of these, oldest first. It carries
/// no identity of its own; the platform's message history is the only
/// persistent record and the dialogue is re-derived from it on every turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DialogueMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capability_calls: Vec<CapabilityCall>,
}

impl DialogueMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_call_id: None,
            capability_calls: Vec::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_call_id: None,
            capability_calls: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_call_id: None,
            capability_calls: Vec::new(),
        }
    }

    /// Synthetic assistant turn recording the capability calls the model
    /// requested; appended ahead of their results during fan-in.
    pub fn assistant_with_calls(calls: Vec<CapabilityCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            tool_call_id: None,
            capability_calls: calls,
        }
    }

    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_call_id: Some(call_id.into()),
            capability_calls: Vec::new(),
        }
    }
}

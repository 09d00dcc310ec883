use serde::{Deserialize, Serialize};

/// The field set required to create an issue.
///
/// Exists only transiently inside one agent-loop invocation; what has been
/// agreed so far lives in the platform's message history, which is replayed
/// in full on every turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketDraft {
    pub issue_type: String,
    pub priority: String,
    pub summary: String,
    pub description: String,
    pub brand: String,
    pub component: String,
    pub environment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
}

impl TicketDraft {
    /// The draft fields whose values must come from the tracker's enumerated
    /// field catalog. Free-text fields (summary, description) are excluded.
    pub fn enumerated_fields(&self) -> [(&'static str, &str); 5] {
        [
            ("issue_type", self.issue_type.as_str()),
            ("priority", self.priority.as_str()),
            ("brand", self.brand.as_str()),
            ("component", self.component.as_str()),
            ("environment", self.environment.as_str()),
        ]
    }
}

/// A successfully created tracker issue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedTicket {
    pub key: String,
    pub url: String,
}

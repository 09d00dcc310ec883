use serde::{Deserialize, Serialize};

/// A raw platform message as fetched from the chat surface.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMessage {
    pub author_id: String,
    pub text: String,
    pub ts: String,
}

/// An ordered platform thread: the lead message followed by its replies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceThread {
    pub lead_ts: String,
    pub messages: Vec<SourceMessage>,
}

impl SourceThread {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

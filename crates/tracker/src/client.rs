use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tickety_core::capability::FailureDetail;
use tickety_core::fields::FieldValueMap;
use tickety_core::ticket::CreatedTicket;

/// Field set accepted by issue creation. All enumerated values are raw
/// tracker values already resolved through the field catalog; the project
/// key is supplied by the client from configuration, never by the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIssue {
    pub issue_type: String,
    pub priority: String,
    pub summary: String,
    pub description: String,
    pub brand: String,
    pub component: String,
    pub environment: String,
}

/// A prior issue as returned by project-scoped search.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSummary {
    pub key: String,
    pub title: String,
    pub url: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerUser {
    pub account_id: String,
    pub display_name: String,
    pub active: bool,
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("tracker returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("tracker transport failure: {0}")]
    Transport(String),
    #[error("tracker response could not be decoded: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for TrackerError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport(error.to_string())
    }
}

impl From<TrackerError> for FailureDetail {
    fn from(error: TrackerError) -> Self {
        match error {
            TrackerError::Http { status, body } => {
                FailureDetail::http(status, body, "tracker request failed").named("TrackerHttpError")
            }
            TrackerError::Transport(message) => {
                FailureDetail::message(message).named("TrackerTransportError")
            }
            TrackerError::Decode(message) => {
                FailureDetail::message(message).named("TrackerDecodeError")
            }
        }
    }
}

#[async_trait]
pub trait TrackerClient: Send + Sync {
    /// Create an issue in the configured project and return its key and
    /// browse URL.
    async fn create_issue(&self, issue: &NewIssue) -> Result<CreatedTicket, TrackerError>;

    /// Assign an existing issue to a user.
    async fn assign_issue(&self, issue_key: &str, assignee_id: &str) -> Result<(), TrackerError>;

    /// Text search restricted to the configured project, most recent first,
    /// capped at `limit`.
    async fn search_recent(&self, text: &str, limit: u32)
        -> Result<Vec<IssueSummary>, TrackerError>;

    /// Users assignable in the configured project, optionally filtered.
    async fn list_users(&self, query: Option<&str>) -> Result<Vec<TrackerUser>, TrackerError>;

    /// The tracker's enumerated field values for the configured project.
    async fn fetch_field_catalog(&self) -> Result<FieldValueMap, TrackerError>;
}

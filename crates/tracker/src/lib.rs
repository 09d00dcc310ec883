//! Issue-tracker backend client.
//!
//! Thin REST wrapper around a Jira-shaped tracker API: issue creation,
//! assignment, project-scoped search, assignable-user lookup, and the field
//! catalog fetch that feeds the field-value cache. Upstream failures are
//! captured with status and body so the agent loop can surface them as
//! structured capability failures.

pub mod client;
pub mod http;

pub use client::{IssueSummary, NewIssue, TrackerClient, TrackerError, TrackerUser};
pub use http::RestTrackerClient;

use std::sync::Arc;

use tracing::debug;

use tickety_tracker::client::{TrackerClient, TrackerError};

use crate::records::IssueCandidate;
use crate::semantic::DEFAULT_LIMIT;

/// Lexical strategy: tracker text query scoped to the configured project,
/// most recent first, capped at the caller-supplied limit.
pub struct RecentTicketSearch {
    tracker: Arc<dyn TrackerClient>,
}

impl RecentTicketSearch {
    pub fn new(tracker: Arc<dyn TrackerClient>) -> Self {
        Self { tracker }
    }

    pub async fn search(
        &self,
        keywords: &[String],
        limit: Option<u32>,
    ) -> Result<Vec<IssueCandidate>, TrackerError> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).max(1);
        let query = keywords.join(" ");
        let summaries = self.tracker.search_recent(&query, limit).await?;

        let mut candidates: Vec<IssueCandidate> = summaries
            .into_iter()
            .map(|summary| IssueCandidate {
                key: Some(summary.key),
                title: summary.title,
                url: Some(summary.url),
                snippet: format!("{} · created {}", summary.status, summary.created_at.date_naive()),
                score: None,
            })
            .collect();
        // Backends may ignore maxResults; the limit contract is enforced here.
        candidates.truncate(limit as usize);

        debug!(
            event_name = "retrieval.lexical.search",
            matched = candidates.len(),
            "lexical search completed"
        );
        Ok(candidates)
    }
}

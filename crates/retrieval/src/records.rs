use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One indexed chunk that cleared the relevance floor, best match first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimilarityRecord {
    pub content: String,
    pub metadata: Value,
    pub relevance_score: f32,
}

impl SimilarityRecord {
    pub fn to_candidate(&self) -> IssueCandidate {
        IssueCandidate {
            key: metadata_str(&self.metadata, "issue_key"),
            title: metadata_str(&self.metadata, "title")
                .unwrap_or_else(|| snippet_of(&self.content, 80)),
            url: metadata_str(&self.metadata, "url"),
            snippet: snippet_of(&self.content, 240),
            score: Some(self.relevance_score),
        }
    }
}

/// Homogeneous result shape shared by both retrieval strategies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IssueCandidate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

fn metadata_str(metadata: &Value, key: &str) -> Option<String> {
    metadata.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn snippet_of(content: &str, max_chars: usize) -> String {
    let trimmed = content.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_owned();
    }
    let cut: String = trimmed.chars().take(max_chars).collect();
    format!("{cut}…")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::SimilarityRecord;

    #[test]
    fn candidate_pulls_issue_fields_from_metadata() {
        let record = SimilarityRecord {
            content: "Password reset emails bounce for gmail addresses".to_owned(),
            metadata: json!({
                "issue_key": "SUP-9",
                "title": "Reset emails bouncing",
                "url": "https://example.atlassian.net/browse/SUP-9"
            }),
            relevance_score: 0.83,
        };

        let candidate = record.to_candidate();
        assert_eq!(candidate.key.as_deref(), Some("SUP-9"));
        assert_eq!(candidate.title, "Reset emails bouncing");
        assert_eq!(candidate.score, Some(0.83));
    }

    #[test]
    fn candidate_falls_back_to_content_snippet_for_title() {
        let record = SimilarityRecord {
            content: "x".repeat(300),
            metadata: json!({}),
            relevance_score: 0.6,
        };

        let candidate = record.to_candidate();
        assert!(candidate.title.chars().count() <= 81);
        assert!(candidate.snippet.ends_with('…'));
    }
}

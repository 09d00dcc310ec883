use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A capability invocation requested by the language model.
///
/// `arguments` is kept as the raw JSON payload exactly as produced by the
/// model; it is parsed at dispatch time so that a malformed payload becomes
/// a failed result for this one call instead of a loop-level error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// Normalized error descriptor carried by failed capability results.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_body: Option<String>,
}

impl FailureDetail {
    pub fn message(message: impl Into<String>) -> Self {
        Self { message: message.into(), ..Self::default() }
    }

    pub fn coded(code: &str, message: impl Into<String>) -> Self {
        Self { code: Some(code.to_owned()), message: message.into(), ..Self::default() }
    }

    pub fn http(status: u16, body: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            http_status: Some(status),
            http_body: Some(body.into()),
            ..Self::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Outcome of exactly one capability call.
///
/// Every issued `CapabilityCall` yields exactly one of these, tagged with the
/// originating call id so results can be re-associated after the join
/// barrier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CapabilityResult {
    Success { call_id: String, payload: Value },
    Failure { call_id: String, error: FailureDetail },
}

impl CapabilityResult {
    pub fn success(call_id: impl Into<String>, payload: Value) -> Self {
        Self::Success { call_id: call_id.into(), payload }
    }

    pub fn failure(call_id: impl Into<String>, error: FailureDetail) -> Self {
        Self::Failure { call_id: call_id.into(), error }
    }

    pub fn call_id(&self) -> &str {
        match self {
            Self::Success { call_id, .. } | Self::Failure { call_id, .. } => call_id,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    /// Serialize the body the model sees in the corresponding tool message.
    pub fn to_tool_content(&self) -> String {
        let body = match self {
            Self::Success { payload, .. } => payload.clone(),
            Self::Failure { error, .. } => serde_json::json!({ "error": error }),
        };
        serde_json::to_string(&body).unwrap_or_else(|_| "{\"error\":\"unserializable\"}".to_owned())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{CapabilityResult, FailureDetail};

    #[test]
    fn failure_content_wraps_normalized_error() {
        let result = CapabilityResult::failure(
            "call-3",
            FailureDetail::http(404, "{\"errors\":{}}", "issue not found").named("NotFound"),
        );

        let content = result.to_tool_content();
        assert!(content.contains("\"http_status\":404"));
        assert!(content.contains("issue not found"));
        assert_eq!(result.call_id(), "call-3");
    }

    #[test]
    fn success_content_is_the_payload_itself() {
        let result = CapabilityResult::success("call-4", json!({ "key": "SUP-12" }));
        assert_eq!(result.to_tool_content(), "{\"key\":\"SUP-12\"}");
        assert!(!result.is_failure());
    }

    #[test]
    fn coded_failure_omits_http_fields() {
        let detail = FailureDetail::coded("invalid_arguments", "limit must be an integer");
        let rendered = serde_json::to_string(&detail).expect("serialize");
        assert!(!rendered.contains("http_status"));
        assert!(rendered.contains("invalid_arguments"));
    }
}

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use tickety_core::capability::CapabilityCall;
use tickety_core::config::LlmConfig;
use tickety_core::dialogue::{DialogueMessage, Role};

/// One capability as advertised to the model: name, load-bearing natural
/// language description, and a JSON-Schema-like parameter spec.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Clone, Debug)]
pub struct ChatRequest {
    pub messages: Vec<DialogueMessage>,
    pub tools: Vec<ToolSpec>,
    pub allow_tools: bool,
}

/// What came back from one model round trip.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChatOutcome {
    pub content: String,
    pub capability_calls: Vec<CapabilityCall>,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("language model returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("language model transport failure: {0}")]
    Transport(String),
    #[error("language model response was malformed: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatOutcome, LlmError>;
}

/// Chat-completions client for OpenAI-compatible endpoints (OpenAI itself,
/// Ollama's compatibility surface, and Anthropic-compatible proxies).
pub struct OpenAiCompatClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
    max_retries: u32,
}

impl OpenAiCompatClient {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com".to_owned());

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatOutcome, LlmError> {
        let body = request_body(&self.model, request);
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut attempt = 0;
        loop {
            let mut http_request = self.http.post(&url).json(&body);
            if let Some(api_key) = &self.api_key {
                http_request = http_request.bearer_auth(api_key.expose_secret());
            }

            let result = http_request.send().await;
            let retryable = match &result {
                Ok(response) => response.status().is_server_error(),
                Err(_) => true,
            };

            if retryable && attempt < self.max_retries {
                attempt += 1;
                warn!(
                    event_name = "llm.chat.retry",
                    attempt,
                    max_retries = self.max_retries,
                    "retrying language model call"
                );
                continue;
            }

            let response = result.map_err(|error| LlmError::Transport(error.to_string()))?;
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            if !status.is_success() {
                return Err(LlmError::Http { status: status.as_u16(), body: text });
            }

            let payload: Value = serde_json::from_str(&text)
                .map_err(|error| LlmError::Malformed(error.to_string()))?;
            let outcome = parse_outcome(&payload)?;
            debug!(
                event_name = "llm.chat.completed",
                requested_calls = outcome.capability_calls.len(),
                "language model call completed"
            );
            return Ok(outcome);
        }
    }
}

fn request_body(model: &str, request: &ChatRequest) -> Value {
    let messages: Vec<Value> = request.messages.iter().map(wire_message).collect();

    let mut body = Map::new();
    body.insert("model".to_owned(), json!(model));
    body.insert("messages".to_owned(), Value::Array(messages));

    if request.allow_tools && !request.tools.is_empty() {
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    }
                })
            })
            .collect();
        body.insert("tools".to_owned(), Value::Array(tools));
        body.insert("tool_choice".to_owned(), json!("auto"));
    }

    Value::Object(body)
}

fn wire_message(message: &DialogueMessage) -> Value {
    let role = match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };

    let mut wire = Map::new();
    wire.insert("role".to_owned(), json!(role));
    wire.insert("content".to_owned(), json!(message.content));

    if let Some(tool_call_id) = &message.tool_call_id {
        wire.insert("tool_call_id".to_owned(), json!(tool_call_id));
    }

    if !message.capability_calls.is_empty() {
        let calls: Vec<Value> = message
            .capability_calls
            .iter()
            .map(|call| {
                json!({
                    "id": call.id,
                    "type": "function",
                    "function": { "name": call.name, "arguments": call.arguments }
                })
            })
            .collect();
        wire.insert("tool_calls".to_owned(), Value::Array(calls));
    }

    Value::Object(wire)
}

fn parse_outcome(payload: &Value) -> Result<ChatOutcome, LlmError> {
    let message = payload
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| LlmError::Malformed("response carried no choices".to_owned()))?;

    let content = message
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();

    let mut capability_calls = Vec::new();
    if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
        for call in calls {
            let id = call
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| LlmError::Malformed("tool call missing id".to_owned()))?;
            let function = call
                .get("function")
                .ok_or_else(|| LlmError::Malformed("tool call missing function".to_owned()))?;
            let name = function
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| LlmError::Malformed("tool call missing name".to_owned()))?;
            let arguments =
                function.get("arguments").and_then(Value::as_str).unwrap_or("{}").to_owned();

            capability_calls.push(CapabilityCall {
                id: id.to_owned(),
                name: name.to_owned(),
                arguments,
            });
        }
    }

    Ok(ChatOutcome { content, capability_calls })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use tickety_core::capability::CapabilityCall;
    use tickety_core::dialogue::DialogueMessage;

    use super::{parse_outcome, request_body, ChatRequest, ToolSpec};

    fn tool_fixture() -> ToolSpec {
        ToolSpec {
            name: "search_similar_tickets".to_owned(),
            description: "Semantic search over prior tickets.".to_owned(),
            parameters: json!({ "type": "object", "properties": {} }),
        }
    }

    #[test]
    fn tools_are_omitted_when_capability_use_is_disabled() {
        let request = ChatRequest {
            messages: vec![DialogueMessage::user("hello")],
            tools: vec![tool_fixture()],
            allow_tools: false,
        };

        let body = request_body("gpt-test", &request);
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
    }

    #[test]
    fn tools_and_auto_choice_present_when_enabled() {
        let request = ChatRequest {
            messages: vec![DialogueMessage::user("hello")],
            tools: vec![tool_fixture()],
            allow_tools: true,
        };

        let body = request_body("gpt-test", &request);
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["tools"][0]["function"]["name"], "search_similar_tickets");
    }

    #[test]
    fn assistant_call_record_serializes_tool_calls() {
        let message = DialogueMessage::assistant_with_calls(vec![CapabilityCall {
            id: "call-1".to_owned(),
            name: "create_ticket".to_owned(),
            arguments: "{}".to_owned(),
        }]);
        let request =
            ChatRequest { messages: vec![message], tools: Vec::new(), allow_tools: false };

        let body = request_body("gpt-test", &request);
        assert_eq!(body["messages"][0]["tool_calls"][0]["id"], "call-1");
        assert_eq!(body["messages"][0]["tool_calls"][0]["function"]["name"], "create_ticket");
    }

    #[test]
    fn outcome_parses_content_and_calls() {
        let payload = json!({
            "choices": [{
                "message": {
                    "content": "Let me check.",
                    "tool_calls": [{
                        "id": "call-9",
                        "type": "function",
                        "function": {
                            "name": "search_recent_tickets",
                            "arguments": "{\"keywords\":[\"login\"]}"
                        }
                    }]
                }
            }]
        });

        let outcome = parse_outcome(&payload).expect("parse");
        assert_eq!(outcome.content, "Let me check.");
        assert_eq!(outcome.capability_calls.len(), 1);
        assert_eq!(outcome.capability_calls[0].name, "search_recent_tickets");
    }

    #[test]
    fn missing_choices_is_malformed() {
        assert!(parse_outcome(&json!({})).is_err());
    }

    #[test]
    fn null_content_with_calls_parses_as_empty_content() {
        let payload = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call-2",
                        "function": { "name": "list_field_values", "arguments": "{}" }
                    }]
                }
            }]
        });

        let outcome = parse_outcome(&payload).expect("parse");
        assert!(outcome.content.is_empty());
        assert_eq!(outcome.capability_calls[0].id, "call-2");
    }
}

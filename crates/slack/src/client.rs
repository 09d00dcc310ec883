use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use tickety_core::thread::{SourceMessage, SourceThread};

#[derive(Debug, Error)]
pub enum SlackApiError {
    #[error("slack returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("slack transport failure: {0}")]
    Transport(String),
    #[error("slack api error: {0}")]
    Api(String),
    #[error("slack response could not be decoded: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for SlackApiError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport(error.to_string())
    }
}

#[async_trait]
pub trait SlackClient: Send + Sync {
    /// Fetch the full ordered thread under `thread_ts`.
    async fn fetch_thread(
        &self,
        channel: &str,
        thread_ts: &str,
    ) -> Result<SourceThread, SlackApiError>;

    /// Post `text`, threaded under `thread_ts` when given, top-level
    /// otherwise.
    async fn post_message(
        &self,
        channel: &str,
        thread_ts: Option<&str>,
        text: &str,
    ) -> Result<(), SlackApiError>;
}

/// Web API client over `chat.postMessage` / `conversations.replies`.
pub struct HttpSlackClient {
    http: Client,
    base_url: String,
    bot_token: SecretString,
}

impl HttpSlackClient {
    pub fn new(bot_token: SecretString) -> Result<Self, SlackApiError> {
        Self::with_base_url(bot_token, "https://slack.com/api")
    }

    pub fn with_base_url(
        bot_token: SecretString,
        base_url: &str,
    ) -> Result<Self, SlackApiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|error| SlackApiError::Transport(error.to_string()))?;

        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_owned(), bot_token })
    }

    async fn call(&self, method: &str, body: Value) -> Result<Value, SlackApiError> {
        let response = self
            .http
            .post(format!("{}/{method}", self.base_url))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(SlackApiError::Http { status: status.as_u16(), body: text });
        }

        let payload: Value =
            serde_json::from_str(&text).map_err(|error| SlackApiError::Decode(error.to_string()))?;
        if !payload.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            let reason = payload
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error")
                .to_owned();
            return Err(SlackApiError::Api(reason));
        }

        Ok(payload)
    }
}

#[async_trait]
impl SlackClient for HttpSlackClient {
    async fn fetch_thread(
        &self,
        channel: &str,
        thread_ts: &str,
    ) -> Result<SourceThread, SlackApiError> {
        let payload = self
            .call(
                "conversations.replies",
                json!({ "channel": channel, "ts": thread_ts, "limit": 200 }),
            )
            .await?;

        let thread = parse_thread(&payload, thread_ts)?;
        debug!(
            event_name = "slack.thread_fetched",
            thread_ts,
            messages = thread.messages.len(),
            "thread fetched"
        );
        Ok(thread)
    }

    async fn post_message(
        &self,
        channel: &str,
        thread_ts: Option<&str>,
        text: &str,
    ) -> Result<(), SlackApiError> {
        let mut body = json!({ "channel": channel, "text": text });
        if let Some(thread_ts) = thread_ts {
            body["thread_ts"] = json!(thread_ts);
        }

        self.call("chat.postMessage", body).await.map(|_| ())
    }
}

fn parse_thread(payload: &Value, thread_ts: &str) -> Result<SourceThread, SlackApiError> {
    let raw_messages = payload
        .get("messages")
        .and_then(Value::as_array)
        .ok_or_else(|| SlackApiError::Decode("replies response missing messages".to_owned()))?;

    let messages = raw_messages
        .iter()
        .filter_map(|message| {
            let ts = message.get("ts").and_then(Value::as_str)?;
            let author_id = message
                .get("user")
                .or_else(|| message.get("bot_id"))
                .and_then(Value::as_str)?;
            let text = message.get("text").and_then(Value::as_str).unwrap_or_default();
            Some(SourceMessage {
                author_id: author_id.to_owned(),
                text: text.to_owned(),
                ts: ts.to_owned(),
            })
        })
        .collect();

    Ok(SourceThread { lead_ts: thread_ts.to_owned(), messages })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::parse_thread;

    #[test]
    fn thread_parses_in_platform_order() {
        let payload = json!({
            "ok": true,
            "messages": [
                { "user": "U1", "text": "<@U0BOT> checkout broken", "ts": "1.0" },
                { "user": "U0BOT", "text": "Which environment?", "ts": "1.1" },
                { "user": "U1", "text": "prod", "ts": "1.2" }
            ]
        });

        let thread = parse_thread(&payload, "1.0").expect("parse");
        assert_eq!(thread.lead_ts, "1.0");
        assert_eq!(thread.messages.len(), 3);
        assert_eq!(thread.messages[1].author_id, "U0BOT");
        assert_eq!(thread.messages[2].text, "prod");
    }

    #[test]
    fn authorless_system_entries_are_skipped() {
        let payload = json!({
            "ok": true,
            "messages": [
                { "user": "U1", "text": "hello", "ts": "1.0" },
                { "subtype": "channel_join", "text": "joined", "ts": "1.1" }
            ]
        });

        let thread = parse_thread(&payload, "1.0").expect("parse");
        assert_eq!(thread.messages.len(), 1);
    }

    #[test]
    fn missing_messages_array_is_a_decode_error() {
        assert!(parse_thread(&json!({ "ok": true }), "1.0").is_err());
    }
}

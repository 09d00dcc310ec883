use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use tickety_core::capability::FailureDetail;
use tickety_core::config::EmbeddingConfig;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("embedding transport failure: {0}")]
    Transport(String),
    #[error("embedding response could not be decoded: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport(error.to_string())
    }
}

impl From<EmbeddingError> for FailureDetail {
    fn from(error: EmbeddingError) -> Self {
        match error {
            EmbeddingError::Http { status, body } => {
                FailureDetail::http(status, body, "embedding request failed")
                    .named("EmbeddingHttpError")
            }
            EmbeddingError::Transport(message) => {
                FailureDetail::message(message).named("EmbeddingTransportError")
            }
            EmbeddingError::Decode(message) => {
                FailureDetail::message(message).named("EmbeddingDecodeError")
            }
        }
    }
}

#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// OpenAI-compatible `/v1/embeddings` client.
pub struct HttpEmbeddingClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

impl HttpEmbeddingClient {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| EmbeddingError::Transport(error.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut request = self
            .http
            .post(format!("{}/v1/embeddings", self.base_url))
            .json(&json!({ "model": self.model, "input": text }));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(EmbeddingError::Http { status: status.as_u16(), body });
        }

        let parsed: EmbeddingResponse =
            serde_json::from_str(&body).map_err(|error| EmbeddingError::Decode(error.to_string()))?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|datum| datum.embedding)
            .ok_or_else(|| EmbeddingError::Decode("embedding response carried no vectors".to_owned()))
    }
}

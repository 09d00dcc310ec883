use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use tickety_agent::capabilities::{build_registry, CapabilityWiring};
use tickety_agent::conversation::Transcriber;
use tickety_agent::fieldcache::{FieldValueCache, TrackerFieldSource};
use tickety_agent::guardrails::GuardrailPolicy;
use tickety_agent::llm::{LlmError, OpenAiCompatClient};
use tickety_agent::policy::compile_policy;
use tickety_agent::registry::RegistryError;
use tickety_agent::runtime::AgentLoop;
use tickety_core::config::{AppConfig, ConfigError, LoadOptions};
use tickety_retrieval::embedding::{EmbeddingError, HttpEmbeddingClient};
use tickety_retrieval::index::{connect_with_settings, DbPool, SqliteSimilarityIndex};
use tickety_retrieval::lexical::RecentTicketSearch;
use tickety_retrieval::semantic::SemanticSearch;
use tickety_slack::client::{HttpSlackClient, SlackApiError};
use tickety_slack::signature::SignatureVerifier;
use tickety_tracker::client::TrackerError;
use tickety_tracker::http::RestTrackerClient;

use crate::invocation::InvocationService;
use crate::webhook::WebhookState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub webhook_state: WebhookState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("similarity index schema check failed: {0}")]
    IndexSchema(#[source] sqlx::Error),
    #[error("tracker client init failed: {0}")]
    Tracker(#[from] TrackerError),
    #[error("language model client init failed: {0}")]
    Llm(#[from] LlmError),
    #[error("embedding client init failed: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("chat client init failed: {0}")]
    Slack(#[from] SlackApiError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    SqliteSimilarityIndex::ensure_schema(&db_pool).await.map_err(BootstrapError::IndexSchema)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "similarity index database ready"
    );

    let tracker = Arc::new(RestTrackerClient::new(&config.tracker)?);
    let llm = Arc::new(OpenAiCompatClient::new(&config.llm)?);
    let embedding = Arc::new(HttpEmbeddingClient::new(&config.embedding)?);
    let slack = Arc::new(HttpSlackClient::new(config.slack.bot_token.clone())?);

    let index = Arc::new(SqliteSimilarityIndex::new(db_pool.clone()));
    let semantic = Arc::new(SemanticSearch::new(embedding, index, config.agent.relevance_floor));
    let lexical = Arc::new(RecentTicketSearch::new(tracker.clone()));
    let cache = Arc::new(FieldValueCache::new(Arc::new(TrackerFieldSource::new(tracker.clone()))));

    let registry = build_registry(CapabilityWiring {
        semantic,
        lexical,
        tracker,
        cache,
        guardrails: GuardrailPolicy::default(),
    });
    registry.validate_complete()?;
    info!(
        event_name = "system.bootstrap.registry_ready",
        correlation_id = "bootstrap",
        capabilities = registry.len(),
        "capability registry validated"
    );

    let agent = Arc::new(AgentLoop::new(
        llm,
        Arc::new(registry),
        compile_policy(&config.tracker.project_key),
        Duration::from_secs(config.agent.capability_timeout_secs),
    ));

    let invocations = Arc::new(InvocationService::new(
        slack,
        Transcriber::new(config.slack.bot_user_id.clone()),
        agent,
    ));
    let webhook_state = WebhookState {
        verifier: Arc::new(SignatureVerifier::new(config.slack.signing_secret.clone())),
        sink: invocations,
        bot_user_id: config.slack.bot_user_id.clone(),
    };

    Ok(Application { config, db_pool, webhook_state })
}

#[cfg(test)]
mod tests {
    use tickety_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    fn valid_overrides(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                slack_signing_secret: Some("sig-secret".to_string()),
                slack_bot_token: Some("xoxb-test".to_string()),
                slack_bot_user_id: Some("U0BOT".to_string()),
                tracker_base_url: Some("https://example.atlassian.net".to_string()),
                tracker_account_email: Some("bot@example.com".to_string()),
                tracker_api_token: Some("tracker-token".to_string()),
                tracker_project_key: Some("SUP".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_required_slack_settings() {
        let mut options = valid_overrides("sqlite::memory:");
        options.overrides.slack_bot_token = Some("invalid-token".to_string());

        let result = bootstrap(options).await;

        assert!(result.is_err());
        let message = result.err().expect("error").to_string();
        assert!(message.contains("slack.bot_token"));
    }

    #[tokio::test]
    async fn bootstrap_wires_a_complete_registry_and_index_schema() {
        let app = bootstrap(valid_overrides("sqlite::memory:?cache=shared"))
            .await
            .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'issue_chunks'",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("schema query");
        assert_eq!(table_count, 1, "bootstrap should create the similarity index table");

        assert_eq!(app.webhook_state.bot_user_id, "U0BOT");
        app.db_pool.close().await;
    }
}

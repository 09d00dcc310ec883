use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub slack: SlackConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub tracker: TrackerConfig,
    pub agent: AgentConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub signing_secret: SecretString,
    pub bot_token: SecretString,
    pub bot_user_id: String,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct EmbeddingConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct TrackerConfig {
    pub base_url: String,
    pub account_email: String,
    pub api_token: SecretString,
    pub project_key: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub capability_timeout_secs: u64,
    pub retrieval_limit: u32,
    pub relevance_floor: f32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub slack_signing_secret: Option<String>,
    pub slack_bot_token: Option<String>,
    pub slack_bot_user_id: Option<String>,
    pub tracker_base_url: Option<String>,
    pub tracker_account_email: Option<String>,
    pub tracker_api_token: Option<String>,
    pub tracker_project_key: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://tickety.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            slack: SlackConfig {
                signing_secret: String::new().into(),
                bot_token: String::new().into(),
                bot_user_id: String::new(),
            },
            llm: LlmConfig {
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: Some("http://localhost:11434".to_string()),
                model: "llama3.1".to_string(),
                timeout_secs: 60,
                max_retries: 2,
            },
            embedding: EmbeddingConfig {
                api_key: None,
                base_url: "http://localhost:11434".to_string(),
                model: "nomic-embed-text".to_string(),
                timeout_secs: 30,
            },
            tracker: TrackerConfig {
                base_url: String::new(),
                account_email: String::new(),
                api_token: String::new().into(),
                project_key: String::new(),
                timeout_secs: 30,
            },
            agent: AgentConfig {
                capability_timeout_secs: 20,
                retrieval_limit: 5,
                relevance_floor: 0.5,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|anthropic|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("tickety.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(slack) = patch.slack {
            if let Some(signing_secret_value) = slack.signing_secret {
                self.slack.signing_secret = secret_value(signing_secret_value);
            }
            if let Some(bot_token_value) = slack.bot_token {
                self.slack.bot_token = secret_value(bot_token_value);
            }
            if let Some(bot_user_id) = slack.bot_user_id {
                self.slack.bot_user_id = bot_user_id;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(embedding) = patch.embedding {
            if let Some(api_key_value) = embedding.api_key {
                self.embedding.api_key = Some(secret_value(api_key_value));
            }
            if let Some(base_url) = embedding.base_url {
                self.embedding.base_url = base_url;
            }
            if let Some(model) = embedding.model {
                self.embedding.model = model;
            }
            if let Some(timeout_secs) = embedding.timeout_secs {
                self.embedding.timeout_secs = timeout_secs;
            }
        }

        if let Some(tracker) = patch.tracker {
            if let Some(base_url) = tracker.base_url {
                self.tracker.base_url = base_url;
            }
            if let Some(account_email) = tracker.account_email {
                self.tracker.account_email = account_email;
            }
            if let Some(api_token_value) = tracker.api_token {
                self.tracker.api_token = secret_value(api_token_value);
            }
            if let Some(project_key) = tracker.project_key {
                self.tracker.project_key = project_key;
            }
            if let Some(timeout_secs) = tracker.timeout_secs {
                self.tracker.timeout_secs = timeout_secs;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(capability_timeout_secs) = agent.capability_timeout_secs {
                self.agent.capability_timeout_secs = capability_timeout_secs;
            }
            if let Some(retrieval_limit) = agent.retrieval_limit {
                self.agent.retrieval_limit = retrieval_limit;
            }
            if let Some(relevance_floor) = agent.relevance_floor {
                self.agent.relevance_floor = relevance_floor;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("TICKETY_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("TICKETY_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("TICKETY_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("TICKETY_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("TICKETY_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TICKETY_SLACK_SIGNING_SECRET") {
            self.slack.signing_secret = secret_value(value);
        }
        if let Some(value) = read_env("TICKETY_SLACK_BOT_TOKEN") {
            self.slack.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("TICKETY_SLACK_BOT_USER_ID") {
            self.slack.bot_user_id = value;
        }

        if let Some(value) = read_env("TICKETY_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("TICKETY_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("TICKETY_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("TICKETY_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("TICKETY_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("TICKETY_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("TICKETY_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("TICKETY_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("TICKETY_EMBEDDING_API_KEY") {
            self.embedding.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("TICKETY_EMBEDDING_BASE_URL") {
            self.embedding.base_url = value;
        }
        if let Some(value) = read_env("TICKETY_EMBEDDING_MODEL") {
            self.embedding.model = value;
        }
        if let Some(value) = read_env("TICKETY_EMBEDDING_TIMEOUT_SECS") {
            self.embedding.timeout_secs = parse_u64("TICKETY_EMBEDDING_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TICKETY_TRACKER_BASE_URL") {
            self.tracker.base_url = value;
        }
        if let Some(value) = read_env("TICKETY_TRACKER_ACCOUNT_EMAIL") {
            self.tracker.account_email = value;
        }
        if let Some(value) = read_env("TICKETY_TRACKER_API_TOKEN") {
            self.tracker.api_token = secret_value(value);
        }
        if let Some(value) = read_env("TICKETY_TRACKER_PROJECT_KEY") {
            self.tracker.project_key = value;
        }
        if let Some(value) = read_env("TICKETY_TRACKER_TIMEOUT_SECS") {
            self.tracker.timeout_secs = parse_u64("TICKETY_TRACKER_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TICKETY_AGENT_CAPABILITY_TIMEOUT_SECS") {
            self.agent.capability_timeout_secs =
                parse_u64("TICKETY_AGENT_CAPABILITY_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("TICKETY_AGENT_RETRIEVAL_LIMIT") {
            self.agent.retrieval_limit = parse_u32("TICKETY_AGENT_RETRIEVAL_LIMIT", &value)?;
        }
        if let Some(value) = read_env("TICKETY_AGENT_RELEVANCE_FLOOR") {
            self.agent.relevance_floor = parse_f32("TICKETY_AGENT_RELEVANCE_FLOOR", &value)?;
        }

        if let Some(value) = read_env("TICKETY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("TICKETY_SERVER_PORT") {
            self.server.port = parse_u16("TICKETY_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("TICKETY_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("TICKETY_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("TICKETY_LOGGING_LEVEL").or_else(|| read_env("TICKETY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("TICKETY_LOGGING_FORMAT").or_else(|| read_env("TICKETY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(signing_secret) = overrides.slack_signing_secret {
            self.slack.signing_secret = secret_value(signing_secret);
        }
        if let Some(bot_token) = overrides.slack_bot_token {
            self.slack.bot_token = secret_value(bot_token);
        }
        if let Some(bot_user_id) = overrides.slack_bot_user_id {
            self.slack.bot_user_id = bot_user_id;
        }
        if let Some(base_url) = overrides.tracker_base_url {
            self.tracker.base_url = base_url;
        }
        if let Some(account_email) = overrides.tracker_account_email {
            self.tracker.account_email = account_email;
        }
        if let Some(api_token) = overrides.tracker_api_token {
            self.tracker.api_token = secret_value(api_token);
        }
        if let Some(project_key) = overrides.tracker_project_key {
            self.tracker.project_key = project_key;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_slack(&self.slack)?;
        validate_llm(&self.llm)?;
        validate_embedding(&self.embedding)?;
        validate_tracker(&self.tracker)?;
        validate_agent(&self.agent)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("tickety.toml"), PathBuf::from("config/tickety.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    if slack.signing_secret.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "slack.signing_secret is required. Get it from https://api.slack.com/apps > Your App > Basic Information > Signing Secret".to_string()
        ));
    }

    let bot_token = slack.bot_token.expose_secret();
    if bot_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.bot_token is required. Get it from https://api.slack.com/apps > Your App > OAuth & Permissions > Bot User OAuth Token".to_string()
        ));
    }
    if !bot_token.starts_with("xoxb-") {
        return Err(ConfigError::Validation(
            "slack.bot_token must start with `xoxb-`. Get it from https://api.slack.com/apps"
                .to_string(),
        ));
    }

    if slack.bot_user_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "slack.bot_user_id is required so the bot can tell its own thread messages apart"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    match llm.provider {
        LlmProvider::OpenAi | LlmProvider::Anthropic => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for openai/anthropic providers".to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {
            let missing =
                llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.base_url is required for ollama provider".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_embedding(embedding: &EmbeddingConfig) -> Result<(), ConfigError> {
    if embedding.base_url.trim().is_empty() {
        return Err(ConfigError::Validation("embedding.base_url must not be empty".to_string()));
    }
    if embedding.model.trim().is_empty() {
        return Err(ConfigError::Validation("embedding.model must not be empty".to_string()));
    }
    if embedding.timeout_secs == 0 || embedding.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "embedding.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_tracker(tracker: &TrackerConfig) -> Result<(), ConfigError> {
    let base_url = tracker.base_url.trim();
    if base_url.is_empty() {
        return Err(ConfigError::Validation(
            "tracker.base_url is required (e.g. https://your-site.atlassian.net)".to_string(),
        ));
    }
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "tracker.base_url must start with http:// or https://".to_string(),
        ));
    }

    if tracker.account_email.trim().is_empty() {
        return Err(ConfigError::Validation(
            "tracker.account_email is required for tracker API authentication".to_string(),
        ));
    }

    if tracker.api_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "tracker.api_token is required for tracker API authentication".to_string(),
        ));
    }

    let project_key = tracker.project_key.trim();
    if project_key.is_empty() {
        return Err(ConfigError::Validation(
            "tracker.project_key is required; tickets are always filed in the configured project"
                .to_string(),
        ));
    }
    if !project_key.chars().all(|ch| ch.is_ascii_alphanumeric()) {
        return Err(ConfigError::Validation(
            "tracker.project_key must be alphanumeric (e.g. SUP, OPS1)".to_string(),
        ));
    }

    if tracker.timeout_secs == 0 || tracker.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "tracker.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if agent.capability_timeout_secs == 0 || agent.capability_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "agent.capability_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if agent.retrieval_limit == 0 || agent.retrieval_limit > 50 {
        return Err(ConfigError::Validation(
            "agent.retrieval_limit must be in range 1..=50".to_string(),
        ));
    }

    if !(agent.relevance_floor > 0.0 && agent.relevance_floor < 1.0) {
        return Err(ConfigError::Validation(
            "agent.relevance_floor must be strictly between 0 and 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.parse::<f32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    slack: Option<SlackPatch>,
    llm: Option<LlmPatch>,
    embedding: Option<EmbeddingPatch>,
    tracker: Option<TrackerPatch>,
    agent: Option<AgentPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    signing_secret: Option<String>,
    bot_token: Option<String>,
    bot_user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct EmbeddingPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TrackerPatch {
    base_url: Option<String>,
    account_email: Option<String>,
    api_token: Option<String>,
    project_key: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    capability_timeout_secs: Option<u64>,
    retrieval_limit: Option<u32>,
    relevance_floor: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

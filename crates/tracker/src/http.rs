use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::debug;

use tickety_core::config::TrackerConfig;
use tickety_core::fields::{FieldOption, FieldValueMap};
use tickety_core::ticket::CreatedTicket;

use crate::client::{IssueSummary, NewIssue, TrackerClient, TrackerError, TrackerUser};

/// REST client for a Jira-shaped tracker.
///
/// Brand and environment are carried as prefixed labels (`brand:*`,
/// `env:*`); their enumerations come from the create-meta field catalog.
pub struct RestTrackerClient {
    http: Client,
    base_url: String,
    account_email: String,
    api_token: SecretString,
    project_key: String,
}

impl RestTrackerClient {
    pub fn new(config: &TrackerConfig) -> Result<Self, TrackerError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| TrackerError::Transport(error.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            account_email: config.account_email.clone(),
            api_token: config.api_token.clone(),
            project_key: config.project_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn browse_url(&self, key: &str) -> String {
        format!("{}/browse/{key}", self.base_url)
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, TrackerError> {
        let response = self
            .http
            .get(self.endpoint(path))
            .basic_auth(&self.account_email, Some(self.api_token.expose_secret()))
            .query(query)
            .send()
            .await?;
        decode_json(response).await
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, TrackerError> {
        let response = self
            .http
            .post(self.endpoint(path))
            .basic_auth(&self.account_email, Some(self.api_token.expose_secret()))
            .json(body)
            .send()
            .await?;
        decode_json(response).await
    }

    async fn put_json(&self, path: &str, body: &Value) -> Result<(), TrackerError> {
        let response = self
            .http
            .put(self.endpoint(path))
            .basic_auth(&self.account_email, Some(self.api_token.expose_secret()))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TrackerError::Http { status: status.as_u16(), body });
        }
        Ok(())
    }
}

async fn decode_json(response: Response) -> Result<Value, TrackerError> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if !status.is_success() {
        return Err(TrackerError::Http { status: status.as_u16(), body });
    }
    if status == StatusCode::NO_CONTENT || body.is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(&body).map_err(|error| TrackerError::Decode(error.to_string()))
}

#[async_trait::async_trait]
impl TrackerClient for RestTrackerClient {
    async fn create_issue(&self, issue: &NewIssue) -> Result<CreatedTicket, TrackerError> {
        let body = creation_body(&self.project_key, issue);
        let created = self.post_json("/rest/api/2/issue", &body).await?;

        let key = created
            .get("key")
            .and_then(Value::as_str)
            .ok_or_else(|| TrackerError::Decode("issue creation response missing key".to_owned()))?;

        debug!(event_name = "tracker.issue_created", issue_key = key, "tracker issue created");
        Ok(CreatedTicket { key: key.to_owned(), url: self.browse_url(key) })
    }

    async fn assign_issue(&self, issue_key: &str, assignee_id: &str) -> Result<(), TrackerError> {
        self.put_json(
            &format!("/rest/api/2/issue/{issue_key}/assignee"),
            &json!({ "accountId": assignee_id }),
        )
        .await
    }

    async fn search_recent(
        &self,
        text: &str,
        limit: u32,
    ) -> Result<Vec<IssueSummary>, TrackerError> {
        let jql = recency_jql(&self.project_key, text);
        let payload = self
            .get_json(
                "/rest/api/2/search",
                &[
                    ("jql", jql),
                    ("maxResults", limit.to_string()),
                    ("fields", "summary,status,created".to_owned()),
                ],
            )
            .await?;

        parse_search_results(&payload, &self.base_url)
    }

    async fn list_users(&self, query: Option<&str>) -> Result<Vec<TrackerUser>, TrackerError> {
        let mut params = vec![("project", self.project_key.clone())];
        if let Some(query) = query {
            params.push(("query", query.to_owned()));
        }

        let payload = self.get_json("/rest/api/2/user/assignable/search", &params).await?;
        parse_users(&payload)
    }

    async fn fetch_field_catalog(&self) -> Result<FieldValueMap, TrackerError> {
        let issue_types = self.get_json("/rest/api/2/issuetype", &[]).await?;
        let priorities = self.get_json("/rest/api/2/priority", &[]).await?;
        let components = self
            .get_json(&format!("/rest/api/2/project/{}/components", self.project_key), &[])
            .await?;
        let create_meta = self
            .get_json(
                "/rest/api/2/issue/createmeta",
                &[
                    ("projectKeys", self.project_key.clone()),
                    ("expand", "projects.issuetypes.fields".to_owned()),
                ],
            )
            .await?;

        Ok(FieldValueMap {
            issue_types: parse_named_options(&issue_types, "name", "id"),
            priorities: parse_named_options(&priorities, "name", "id"),
            components: parse_named_options(&components, "name", "id"),
            brands: parse_allowed_values(&create_meta, "Brand"),
            environments: parse_allowed_values(&create_meta, "Environment"),
        })
    }
}

fn creation_body(project_key: &str, issue: &NewIssue) -> Value {
    json!({
        "fields": {
            "project": { "key": project_key },
            "issuetype": { "id": issue.issue_type },
            "priority": { "id": issue.priority },
            "summary": issue.summary,
            "description": issue.description,
            "components": [{ "id": issue.component }],
            "labels": [
                format!("brand:{}", issue.brand),
                format!("env:{}", issue.environment),
            ],
        }
    })
}

fn recency_jql(project_key: &str, text: &str) -> String {
    let sanitized = text.replace('"', " ");
    format!("project = {project_key} AND text ~ \"{sanitized}\" ORDER BY created DESC")
}

fn parse_search_results(payload: &Value, base_url: &str) -> Result<Vec<IssueSummary>, TrackerError> {
    let issues = payload
        .get("issues")
        .and_then(Value::as_array)
        .ok_or_else(|| TrackerError::Decode("search response missing issues array".to_owned()))?;

    let mut summaries = Vec::with_capacity(issues.len());
    for issue in issues {
        let key = issue
            .get("key")
            .and_then(Value::as_str)
            .ok_or_else(|| TrackerError::Decode("search result missing key".to_owned()))?;
        let fields = issue.get("fields").cloned().unwrap_or(Value::Null);

        let title =
            fields.get("summary").and_then(Value::as_str).unwrap_or("(no summary)").to_owned();
        let status = fields
            .get("status")
            .and_then(|status| status.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_owned();
        let created_at = fields
            .get("created")
            .and_then(Value::as_str)
            .and_then(|raw| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.3f%z").ok())
            .map(|parsed| parsed.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        summaries.push(IssueSummary {
            key: key.to_owned(),
            title,
            url: format!("{base_url}/browse/{key}"),
            status,
            created_at,
        });
    }

    Ok(summaries)
}

fn parse_users(payload: &Value) -> Result<Vec<TrackerUser>, TrackerError> {
    let users = payload
        .as_array()
        .ok_or_else(|| TrackerError::Decode("user search response was not an array".to_owned()))?;

    Ok(users
        .iter()
        .filter_map(|user| {
            let account_id = user.get("accountId").and_then(Value::as_str)?;
            let display_name = user.get("displayName").and_then(Value::as_str)?;
            Some(TrackerUser {
                account_id: account_id.to_owned(),
                display_name: display_name.to_owned(),
                active: user.get("active").and_then(Value::as_bool).unwrap_or(true),
            })
        })
        .collect())
}

fn parse_named_options(payload: &Value, name_key: &str, value_key: &str) -> Vec<FieldOption> {
    payload
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    let display_name = entry.get(name_key).and_then(Value::as_str)?;
                    let raw_value = entry.get(value_key).and_then(Value::as_str)?;
                    Some(FieldOption::new(display_name, raw_value))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Scan create-meta for a custom select field by display name and collect
/// its allowed values.
fn parse_allowed_values(create_meta: &Value, field_name: &str) -> Vec<FieldOption> {
    let mut options = Vec::new();

    let projects = create_meta.get("projects").and_then(Value::as_array);
    for project in projects.into_iter().flatten() {
        let issue_types = project.get("issuetypes").and_then(Value::as_array);
        for issue_type in issue_types.into_iter().flatten() {
            let fields = issue_type.get("fields").and_then(Value::as_object);
            for field in fields.into_iter().flat_map(|map| map.values()) {
                let matches_name = field
                    .get("name")
                    .and_then(Value::as_str)
                    .is_some_and(|name| name.eq_ignore_ascii_case(field_name));
                if !matches_name {
                    continue;
                }

                let allowed = field.get("allowedValues").and_then(Value::as_array);
                for value in allowed.into_iter().flatten() {
                    let display_name = value
                        .get("value")
                        .or_else(|| value.get("name"))
                        .and_then(Value::as_str);
                    let raw_value = value.get("id").and_then(Value::as_str);
                    if let (Some(display_name), Some(raw_value)) = (display_name, raw_value) {
                        let option = FieldOption::new(display_name, raw_value);
                        if !options.contains(&option) {
                            options.push(option);
                        }
                    }
                }
            }
        }
    }

    options
}

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::info;

use tickety_core::capability::FailureDetail;
use tickety_core::fields::FieldValueMap;
use tickety_core::ticket::TicketDraft;
use tickety_retrieval::lexical::RecentTicketSearch;
use tickety_retrieval::semantic::SemanticSearch;
use tickety_tracker::client::{NewIssue, TrackerClient};

use crate::fieldcache::FieldValueCache;
use crate::guardrails::{GuardrailDecision, GuardrailPolicy};
use crate::registry::{
    integer_argument, string_argument, CapabilityHandler, CapabilityKind, CapabilityRegistry,
    InvocationContext,
};

const MAX_RESULT_LIMIT: i64 = 20;
const MAX_KEYWORDS: usize = 4;

fn clamp_limit(requested: Option<i64>) -> Option<u32> {
    requested.map(|value| value.clamp(1, MAX_RESULT_LIMIT) as u32)
}

pub struct SimilarTicketsHandler {
    search: Arc<SemanticSearch>,
}

impl SimilarTicketsHandler {
    pub fn new(search: Arc<SemanticSearch>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl CapabilityHandler for SimilarTicketsHandler {
    async fn invoke(
        &self,
        _ctx: &InvocationContext,
        arguments: Map<String, Value>,
    ) -> Result<Value, FailureDetail> {
        let query = string_argument(&arguments, "query")
            .ok_or_else(|| FailureDetail::coded("invalid_arguments", "query must be a string"))?;
        let limit = clamp_limit(integer_argument(&arguments, "limit"));

        let records = self.search.search(&query, limit).await.map_err(FailureDetail::from)?;
        let candidates: Vec<Value> = records
            .iter()
            .map(|record| serde_json::to_value(record.to_candidate()).unwrap_or(Value::Null))
            .collect();

        Ok(json!({ "results": candidates }))
    }
}

pub struct RecentTicketsHandler {
    search: Arc<RecentTicketSearch>,
}

impl RecentTicketsHandler {
    pub fn new(search: Arc<RecentTicketSearch>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl CapabilityHandler for RecentTicketsHandler {
    async fn invoke(
        &self,
        _ctx: &InvocationContext,
        arguments: Map<String, Value>,
    ) -> Result<Value, FailureDetail> {
        let keywords = arguments
            .get("keywords")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .take(MAX_KEYWORDS)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        if keywords.is_empty() {
            return Err(FailureDetail::coded(
                "invalid_arguments",
                "keywords must contain at least one string",
            ));
        }
        let limit = clamp_limit(integer_argument(&arguments, "limit"));

        let candidates =
            self.search.search(&keywords, limit).await.map_err(FailureDetail::from)?;
        Ok(json!({ "results": candidates }))
    }
}

pub struct FieldValuesHandler {
    cache: Arc<FieldValueCache>,
}

impl FieldValuesHandler {
    pub fn new(cache: Arc<FieldValueCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl CapabilityHandler for FieldValuesHandler {
    async fn invoke(
        &self,
        _ctx: &InvocationContext,
        _arguments: Map<String, Value>,
    ) -> Result<Value, FailureDetail> {
        let snapshot = self.cache.get().await?;
        serde_json::to_value(snapshot)
            .map_err(|error| FailureDetail::message(format!("snapshot serialization failed: {error}")))
    }
}

pub struct ValidateFieldsHandler {
    cache: Arc<FieldValueCache>,
}

impl ValidateFieldsHandler {
    pub fn new(cache: Arc<FieldValueCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl CapabilityHandler for ValidateFieldsHandler {
    async fn invoke(
        &self,
        _ctx: &InvocationContext,
        arguments: Map<String, Value>,
    ) -> Result<Value, FailureDetail> {
        let snapshot = self.cache.get().await?;

        let mut report = Map::new();
        let mut all_resolved = true;
        for (field, options) in [
            ("issue_type", &snapshot.issue_types),
            ("priority", &snapshot.priorities),
            ("brand", &snapshot.brands),
            ("component", &snapshot.components),
            ("environment", &snapshot.environments),
        ] {
            let entry = match string_argument(&arguments, field) {
                None => {
                    all_resolved = false;
                    json!({ "status": "missing" })
                }
                Some(candidate) => match tickety_core::fields::resolve(options, &candidate) {
                    Some(option) => json!({
                        "status": "resolved",
                        "display_name": option.display_name,
                        "raw_value": option.raw_value,
                    }),
                    None => {
                        all_resolved = false;
                        let allowed: Vec<&str> = options
                            .iter()
                            .map(|option| option.display_name.as_str())
                            .collect();
                        json!({ "status": "unknown", "allowed": allowed })
                    }
                },
            };
            report.insert(field.to_owned(), entry);
        }

        Ok(json!({ "valid": all_resolved, "fields": report }))
    }
}

pub struct CreateTicketHandler {
    tracker: Arc<dyn TrackerClient>,
    cache: Arc<FieldValueCache>,
    guardrails: GuardrailPolicy,
}

impl CreateTicketHandler {
    pub fn new(
        tracker: Arc<dyn TrackerClient>,
        cache: Arc<FieldValueCache>,
        guardrails: GuardrailPolicy,
    ) -> Self {
        Self { tracker, cache, guardrails }
    }
}

#[async_trait]
impl CapabilityHandler for CreateTicketHandler {
    async fn invoke(
        &self,
        ctx: &InvocationContext,
        arguments: Map<String, Value>,
    ) -> Result<Value, FailureDetail> {
        let draft = draft_from_arguments(&arguments)?;
        let snapshot = self.cache.get().await?;

        if let GuardrailDecision::Deny { reason_code, user_message } =
            self.guardrails.evaluate_creation(&ctx.dialogue, &draft, snapshot)
        {
            return Err(FailureDetail::coded(reason_code, user_message).named("GuardrailDenied"));
        }

        let issue = resolve_issue(&draft, snapshot);
        let ticket = self.tracker.create_issue(&issue).await.map_err(FailureDetail::from)?;
        info!(
            event_name = "capability.create_ticket.created",
            ticket_key = %ticket.key,
            "ticket created"
        );

        // Assignment failure is reported next to the created ticket; it must
        // never mask creation success.
        let assignment = match &draft.assignee_id {
            None => Value::Null,
            Some(assignee_id) => {
                match self.tracker.assign_issue(&ticket.key, assignee_id).await {
                    Ok(()) => json!({ "status": "assigned", "assignee_id": assignee_id }),
                    Err(error) => {
                        json!({ "status": "failed", "error": FailureDetail::from(error) })
                    }
                }
            }
        };

        Ok(json!({ "ticket": ticket, "assignment": assignment }))
    }
}

fn draft_from_arguments(arguments: &Map<String, Value>) -> Result<TicketDraft, FailureDetail> {
    let field = |name: &str| {
        string_argument(arguments, name).ok_or_else(|| {
            FailureDetail::coded("invalid_arguments", format!("`{name}` must be a string"))
        })
    };

    Ok(TicketDraft {
        issue_type: field("issue_type")?,
        priority: field("priority")?,
        summary: field("summary")?,
        description: field("description")?,
        brand: field("brand")?,
        component: field("component")?,
        environment: field("environment")?,
        assignee_id: string_argument(arguments, "assignee_id"),
    })
}

/// Map confirmed display values onto the raw values the tracker expects.
/// The guardrail has already established that every value resolves (or that
/// the dimension has no published options, in which case the value passes
/// through unchanged).
fn resolve_issue(draft: &TicketDraft, snapshot: &FieldValueMap) -> NewIssue {
    let raw = |options: &[tickety_core::fields::FieldOption], value: &str| {
        tickety_core::fields::resolve(options, value)
            .map(|option| option.raw_value.clone())
            .unwrap_or_else(|| value.to_owned())
    };

    NewIssue {
        issue_type: raw(&snapshot.issue_types, &draft.issue_type),
        priority: raw(&snapshot.priorities, &draft.priority),
        summary: draft.summary.clone(),
        description: draft.description.clone(),
        brand: raw(&snapshot.brands, &draft.brand),
        component: raw(&snapshot.components, &draft.component),
        environment: raw(&snapshot.environments, &draft.environment),
    }
}

pub struct ListUsersHandler {
    tracker: Arc<dyn TrackerClient>,
}

impl ListUsersHandler {
    pub fn new(tracker: Arc<dyn TrackerClient>) -> Self {
        Self { tracker }
    }
}

#[async_trait]
impl CapabilityHandler for ListUsersHandler {
    async fn invoke(
        &self,
        _ctx: &InvocationContext,
        arguments: Map<String, Value>,
    ) -> Result<Value, FailureDetail> {
        let query = string_argument(&arguments, "query");
        let users =
            self.tracker.list_users(query.as_deref()).await.map_err(FailureDetail::from)?;
        Ok(json!({ "users": users }))
    }
}

/// Wire every capability into a complete registry.
pub struct CapabilityWiring {
    pub semantic: Arc<SemanticSearch>,
    pub lexical: Arc<RecentTicketSearch>,
    pub tracker: Arc<dyn TrackerClient>,
    pub cache: Arc<FieldValueCache>,
    pub guardrails: GuardrailPolicy,
}

pub fn build_registry(wiring: CapabilityWiring) -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();
    registry.register(
        CapabilityKind::SearchSimilarTickets,
        SimilarTicketsHandler::new(wiring.semantic),
    );
    registry.register(
        CapabilityKind::SearchRecentTickets,
        RecentTicketsHandler::new(wiring.lexical),
    );
    registry.register(
        CapabilityKind::ListFieldValues,
        FieldValuesHandler::new(Arc::clone(&wiring.cache)),
    );
    registry.register(
        CapabilityKind::ValidateTicketFields,
        ValidateFieldsHandler::new(Arc::clone(&wiring.cache)),
    );
    registry.register(
        CapabilityKind::CreateTicket,
        CreateTicketHandler::new(
            Arc::clone(&wiring.tracker),
            Arc::clone(&wiring.cache),
            wiring.guardrails,
        ),
    );
    registry.register(CapabilityKind::ListAssignableUsers, ListUsersHandler::new(wiring.tracker));
    registry
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::{json, Map, Value};
    use tokio::sync::Mutex;

    use tickety_core::capability::FailureDetail;
    use tickety_core::dialogue::DialogueMessage;
    use tickety_core::fields::{FieldOption, FieldValueMap};
    use tickety_core::ticket::CreatedTicket;
    use tickety_tracker::client::{
        IssueSummary, NewIssue, TrackerClient, TrackerError, TrackerUser,
    };

    use crate::fieldcache::FieldValueCache;
    use crate::guardrails::GuardrailPolicy;
    use crate::registry::{CapabilityHandler, InvocationContext};

    use super::{CreateTicketHandler, ValidateFieldsHandler};

    #[derive(Default)]
    struct ScriptedTracker {
        created: Mutex<Vec<NewIssue>>,
        fail_assignment: bool,
    }

    #[async_trait]
    impl TrackerClient for ScriptedTracker {
        async fn create_issue(&self, issue: &NewIssue) -> Result<CreatedTicket, TrackerError> {
            self.created.lock().await.push(issue.clone());
            Ok(CreatedTicket {
                key: "SUP-100".to_owned(),
                url: "https://example.atlassian.net/browse/SUP-100".to_owned(),
            })
        }

        async fn assign_issue(
            &self,
            _issue_key: &str,
            _assignee_id: &str,
        ) -> Result<(), TrackerError> {
            if self.fail_assignment {
                Err(TrackerError::Http { status: 403, body: "no permission".to_owned() })
            } else {
                Ok(())
            }
        }

        async fn search_recent(
            &self,
            _text: &str,
            _limit: u32,
        ) -> Result<Vec<IssueSummary>, TrackerError> {
            Ok(Vec::new())
        }

        async fn list_users(&self, _query: Option<&str>) -> Result<Vec<TrackerUser>, TrackerError> {
            Ok(Vec::new())
        }

        async fn fetch_field_catalog(&self) -> Result<FieldValueMap, TrackerError> {
            Ok(FieldValueMap::default())
        }
    }

    fn snapshot() -> FieldValueMap {
        FieldValueMap {
            issue_types: vec![FieldOption::new("Bug", "10004")],
            priorities: vec![FieldOption::new("Medium", "Medium-P2")],
            components: vec![FieldOption::new("Checkout", "comp-11")],
            brands: Vec::new(),
            environments: vec![FieldOption::new("Production", "prod")],
        }
    }

    fn confirmed_context() -> InvocationContext {
        InvocationContext::new(vec![
            DialogueMessage::user("checkout is broken in prod"),
            DialogueMessage::assistant("Draft: Bug / Medium / Checkout / Production. Create it?"),
            DialogueMessage::user("yes"),
        ])
    }

    fn create_arguments(priority: &str, assignee: Option<&str>) -> Map<String, Value> {
        let mut arguments = Map::new();
        arguments.insert("issue_type".to_owned(), json!("Bug"));
        arguments.insert("priority".to_owned(), json!(priority));
        arguments.insert("summary".to_owned(), json!("Checkout button unresponsive"));
        arguments.insert("description".to_owned(), json!("See thread"));
        arguments.insert("brand".to_owned(), json!("Acme"));
        arguments.insert("component".to_owned(), json!("Checkout"));
        arguments.insert("environment".to_owned(), json!("Production"));
        if let Some(assignee) = assignee {
            arguments.insert("assignee_id".to_owned(), json!(assignee));
        }
        arguments
    }

    #[tokio::test]
    async fn validation_reports_per_field_status() {
        let cache = Arc::new(FieldValueCache::preloaded(snapshot()));
        let handler = ValidateFieldsHandler::new(cache);

        let mut arguments = Map::new();
        arguments.insert("priority".to_owned(), json!("medium"));
        arguments.insert("component".to_owned(), json!("Billing"));

        let report = handler
            .invoke(&InvocationContext::default(), arguments)
            .await
            .expect("validation runs");

        assert_eq!(report["valid"], false);
        assert_eq!(report["fields"]["priority"]["status"], "resolved");
        assert_eq!(report["fields"]["priority"]["raw_value"], "Medium-P2");
        assert_eq!(report["fields"]["component"]["status"], "unknown");
        assert_eq!(report["fields"]["component"]["allowed"][0], "Checkout");
        assert_eq!(report["fields"]["issue_type"]["status"], "missing");
    }

    #[tokio::test]
    async fn creation_passes_raw_values_to_the_tracker() {
        let tracker = Arc::new(ScriptedTracker::default());
        let handler = CreateTicketHandler::new(
            tracker.clone(),
            Arc::new(FieldValueCache::preloaded(snapshot())),
            GuardrailPolicy::default(),
        );

        let payload = handler
            .invoke(&confirmed_context(), create_arguments("Medium", None))
            .await
            .expect("creation succeeds");

        assert_eq!(payload["ticket"]["key"], "SUP-100");
        assert_eq!(payload["assignment"], Value::Null);

        let created = tracker.created.lock().await;
        assert_eq!(created[0].priority, "Medium-P2");
        assert_eq!(created[0].issue_type, "10004");
        assert_eq!(created[0].environment, "prod");
    }

    #[tokio::test]
    async fn fabricated_priority_never_reaches_the_tracker() {
        let tracker = Arc::new(ScriptedTracker::default());
        let handler = CreateTicketHandler::new(
            tracker.clone(),
            Arc::new(FieldValueCache::preloaded(snapshot())),
            GuardrailPolicy::default(),
        );

        let error = handler
            .invoke(&confirmed_context(), create_arguments("Blocker", None))
            .await
            .expect_err("fabricated value must be denied");

        assert_eq!(error.code.as_deref(), Some("unvalidated_field_values"));
        assert!(tracker.created.lock().await.is_empty());
    }

    #[tokio::test]
    async fn assignment_failure_is_reported_alongside_creation_success() {
        let tracker = Arc::new(ScriptedTracker { fail_assignment: true, ..Default::default() });
        let handler = CreateTicketHandler::new(
            tracker,
            Arc::new(FieldValueCache::preloaded(snapshot())),
            GuardrailPolicy::default(),
        );

        let payload = handler
            .invoke(&confirmed_context(), create_arguments("Medium", Some("acc-9")))
            .await
            .expect("creation itself succeeds");

        assert_eq!(payload["ticket"]["key"], "SUP-100");
        assert_eq!(payload["assignment"]["status"], "failed");
        assert_eq!(payload["assignment"]["error"]["http_status"], 403);
    }
}

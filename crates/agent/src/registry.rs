use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use thiserror::Error;

use tickety_core::capability::FailureDetail;
use tickety_core::dialogue::DialogueMessage;

use crate::llm::ToolSpec;

/// Closed set of capabilities the model may request.
///
/// Dispatch resolves through this enum, so an unknown capability can only
/// originate from the model, never from wiring; a missing handler is a
/// startup error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    SearchSimilarTickets,
    SearchRecentTickets,
    ListFieldValues,
    ValidateTicketFields,
    CreateTicket,
    ListAssignableUsers,
}

impl CapabilityKind {
    pub const ALL: [CapabilityKind; 6] = [
        CapabilityKind::SearchSimilarTickets,
        CapabilityKind::SearchRecentTickets,
        CapabilityKind::ListFieldValues,
        CapabilityKind::ValidateTicketFields,
        CapabilityKind::CreateTicket,
        CapabilityKind::ListAssignableUsers,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::SearchSimilarTickets => "search_similar_tickets",
            Self::SearchRecentTickets => "search_recent_tickets",
            Self::ListFieldValues => "list_field_values",
            Self::ValidateTicketFields => "validate_ticket_fields",
            Self::CreateTicket => "create_ticket",
            Self::ListAssignableUsers => "list_assignable_users",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Static schema consulted when compiling the model-facing manifest.
    /// Descriptions are load-bearing: they are the only specification of
    /// correct usage the model ever sees.
    pub fn spec(self) -> CapabilitySpec {
        match self {
            Self::SearchSimilarTickets => CapabilitySpec {
                name: self.name(),
                description:
                    "Search previously filed tickets by meaning. Use when the user describes a \
                     problem and similar past tickets could help. Returns at most `limit` \
                     records (default 5), each with title, link and a relevance score in (0,1].",
                params: &[
                    ParamSpec {
                        name: "query",
                        kind: ParamKind::String,
                        required: true,
                        description: "Free-text description of the problem, one sentence.",
                    },
                    ParamSpec {
                        name: "limit",
                        kind: ParamKind::Integer,
                        required: false,
                        description: "Maximum number of records to return, 1-20. Default 5.",
                    },
                ],
            },
            Self::SearchRecentTickets => CapabilitySpec {
                name: self.name(),
                description:
                    "Keyword search over the project's tickets, most recent first. Use for \
                     exact terms (error codes, feature names). No more than 4 keywords.",
                params: &[
                    ParamSpec {
                        name: "keywords",
                        kind: ParamKind::StringArray,
                        required: true,
                        description: "Up to 4 keywords; extra keywords are ignored.",
                    },
                    ParamSpec {
                        name: "limit",
                        kind: ParamKind::Integer,
                        required: false,
                        description: "Maximum number of records to return, 1-20. Default 5.",
                    },
                ],
            },
            Self::ListFieldValues => CapabilitySpec {
                name: self.name(),
                description:
                    "List the tracker's allowed values for issue type, priority, component, \
                     brand and environment. Only values returned here may be used in a ticket.",
                params: &[],
            },
            Self::ValidateTicketFields => CapabilitySpec {
                name: self.name(),
                description:
                    "Check proposed ticket field values against the tracker's allowed values. \
                     Call this before proposing a ticket to the user. Every field is optional; \
                     omitted fields are reported as missing.",
                params: &[
                    ParamSpec {
                        name: "issue_type",
                        kind: ParamKind::String,
                        required: false,
                        description: "Proposed issue type display name.",
                    },
                    ParamSpec {
                        name: "priority",
                        kind: ParamKind::String,
                        required: false,
                        description: "Proposed priority display name.",
                    },
                    ParamSpec {
                        name: "brand",
                        kind: ParamKind::String,
                        required: false,
                        description: "Proposed brand display name.",
                    },
                    ParamSpec {
                        name: "component",
                        kind: ParamKind::String,
                        required: false,
                        description: "Proposed component display name.",
                    },
                    ParamSpec {
                        name: "environment",
                        kind: ParamKind::String,
                        required: false,
                        description: "Proposed environment display name.",
                    },
                ],
            },
            Self::CreateTicket => CapabilitySpec {
                name: self.name(),
                description:
                    "Create the ticket. Only call after the user has explicitly confirmed the \
                     complete draft in this thread, and only with field values previously seen \
                     in validation results. The project is fixed by configuration. Optionally \
                     assigns the ticket when `assignee_id` is given.",
                params: &[
                    ParamSpec {
                        name: "issue_type",
                        kind: ParamKind::String,
                        required: true,
                        description: "Confirmed issue type display name.",
                    },
                    ParamSpec {
                        name: "priority",
                        kind: ParamKind::String,
                        required: true,
                        description: "Confirmed priority display name.",
                    },
                    ParamSpec {
                        name: "summary",
                        kind: ParamKind::String,
                        required: true,
                        description: "One-line ticket summary, at most 120 characters.",
                    },
                    ParamSpec {
                        name: "description",
                        kind: ParamKind::String,
                        required: true,
                        description: "Full problem description including reproduction steps.",
                    },
                    ParamSpec {
                        name: "brand",
                        kind: ParamKind::String,
                        required: true,
                        description: "Confirmed brand display name.",
                    },
                    ParamSpec {
                        name: "component",
                        kind: ParamKind::String,
                        required: true,
                        description: "Confirmed component display name.",
                    },
                    ParamSpec {
                        name: "environment",
                        kind: ParamKind::String,
                        required: true,
                        description: "Confirmed environment display name.",
                    },
                    ParamSpec {
                        name: "assignee_id",
                        kind: ParamKind::String,
                        required: false,
                        description:
                            "Account id from list_assignable_users. Omit to leave unassigned.",
                    },
                ],
            },
            Self::ListAssignableUsers => CapabilitySpec {
                name: self.name(),
                description:
                    "List users who can be assigned tickets in the project, with their account \
                     ids. Optionally filtered by a name fragment.",
                params: &[ParamSpec {
                    name: "query",
                    kind: ParamKind::String,
                    required: false,
                    description: "Name fragment to filter by.",
                }],
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    StringArray,
}

#[derive(Clone, Copy, Debug)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub description: &'static str,
}

#[derive(Clone, Copy, Debug)]
pub struct CapabilitySpec {
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [ParamSpec],
}

impl CapabilitySpec {
    pub fn to_tool_spec(&self) -> ToolSpec {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for param in self.params {
            let schema = match param.kind {
                ParamKind::String => json!({ "type": "string", "description": param.description }),
                ParamKind::Integer => {
                    json!({ "type": "integer", "description": param.description })
                }
                ParamKind::StringArray => json!({
                    "type": "array",
                    "items": { "type": "string" },
                    "description": param.description,
                }),
            };
            properties.insert(param.name.to_owned(), schema);
            if param.required {
                required.push(Value::String(param.name.to_owned()));
            }
        }

        ToolSpec {
            name: self.name.to_owned(),
            description: self.description.to_owned(),
            parameters: json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }
}

/// Per-invocation state handlers may consult. Carries the reconstructed
/// dialogue so guarded capabilities can inspect the conversation itself.
#[derive(Clone, Debug, Default)]
pub struct InvocationContext {
    pub dialogue: Vec<DialogueMessage>,
}

impl InvocationContext {
    pub fn new(dialogue: Vec<DialogueMessage>) -> Self {
        Self { dialogue }
    }
}

#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    async fn invoke(
        &self,
        ctx: &InvocationContext,
        arguments: Map<String, Value>,
    ) -> Result<Value, FailureDetail>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no handler registered for capability `{0}`")]
    MissingHandler(&'static str),
}

#[derive(Default)]
pub struct CapabilityRegistry {
    handlers: HashMap<CapabilityKind, Arc<dyn CapabilityHandler>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, kind: CapabilityKind, handler: H)
    where
        H: CapabilityHandler + 'static,
    {
        self.handlers.insert(kind, Arc::new(handler));
    }

    /// Startup check: every capability variant must have a handler, so
    /// unknown names are a config-time concern rather than a request-time
    /// surprise.
    pub fn validate_complete(&self) -> Result<(), RegistryError> {
        for kind in CapabilityKind::ALL {
            if !self.handlers.contains_key(&kind) {
                return Err(RegistryError::MissingHandler(kind.name()));
            }
        }
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Option<(CapabilityKind, Arc<dyn CapabilityHandler>)> {
        let kind = CapabilityKind::from_name(name)?;
        let handler = self.handlers.get(&kind)?;
        Some((kind, Arc::clone(handler)))
    }

    pub fn manifest(&self) -> Vec<ToolSpec> {
        let mut specs = Vec::with_capacity(self.handlers.len());
        for kind in CapabilityKind::ALL {
            if self.handlers.contains_key(&kind) {
                specs.push(kind.spec().to_tool_spec());
            }
        }
        specs
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Parse and validate a model-supplied argument payload against a
/// capability's schema. Violations become structured failures, never loop
/// errors.
pub fn validate_arguments(
    kind: CapabilityKind,
    raw: &str,
) -> Result<Map<String, Value>, FailureDetail> {
    let parsed: Value = serde_json::from_str(raw).map_err(|error| {
        FailureDetail::coded("malformed_arguments", format!("arguments are not valid JSON: {error}"))
    })?;
    let Value::Object(arguments) = parsed else {
        return Err(FailureDetail::coded(
            "malformed_arguments",
            "arguments must be a JSON object",
        ));
    };

    let spec = kind.spec();
    for param in spec.params {
        match arguments.get(param.name) {
            None | Some(Value::Null) => {
                if param.required {
                    return Err(FailureDetail::coded(
                        "invalid_arguments",
                        format!("required argument `{}` is missing", param.name),
                    ));
                }
            }
            Some(value) => check_param_type(param, value)?,
        }
    }

    Ok(arguments)
}

fn check_param_type(param: &ParamSpec, value: &Value) -> Result<(), FailureDetail> {
    let ok = match param.kind {
        ParamKind::String => value.is_string(),
        // Accept numeric strings: models routinely quote integers.
        ParamKind::Integer => {
            value.as_i64().is_some()
                || value.as_str().is_some_and(|raw| raw.parse::<i64>().is_ok())
        }
        ParamKind::StringArray => value
            .as_array()
            .is_some_and(|entries| entries.iter().all(Value::is_string)),
    };

    if ok {
        Ok(())
    } else {
        Err(FailureDetail::coded(
            "invalid_arguments",
            format!("argument `{}` has the wrong type", param.name),
        ))
    }
}

/// Coercing accessor for optional integer arguments.
pub fn integer_argument(arguments: &Map<String, Value>, name: &str) -> Option<i64> {
    match arguments.get(name) {
        Some(Value::Number(number)) => number.as_i64(),
        Some(Value::String(raw)) => raw.parse().ok(),
        _ => None,
    }
}

pub fn string_argument(arguments: &Map<String, Value>, name: &str) -> Option<String> {
    arguments.get(name).and_then(Value::as_str).map(str::to_owned)
}

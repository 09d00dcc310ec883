use tickety_core::dialogue::{DialogueMessage, Role};
use tickety_core::fields::FieldValueMap;
use tickety_core::ticket::TicketDraft;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    Deny { reason_code: &'static str, user_message: String },
}

/// Code-level gates in front of ticket creation.
///
/// Two invariants that would otherwise live only in prompt wording:
/// creation requires an explicit prior confirmation exchange in the thread,
/// and enumerated field values must resolve against the tracker's catalog
/// snapshot. Denials surface to the model as failed capability results.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailPolicy {
    pub require_confirmation: bool,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self { require_confirmation: true }
    }
}

impl GuardrailPolicy {
    pub fn evaluate_creation(
        &self,
        dialogue: &[DialogueMessage],
        draft: &TicketDraft,
        fields: &FieldValueMap,
    ) -> GuardrailDecision {
        if self.require_confirmation && !has_confirmation_exchange(dialogue) {
            return GuardrailDecision::Deny {
                reason_code: "confirmation_required",
                user_message:
                    "The draft has not been confirmed yet. Present the complete ticket to the \
                     user and wait for an explicit go-ahead before creating it."
                        .to_string(),
            };
        }

        let unresolved = unresolved_fields(draft, fields);
        if !unresolved.is_empty() {
            let listing = unresolved
                .iter()
                .map(|(field, value)| format!("{field}=`{value}`"))
                .collect::<Vec<_>>()
                .join(", ");
            return GuardrailDecision::Deny {
                reason_code: "unvalidated_field_values",
                user_message: format!(
                    "These values are not in the tracker's allowed set: {listing}. Use \
                     validate_ticket_fields and offer the user the allowed values instead."
                ),
            };
        }

        GuardrailDecision::Allow
    }
}

/// A confirmation exchange is an earlier assistant turn (the proposal)
/// followed by a final user turn that reads as an affirmation.
fn has_confirmation_exchange(dialogue: &[DialogueMessage]) -> bool {
    let Some(last_user_index) = dialogue.iter().rposition(|message| message.role == Role::User)
    else {
        return false;
    };

    let has_prior_assistant_turn =
        dialogue[..last_user_index].iter().any(|message| message.role == Role::Assistant);

    has_prior_assistant_turn && is_affirmation(&dialogue[last_user_index].content)
}

fn is_affirmation(text: &str) -> bool {
    let normalized: String = text
        .trim()
        .to_ascii_lowercase()
        .chars()
        .filter(|ch| !ch.is_ascii_punctuation())
        .collect();

    const AFFIRMATIONS: [&str; 12] = [
        "yes",
        "yep",
        "yeah",
        "confirm",
        "confirmed",
        "go ahead",
        "do it",
        "create it",
        "ship it",
        "looks good",
        "lgtm",
        "please create",
    ];

    AFFIRMATIONS.iter().any(|phrase| {
        normalized == *phrase
            || normalized.starts_with(&format!("{phrase} "))
            || normalized.ends_with(&format!(" {phrase}"))
    })
}

fn unresolved_fields<'a>(
    draft: &'a TicketDraft,
    fields: &FieldValueMap,
) -> Vec<(&'static str, &'a str)> {
    draft
        .enumerated_fields()
        .into_iter()
        .filter(|(field, value)| {
            let resolved = match *field {
                "issue_type" => fields.resolve_issue_type(value).is_some(),
                "priority" => fields.resolve_priority(value).is_some(),
                "brand" => {
                    // Trackers without a brand dimension publish no options.
                    fields.brands.is_empty() || fields.resolve_brand(value).is_some()
                }
                "component" => fields.resolve_component(value).is_some(),
                "environment" => fields.resolve_environment(value).is_some(),
                _ => false,
            };
            !resolved
        })
        .collect()
}

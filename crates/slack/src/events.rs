use serde::Deserialize;

/// Header the platform sets on redelivery attempts. A request carrying it
/// has already been accepted once and must not be processed again.
pub const RETRY_COUNT_HEADER: &str = "x-slack-retry-num";

/// Top-level webhook payload, discriminated by `type`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallbackEnvelope {
    /// Endpoint ownership probe; answered by echoing `challenge` with no
    /// other processing.
    UrlVerification { challenge: String },
    EventCallback { event: InboundEvent },
    #[serde(other)]
    Unsupported,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    AppMention {
        channel: String,
        user: String,
        text: String,
        ts: String,
        #[serde(default)]
        thread_ts: Option<String>,
    },
    Message {
        channel: String,
        #[serde(default)]
        user: Option<String>,
        #[serde(default)]
        text: Option<String>,
        ts: String,
        #[serde(default)]
        thread_ts: Option<String>,
        #[serde(default)]
        bot_id: Option<String>,
    },
    #[serde(other)]
    Unsupported,
}

/// Where a reply belongs: the channel plus the thread anchor. Replies mirror
/// inbound threading - a fresh conversation gets a reply threaded under its
/// own message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conversation {
    pub channel: String,
    pub thread_ts: String,
}

impl InboundEvent {
    /// The conversation this event belongs to, if it is one the assistant
    /// should react to. Bot-authored messages and unsupported event types
    /// yield `None`.
    pub fn conversation(&self, bot_user_id: &str) -> Option<Conversation> {
        match self {
            Self::AppMention { channel, user, ts, thread_ts, .. } => {
                if user == bot_user_id {
                    return None;
                }
                Some(Conversation {
                    channel: channel.clone(),
                    thread_ts: thread_ts.clone().unwrap_or_else(|| ts.clone()),
                })
            }
            Self::Message { channel, user, thread_ts, bot_id, .. } => {
                if bot_id.is_some() {
                    return None;
                }
                let user = user.as_deref()?;
                if user == bot_user_id {
                    return None;
                }
                // Plain channel messages only matter inside threads the bot
                // is already part of; top-level chatter is mention-gated.
                let thread_ts = thread_ts.clone()?;
                Some(Conversation { channel: channel.clone(), thread_ts })
            }
            Self::Unsupported => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CallbackEnvelope, Conversation, InboundEvent};

    #[test]
    fn url_verification_parses_challenge() {
        let payload = r#"{"type":"url_verification","challenge":"c-123","token":"ignored"}"#;
        let envelope: CallbackEnvelope = serde_json::from_str(payload).expect("parse");
        assert_eq!(envelope, CallbackEnvelope::UrlVerification { challenge: "c-123".to_owned() });
    }

    #[test]
    fn app_mention_event_parses_and_targets_its_own_thread() {
        let payload = r#"{
            "type": "event_callback",
            "event": {
                "type": "app_mention",
                "channel": "C1",
                "user": "U1",
                "text": "<@U0BOT> checkout is broken",
                "ts": "1730000000.1000"
            }
        }"#;

        let envelope: CallbackEnvelope = serde_json::from_str(payload).expect("parse");
        let CallbackEnvelope::EventCallback { event } = envelope else {
            panic!("expected event callback");
        };

        let conversation = event.conversation("U0BOT").expect("conversation");
        assert_eq!(
            conversation,
            Conversation { channel: "C1".to_owned(), thread_ts: "1730000000.1000".to_owned() }
        );
    }

    #[test]
    fn threaded_message_without_mention_is_processed() {
        let event = InboundEvent::Message {
            channel: "C1".to_owned(),
            user: Some("U1".to_owned()),
            text: Some("production".to_owned()),
            ts: "1730000000.3000".to_owned(),
            thread_ts: Some("1730000000.1000".to_owned()),
            bot_id: None,
        };

        let conversation = event.conversation("U0BOT").expect("conversation");
        assert_eq!(conversation.thread_ts, "1730000000.1000");
    }

    #[test]
    fn bot_authored_messages_are_ignored() {
        let own_message = InboundEvent::Message {
            channel: "C1".to_owned(),
            user: Some("U0BOT".to_owned()),
            text: Some("Which environment?".to_owned()),
            ts: "1730000000.2000".to_owned(),
            thread_ts: Some("1730000000.1000".to_owned()),
            bot_id: None,
        };
        assert!(own_message.conversation("U0BOT").is_none());

        let other_bot = InboundEvent::Message {
            channel: "C1".to_owned(),
            user: None,
            text: Some("deploy finished".to_owned()),
            ts: "1730000000.4000".to_owned(),
            thread_ts: Some("1730000000.1000".to_owned()),
            bot_id: Some("B9".to_owned()),
        };
        assert!(other_bot.conversation("U0BOT").is_none());
    }

    #[test]
    fn top_level_unmentioned_chatter_is_ignored() {
        let event = InboundEvent::Message {
            channel: "C1".to_owned(),
            user: Some("U1".to_owned()),
            text: Some("lunch?".to_owned()),
            ts: "1730000000.5000".to_owned(),
            thread_ts: None,
            bot_id: None,
        };
        assert!(event.conversation("U0BOT").is_none());
    }

    #[test]
    fn unknown_event_types_parse_as_unsupported() {
        let payload = r#"{
            "type": "event_callback",
            "event": { "type": "reaction_added", "user": "U1" }
        }"#;
        let envelope: CallbackEnvelope = serde_json::from_str(payload).expect("parse");
        assert_eq!(
            envelope,
            CallbackEnvelope::EventCallback { event: InboundEvent::Unsupported }
        );
    }
}

use thiserror::Error;

use tickety_core::dialogue::DialogueMessage;
use tickety_core::thread::SourceThread;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TranscriptError {
    #[error("thread contained no messages")]
    EmptyThread,
}

/// Rebuilds the role-tagged dialogue from a platform thread.
///
/// Role inference: messages authored by the bot account become assistant
/// turns; everything else is a user turn with any leading bot mention
/// stripped. The platform history is the only conversational state, so this
/// runs fresh on every invocation.
pub struct Transcriber {
    bot_user_id: String,
}

impl Transcriber {
    pub fn new(bot_user_id: impl Into<String>) -> Self {
        Self { bot_user_id: bot_user_id.into() }
    }

    pub fn transcribe(&self, thread: &SourceThread) -> Result<Vec<DialogueMessage>, TranscriptError> {
        if thread.is_empty() {
            return Err(TranscriptError::EmptyThread);
        }

        let dialogue = thread
            .messages
            .iter()
            .map(|message| {
                if message.author_id == self.bot_user_id {
                    DialogueMessage::assistant(message.text.clone())
                } else {
                    DialogueMessage::user(strip_leading_mention(&message.text, &self.bot_user_id))
                }
            })
            .collect();

        Ok(dialogue)
    }
}

/// Drop a leading `<@BOTID>` token (the app-mention prefix) from user text.
fn strip_leading_mention(text: &str, bot_user_id: &str) -> String {
    let trimmed = text.trim_start();
    let mention = format!("<@{bot_user_id}>");
    match trimmed.strip_prefix(&mention) {
        Some(rest) => rest.trim_start().to_owned(),
        None => trimmed.trim_end().to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use tickety_core::dialogue::Role;
    use tickety_core::thread::{SourceMessage, SourceThread};

    use super::{strip_leading_mention, Transcriber, TranscriptError};

    fn message(author_id: &str, text: &str, ts: &str) -> SourceMessage {
        SourceMessage { author_id: author_id.to_owned(), text: text.to_owned(), ts: ts.to_owned() }
    }

    #[test]
    fn empty_thread_is_fatal() {
        let transcriber = Transcriber::new("U0BOT");
        let thread = SourceThread { lead_ts: "1.0".to_owned(), messages: Vec::new() };
        assert_eq!(transcriber.transcribe(&thread), Err(TranscriptError::EmptyThread));
    }

    #[test]
    fn roles_follow_authorship_and_mentions_are_stripped() {
        let transcriber = Transcriber::new("U0BOT");
        let thread = SourceThread {
            lead_ts: "1.0".to_owned(),
            messages: vec![
                message("U1USER", "<@U0BOT> the checkout button is dead", "1.0"),
                message("U0BOT", "Which environment is affected?", "1.1"),
                message("U1USER", "production", "1.2"),
            ],
        };

        let dialogue = transcriber.transcribe(&thread).expect("transcribe");
        assert_eq!(dialogue.len(), 3);
        assert_eq!(dialogue[0].role, Role::User);
        assert_eq!(dialogue[0].content, "the checkout button is dead");
        assert_eq!(dialogue[1].role, Role::Assistant);
        assert_eq!(dialogue[2].content, "production");
    }

    #[test]
    fn mention_mid_message_is_left_alone() {
        let stripped = strip_leading_mention("ask <@U0BOT> about it", "U0BOT");
        assert_eq!(stripped, "ask <@U0BOT> about it");
    }
}

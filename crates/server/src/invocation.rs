use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use tickety_agent::conversation::{Transcriber, TranscriptError};
use tickety_agent::runtime::AgentLoop;
use tickety_core::errors::{ApplicationError, DomainError};
use tickety_slack::client::SlackClient;
use tickety_slack::events::Conversation;

/// Sink the webhook hands accepted events to. Split from the concrete
/// service so the webhook can be tested without the full agent stack.
#[async_trait]
pub trait InvocationSink: Send + Sync {
    async fn handle(&self, conversation: Conversation, correlation_id: String);
}

/// One end-to-end invocation: fetch the thread, reconstruct the dialogue,
/// run the agent loop, post the reply. Any uncaught failure is reported as
/// plain text into the originating thread rather than left silent.
pub struct InvocationService {
    slack: Arc<dyn SlackClient>,
    transcriber: Transcriber,
    agent: Arc<AgentLoop>,
}

impl InvocationService {
    pub fn new(slack: Arc<dyn SlackClient>, transcriber: Transcriber, agent: Arc<AgentLoop>) -> Self {
        Self { slack, transcriber, agent }
    }

    async fn try_handle(
        &self,
        conversation: &Conversation,
    ) -> Result<(), ApplicationError> {
        let thread = self
            .slack
            .fetch_thread(&conversation.channel, &conversation.thread_ts)
            .await
            .map_err(|error| ApplicationError::ChatSurface(error.to_string()))?;

        let dialogue = self.transcriber.transcribe(&thread).map_err(|error| match error {
            TranscriptError::EmptyThread => ApplicationError::Domain(DomainError::EmptyThread),
        })?;

        let reply = self
            .agent
            .run(dialogue)
            .await
            .map_err(|error| ApplicationError::LanguageModel(error.to_string()))?;

        self.slack
            .post_message(&conversation.channel, Some(&conversation.thread_ts), &reply.text)
            .await
            .map_err(|error| ApplicationError::ChatSurface(error.to_string()))?;

        info!(
            event_name = "invocation.completed",
            thread_id = %conversation.thread_ts,
            used_capabilities = reply.used_capabilities,
            "invocation completed"
        );
        Ok(())
    }
}

#[async_trait]
impl InvocationSink for InvocationService {
    async fn handle(&self, conversation: Conversation, correlation_id: String) {
        if let Err(error) = self.try_handle(&conversation).await {
            warn!(
                event_name = "invocation.failed",
                correlation_id = %correlation_id,
                thread_id = %conversation.thread_ts,
                error = %error,
                "invocation failed; reporting to thread"
            );

            let user_message = error.into_interface(correlation_id.clone()).user_message();
            if let Err(post_error) = self
                .slack
                .post_message(&conversation.channel, Some(&conversation.thread_ts), user_message)
                .await
            {
                warn!(
                    event_name = "invocation.error_report_failed",
                    correlation_id = %correlation_id,
                    error = %post_error,
                    "could not post error report to thread"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use tickety_agent::conversation::Transcriber;
    use tickety_agent::llm::{ChatOutcome, ChatRequest, LlmClient, LlmError};
    use tickety_agent::registry::CapabilityRegistry;
    use tickety_agent::runtime::AgentLoop;
    use tickety_core::thread::{SourceMessage, SourceThread};
    use tickety_slack::client::{SlackApiError, SlackClient};
    use tickety_slack::events::Conversation;

    use super::{InvocationService, InvocationSink};

    struct ScriptedSlack {
        thread: Option<SourceThread>,
        posted: Mutex<Vec<(String, Option<String>, String)>>,
    }

    impl ScriptedSlack {
        fn with_thread(thread: SourceThread) -> Self {
            Self { thread: Some(thread), posted: Mutex::new(Vec::new()) }
        }

        fn failing() -> Self {
            Self { thread: None, posted: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl SlackClient for ScriptedSlack {
        async fn fetch_thread(
            &self,
            _channel: &str,
            _thread_ts: &str,
        ) -> Result<SourceThread, SlackApiError> {
            self.thread.clone().ok_or_else(|| SlackApiError::Api("channel_not_found".to_owned()))
        }

        async fn post_message(
            &self,
            channel: &str,
            thread_ts: Option<&str>,
            text: &str,
        ) -> Result<(), SlackApiError> {
            self.posted.lock().await.push((
                channel.to_owned(),
                thread_ts.map(str::to_owned),
                text.to_owned(),
            ));
            Ok(())
        }
    }

    struct CannedLlm;

    #[async_trait]
    impl LlmClient for CannedLlm {
        async fn chat(&self, _request: &ChatRequest) -> Result<ChatOutcome, LlmError> {
            Ok(ChatOutcome {
                content: "Found nothing similar; want me to file a ticket?".to_owned(),
                capability_calls: Vec::new(),
            })
        }
    }

    fn agent() -> Arc<AgentLoop> {
        Arc::new(AgentLoop::new(
            Arc::new(CannedLlm),
            Arc::new(CapabilityRegistry::new()),
            "policy".to_owned(),
            Duration::from_secs(5),
        ))
    }

    fn conversation() -> Conversation {
        Conversation { channel: "C1".to_owned(), thread_ts: "1.0".to_owned() }
    }

    #[tokio::test]
    async fn happy_path_posts_threaded_reply() {
        let slack = Arc::new(ScriptedSlack::with_thread(SourceThread {
            lead_ts: "1.0".to_owned(),
            messages: vec![SourceMessage {
                author_id: "U1".to_owned(),
                text: "<@U0BOT> any dupes of the checkout bug?".to_owned(),
                ts: "1.0".to_owned(),
            }],
        }));
        let service = InvocationService::new(slack.clone(), Transcriber::new("U0BOT"), agent());

        service.handle(conversation(), "corr-1".to_owned()).await;

        let posted = slack.posted.lock().await;
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].0, "C1");
        assert_eq!(posted[0].1.as_deref(), Some("1.0"));
        assert!(posted[0].2.contains("Found nothing similar"));
    }

    #[tokio::test]
    async fn failures_are_reported_to_the_thread_not_swallowed() {
        let slack = Arc::new(ScriptedSlack::failing());
        let service = InvocationService::new(slack.clone(), Transcriber::new("U0BOT"), agent());

        service.handle(conversation(), "corr-2".to_owned()).await;

        let posted = slack.posted.lock().await;
        assert_eq!(posted.len(), 1, "error report must land in the thread");
        assert!(posted[0].2.contains("temporarily unavailable"));
    }

    #[tokio::test]
    async fn empty_thread_reports_bad_request_wording() {
        let slack = Arc::new(ScriptedSlack::with_thread(SourceThread {
            lead_ts: "1.0".to_owned(),
            messages: Vec::new(),
        }));
        let service = InvocationService::new(slack.clone(), Transcriber::new("U0BOT"), agent());

        service.handle(conversation(), "corr-3".to_owned()).await;

        let posted = slack.posted.lock().await;
        assert!(posted[0].2.contains("couldn't process"));
    }
}

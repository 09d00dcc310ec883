use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, info, warn};

use tickety_core::capability::{CapabilityCall, CapabilityResult, FailureDetail};
use tickety_core::dialogue::DialogueMessage;

use crate::llm::{ChatRequest, LlmClient, LlmError};
use crate::registry::{validate_arguments, CapabilityRegistry, InvocationContext};

#[derive(Debug, Error)]
pub enum AgentLoopError {
    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// Final answer for one user turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentReply {
    pub text: String,
    pub used_capabilities: bool,
}

/// The tool-orchestration state machine.
///
/// `DISPATCH_INITIAL → {TERMINAL_DIRECT | FAN_OUT_TOOLS} → FAN_IN_RESULTS →
/// DISPATCH_FOLLOWUP → TERMINAL_FINAL`. Exactly zero or one capability round
/// runs per user turn: the followup call has capability use disabled, so the
/// model cannot chain further rounds. Multi-step plans must be expressed as
/// one batch of calls in the initial round.
pub struct AgentLoop {
    llm: Arc<dyn LlmClient>,
    registry: Arc<CapabilityRegistry>,
    policy: String,
    capability_timeout: Duration,
}

impl AgentLoop {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        registry: Arc<CapabilityRegistry>,
        policy: String,
        capability_timeout: Duration,
    ) -> Self {
        Self { llm, registry, policy, capability_timeout }
    }

    pub async fn run(&self, dialogue: Vec<DialogueMessage>) -> Result<AgentReply, AgentLoopError> {
        let mut messages = Vec::with_capacity(dialogue.len() + 1);
        messages.push(DialogueMessage::system(self.policy.clone()));
        messages.extend(dialogue);

        let initial = self
            .llm
            .chat(&ChatRequest {
                messages: messages.clone(),
                tools: self.registry.manifest(),
                allow_tools: true,
            })
            .await?;

        if initial.capability_calls.is_empty() {
            debug!(event_name = "agent.loop.direct_answer", "no capabilities requested");
            return Ok(AgentReply { text: initial.content, used_capabilities: false });
        }

        let calls = initial.capability_calls;
        info!(
            event_name = "agent.loop.fan_out",
            requested = calls.len(),
            "dispatching capability calls"
        );

        let context = InvocationContext::new(messages.clone());
        let results = self.dispatch_all(&context, &calls).await;
        debug_assert_eq!(results.len(), calls.len());

        let failures = results.iter().filter(|result| result.is_failure()).count();
        if failures > 0 {
            warn!(
                event_name = "agent.loop.partial_failure",
                failed = failures,
                total = results.len(),
                "some capability calls failed"
            );
        }

        messages.push(DialogueMessage::assistant_with_calls(calls));
        for result in &results {
            messages.push(DialogueMessage::tool(result.call_id(), result.to_tool_content()));
        }

        let followup = self
            .llm
            .chat(&ChatRequest { messages, tools: Vec::new(), allow_tools: false })
            .await?;

        Ok(AgentReply { text: followup.content, used_capabilities: true })
    }

    /// Join barrier over the whole batch: fire all, await all, one result
    /// per call in issue order. A failing call neither cancels nor delays
    /// its siblings.
    async fn dispatch_all(
        &self,
        context: &InvocationContext,
        calls: &[CapabilityCall],
    ) -> Vec<CapabilityResult> {
        let futures = calls.iter().map(|call| self.dispatch_one(context, call));
        join_all(futures).await
    }

    async fn dispatch_one(
        &self,
        context: &InvocationContext,
        call: &CapabilityCall,
    ) -> CapabilityResult {
        let Some((kind, handler)) = self.registry.resolve(&call.name) else {
            return CapabilityResult::failure(
                &call.id,
                FailureDetail::coded(
                    "unknown_capability",
                    format!("`{}` is not a registered capability", call.name),
                ),
            );
        };

        let arguments = match validate_arguments(kind, &call.arguments) {
            Ok(arguments) => arguments,
            Err(detail) => return CapabilityResult::failure(&call.id, detail),
        };

        match tokio::time::timeout(self.capability_timeout, handler.invoke(context, arguments))
            .await
        {
            Err(_) => CapabilityResult::failure(
                &call.id,
                FailureDetail::coded(
                    "capability_timeout",
                    format!(
                        "`{}` did not finish within {}s",
                        call.name,
                        self.capability_timeout.as_secs()
                    ),
                ),
            ),
            Ok(Err(detail)) => CapabilityResult::failure(&call.id, detail),
            Ok(Ok(payload)) => CapabilityResult::success(&call.id, payload),
        }
    }
}

use crate::dispatch::{execute_call, ToolEndpoint};
use crate::provider::{ChatEndpoint, ChatReply, ChatRequest};
use crate::registry::ToolSpec;
use crate::tool_schema::{build_tool_schema, schemas_to_openai_tools};
use crate::transcript::Transcript;
use crate::types::{AgentEvent, Message};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Request rounds allowed for a single user message.
pub const MAX_ROUNDS: usize = 12;

/// Reply reported when the round limit is hit.
pub const MAX_ROUNDS_REPLY: &str = "(max rounds reached)";

/// How a run of the loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopOutcome {
    /// The model answered without requesting further tools.
    Completed(String),
    /// The round limit was reached while the model kept requesting tools.
    MaxRounds,
    /// The chat endpoint was unreachable or failed. No reply.
    Failed(String),
}

impl LoopOutcome {
    pub fn reply(&self) -> Option<&str> {
        match self {
            LoopOutcome::Completed(text) => Some(text),
            LoopOutcome::MaxRounds => Some(MAX_ROUNDS_REPLY),
            LoopOutcome::Failed(_) => None,
        }
    }
}

/// Drives request rounds against the chat endpoint, dispatching requested
/// tool calls until the model produces a final answer.
pub struct AgentLoop {
    chat: Arc<dyn ChatEndpoint>,
    tools: Arc<dyn ToolEndpoint>,
    transcript: Option<Transcript>,
    tools_enabled: bool,
}

impl AgentLoop {
    pub fn new(chat: Arc<dyn ChatEndpoint>, tools: Arc<dyn ToolEndpoint>) -> Self {
        Self {
            chat,
            tools,
            transcript: None,
            tools_enabled: true,
        }
    }

    pub fn with_transcript(mut self, transcript: Transcript) -> Self {
        self.transcript = Some(transcript);
        self
    }

    /// With tools disabled no schema is offered and replies are streamed.
    pub fn with_tools_enabled(mut self, enabled: bool) -> Self {
        self.tools_enabled = enabled;
        self
    }

    /// Run the loop for one user message.
    ///
    /// `conversation` holds prior history (system turn first) and is extended
    /// in place with the user turn, every assistant turn and every tool-result
    /// turn. Progress is reported on `event_tx`.
    pub async fn run(
        &self,
        model: &str,
        conversation: &mut Vec<Message>,
        user_text: &str,
        registered: &BTreeMap<String, ToolSpec>,
        event_tx: mpsc::UnboundedSender<AgentEvent>,
    ) -> LoopOutcome {
        conversation.push(Message::user(user_text));

        let schema: Option<Vec<Value>> = self
            .tools_enabled
            .then(|| schemas_to_openai_tools(&build_tool_schema(registered)));

        for round in 1..=MAX_ROUNDS {
            debug!("Agent loop round {}", round);
            let _ = event_tx.send(AgentEvent::RoundStarted {
                round,
                model: model.to_string(),
            });

            let result = {
                let request = ChatRequest {
                    model,
                    messages: conversation.as_slice(),
                    tools: schema.as_deref(),
                    stream: schema.is_none(),
                };
                if request.stream {
                    self.chat
                        .stream(&request, &mut |chunk: &str| {
                            let _ = event_tx.send(AgentEvent::ContentChunk(chunk.to_string()));
                        })
                        .await
                        .map(|text| ChatReply {
                            message: Message::assistant(text),
                            finish_reason: Some("stop".into()),
                        })
                } else {
                    self.chat.complete(&request).await
                }
            };

            let reply = match result {
                Ok(reply) => reply,
                Err(e) => {
                    warn!("Round {} failed: {}", round, e);
                    let message = e.to_string();
                    let _ = event_tx.send(AgentEvent::Error(message.clone()));
                    return LoopOutcome::Failed(message);
                }
            };
            let _ = event_tx.send(AgentEvent::ResponseReceived { round });

            let calls = reply.message.requested_calls().to_vec();
            if calls.is_empty() || reply.is_stop() {
                let text = reply.message.content.trim().to_string();
                conversation.push(Message::assistant(reply.message.content));
                self.log_exchange(user_text, &text);
                let _ = event_tx.send(AgentEvent::Done(Some(text.clone())));
                return LoopOutcome::Completed(text);
            }

            debug!("Round {} requested {} tool call(s)", round, calls.len());
            conversation.push(reply.message);

            for call in &calls {
                let _ = event_tx.send(AgentEvent::ToolCallStart {
                    id: call.correlation_id().to_string(),
                    name: call.name().to_string(),
                    arguments: Value::Object(call.decoded_arguments()),
                });
                let output = execute_call(self.tools.as_ref(), call, registered).await;
                conversation.push(Message::tool_result(
                    output.tool_call_id.clone(),
                    output.name.clone(),
                    output.content.clone(),
                ));
                let _ = event_tx.send(AgentEvent::ToolResult(output));
            }
        }

        warn!("Hit max rounds ({}) without a final answer", MAX_ROUNDS);
        let _ = event_tx.send(AgentEvent::Done(Some(MAX_ROUNDS_REPLY.to_string())));
        LoopOutcome::MaxRounds
    }

    fn log_exchange(&self, user_text: &str, reply: &str) {
        if let Some(transcript) = &self.transcript {
            if let Err(e) = transcript.append(user_text, reply) {
                warn!("Failed to append to transcript {:?}: {}", transcript.path(), e);
            }
        }
    }
}

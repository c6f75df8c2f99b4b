//! Orchestrator: runs one Response from bound prompt to terminal status
//! (§4.1). Ties StoreGateway, ProviderClient, ToolRegistry, and
//! ContextBudgeter into the bounded tool-call loop.

use std::sync::Arc;
use std::time::Duration;

use ro_domain::config::Config;
use ro_domain::error::{Error, ErrorKind, Result};
use ro_domain::model::{Content, Conversation, ItemRole, ItemType, Response, ResponseError, ResponseStatus};
use ro_providers::{ChatMessage, ChatRequest, LlmProvider};
use ro_store::StoreGateway;
use serde_json::Value;
use tracing::Instrument;

use crate::conversation::{items_to_messages, new_item, ConversationService};
use crate::runtime::cancel::CancelToken;
use crate::runtime::tools::ToolRegistry;

/// Emitted as the tool loop progresses, for the Streamer to forward as
/// SSE frames (§4.4). Non-streaming callers simply drop the sender.
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    OutputTextDelta { response_id: String, text: String },
    ToolCallCreated { response_id: String, call_id: String, name: String },
    Completed { response_id: String },
    Failed { response_id: String, message: String },
}

pub type EventSender = tokio::sync::mpsc::UnboundedSender<OrchestratorEvent>;

pub struct Orchestrator {
    store: Arc<dyn StoreGateway>,
    provider: Arc<dyn LlmProvider>,
    tools: Arc<dyn ToolRegistry>,
    config: Arc<Config>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn StoreGateway>,
        provider: Arc<dyn LlmProvider>,
        tools: Arc<dyn ToolRegistry>,
        config: Arc<Config>,
    ) -> Self {
        Self { store, provider, tools, config }
    }

    /// Run `response` to a terminal status and return the updated
    /// record. Returns `Err` only for failures that indicate the
    /// worker itself is broken (store I/O); everything classified as an
    /// orchestration failure is recorded on the Response and returned
    /// as `Ok`.
    pub async fn run(
        &self,
        mut response: Response,
        conversation: Option<Conversation>,
        cancel: CancelToken,
        events: Option<EventSender>,
    ) -> Result<Response> {
        let span = tracing::info_span!("orchestrator.run", response_id = %response.id, "otel.kind" = "SERVER");
        self.run_inner(&mut response, conversation, cancel, events)
            .instrument(span)
            .await?;
        Ok(response)
    }

    async fn run_inner(
        &self,
        response: &mut Response,
        conversation: Option<Conversation>,
        cancel: CancelToken,
        events: Option<EventSender>,
    ) -> Result<()> {
        // §4.1 idempotence: a crash during a prior attempt at this
        // response id may have left partial assistant/tool items behind.
        self.store.mark_items_incomplete(&response.id)?;

        let conv_service = ConversationService::new(self.store.clone());
        let mut messages = self.build_initial_messages(response, conversation.as_ref(), &conv_service)?;

        let target_context_length = self.config.context.default_context_length as usize;
        let max_depth = self.config.provider.max_tool_depth;
        let tool_timeout = Duration::from_secs(self.config.provider.tool_timeout_secs);
        let provider_timeout = Duration::from_secs(self.config.provider.default_timeout_secs);

        let mut depth: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                self.store.transition_response(
                    &response.id,
                    &[ResponseStatus::InProgress, ResponseStatus::Queued],
                    ResponseStatus::Cancelled,
                )?;
                response.transition(ResponseStatus::Cancelled);
                return Ok(());
            }

            let trimmed = ro_context::budget(messages.clone(), &[], target_context_length, &self.config.context);
            messages = trimmed.messages;

            let request = ChatRequest {
                messages: messages.clone(),
                tools: response.params.tools.clone(),
                tool_choice: response.params.tool_choice.clone(),
                temperature: response.params.temperature,
                top_p: response.params.top_p,
                max_output_tokens: response.params.max_output_tokens,
                stop: response.params.stop.clone(),
                model: response.model.clone(),
            };

            let chat_span = tracing::info_span!("provider.call", "otel.kind" = "CLIENT", depth);
            let chat_result = self.call_provider_with_retry(request, provider_timeout).instrument(chat_span).await;

            let chat = match chat_result {
                Ok(c) => c,
                Err(e) => {
                    self.fail(response, &e)?;
                    if let Some(tx) = &events {
                        let _ = tx.send(OrchestratorEvent::Failed { response_id: response.id.clone(), message: e.message.clone() });
                    }
                    return Ok(());
                }
            };

            if chat.finish_reason != "tool_calls" {
                if let Some(tx) = &events {
                    for c in &chat.content {
                        if let Content::Text { text } | Content::OutputText { text } = c {
                            let _ = tx.send(OrchestratorEvent::OutputTextDelta {
                                response_id: response.id.clone(),
                                text: text.clone(),
                            });
                        }
                    }
                }
                if let (Some(conv), true) = (&conversation, response.params.store) {
                    let item = new_item(
                        &conv.id,
                        &conv.active_branch,
                        ItemType::Message,
                        Some(ItemRole::Assistant),
                        if chat.content.is_empty() { vec![Content::text("")] } else { chat.content.clone() },
                        Some(&response.id),
                    )?;
                    conv_service.append_items(&conv.id, &conv.active_branch, vec![item])?;
                }
                response.output = chat.content;
                response.usage = chat.usage;
                self.store.transition_response(
                    &response.id,
                    &[ResponseStatus::InProgress, ResponseStatus::Queued],
                    ResponseStatus::Completed,
                )?;
                response.transition(ResponseStatus::Completed);
                self.store.save_response(response.clone())?;
                if let Some(tx) = &events {
                    let _ = tx.send(OrchestratorEvent::Completed { response_id: response.id.clone() });
                }
                return Ok(());
            }

            depth += 1;
            if depth > max_depth {
                let err = Error::new(ErrorKind::Internal, "tool-loop depth exceeded");
                response.error = Some(ResponseError {
                    kind: "internal".into(),
                    message: "tool-depth-exceeded".into(),
                    code: err.code.to_string(),
                });
                self.store.transition_response(
                    &response.id,
                    &[ResponseStatus::InProgress, ResponseStatus::Queued],
                    ResponseStatus::Failed,
                )?;
                response.transition(ResponseStatus::Failed);
                self.store.save_response(response.clone())?;
                if let Some(tx) = &events {
                    let _ = tx.send(OrchestratorEvent::Failed { response_id: response.id.clone(), message: "tool-depth-exceeded".into() });
                }
                return Ok(());
            }

            let mut assistant_content = Vec::new();
            for call in &chat.tool_calls {
                assistant_content.push(Content::FunctionCall {
                    call_id: call.call_id.clone(),
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                });
                if let Some(tx) = &events {
                    let _ = tx.send(OrchestratorEvent::ToolCallCreated {
                        response_id: response.id.clone(),
                        call_id: call.call_id.clone(),
                        name: call.name.clone(),
                    });
                }
            }
            messages.push(ChatMessage::new(Some(ItemRole::Assistant), assistant_content.clone()));
            if let (Some(conv), true) = (&conversation, response.params.store) {
                let item = new_item(
                    &conv.id,
                    &conv.active_branch,
                    ItemType::ToolCall,
                    Some(ItemRole::Assistant),
                    assistant_content,
                    Some(&response.id),
                )?;
                conv_service.append_items(&conv.id, &conv.active_branch, vec![item])?;
            }

            for call in &chat.tool_calls {
                let result = self.tools.call(&call.name, call.arguments.clone(), tool_timeout).await?;
                let tool_content = vec![Content::FunctionCallOutput {
                    call_id: call.call_id.clone(),
                    output: result.output.clone(),
                    error: result.error.clone(),
                }];
                messages.push(ChatMessage::new(Some(ItemRole::Tool), tool_content.clone()));
                if let (Some(conv), true) = (&conversation, response.params.store) {
                    let item = new_item(
                        &conv.id,
                        &conv.active_branch,
                        ItemType::ToolResult,
                        None,
                        tool_content,
                        Some(&response.id),
                    )?;
                    conv_service.append_items(&conv.id, &conv.active_branch, vec![item])?;
                }
            }
        }
    }

    async fn call_provider_with_retry(
        &self,
        request: ChatRequest,
        timeout: Duration,
    ) -> Result<ro_providers::ChatResponse> {
        let max_retries = self.config.provider.max_provider_retries;
        let mut last_err = None;
        for attempt in 0..=max_retries {
            match tokio::time::timeout(timeout, self.provider.chat(request.clone())).await {
                Ok(Ok(resp)) => return Ok(resp),
                Ok(Err(e)) => last_err = Some(e),
                Err(_) => last_err = Some(Error::external("provider call timed out")),
            }
            if attempt < max_retries {
                tracing::warn!(attempt, "provider call failed, retrying");
            }
        }
        Err(last_err.unwrap_or_else(|| Error::external("provider call failed with no error detail")))
    }

    fn fail(&self, response: &mut Response, err: &Error) -> Result<()> {
        response.error = Some(ResponseError {
            kind: err.kind.as_str().into(),
            message: err.message.clone(),
            code: err.code.to_string(),
        });
        self.store.transition_response(
            &response.id,
            &[ResponseStatus::InProgress, ResponseStatus::Queued],
            ResponseStatus::Failed,
        )?;
        response.transition(ResponseStatus::Failed);
        self.store.save_response(response.clone())
    }

    /// §4.1 steps 1-2: load conversation history (if attached), prepend
    /// the instruction snapshot, splice in `previous_response_id`
    /// history without deduplication (§9 ambiguity (c), preserved
    /// as-is), then append the new user input.
    fn build_initial_messages(
        &self,
        response: &Response,
        conversation: Option<&Conversation>,
        conv_service: &ConversationService,
    ) -> Result<Vec<ChatMessage>> {
        let mut messages = Vec::new();

        if let Some(conv) = conversation {
            if !conv.effective_instructions.is_empty() {
                messages.push(ChatMessage::new(Some(ItemRole::System), vec![Content::text(&conv.effective_instructions)]));
            }
            let items = conv_service.load_active_branch(conv)?;
            messages.extend(items_to_messages(&items));
        }

        if let Some(prev_id) = &response.previous_response_id {
            let prev = self.store.get_response(prev_id)?;
            if !prev.output.is_empty() {
                messages.push(ChatMessage::new(Some(ItemRole::Assistant), prev.output));
            }
        }

        messages.push(ChatMessage::new(Some(ItemRole::User), input_to_content(&response.input)));
        Ok(messages)
    }
}

/// The create-response `input` field is opaque JSON (§3). A bare string
/// becomes one text block; an array of already-shaped content blocks is
/// passed through; anything else is serialised verbatim as text.
fn input_to_content(input: &Value) -> Vec<Content> {
    match input {
        Value::String(s) => vec![Content::text(s.clone())],
        Value::Array(_) => serde_json::from_value(input.clone()).unwrap_or_else(|_| vec![Content::text(input.to_string())]),
        Value::Null => vec![Content::text("")],
        other => vec![Content::text(other.to_string())],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_input_becomes_a_single_text_block() {
        let blocks = input_to_content(&Value::String("hi".into()));
        assert_eq!(blocks, vec![Content::text("hi")]);
    }

    #[test]
    fn array_input_of_content_blocks_round_trips() {
        let input = serde_json::json!([{"type": "text", "text": "hi"}]);
        let blocks = input_to_content(&input);
        assert_eq!(blocks, vec![Content::text("hi")]);
    }

}

//! Provider-agnostic chat completion contract.
//!
//! Normalises whatever shape the upstream LLM endpoint speaks into the
//! domain's `Content`/`Usage` types, keeping vendor JSON from leaking
//! past the adapter boundary.

use futures_core::stream::BoxStream;
use ro_domain::error::Result;
use ro_domain::model::{Content, ItemRole, ToolDefinition, Usage};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// `None` for tool-result messages, which OpenAI-shaped wire formats
    /// key by `tool_call_id` instead of role.
    pub role: Option<ItemRole>,
    pub content: Vec<Content>,
}

impl ChatMessage {
    pub fn new(role: Option<ItemRole>, content: Vec<Content>) -> Self {
        Self { role, content }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub stop: Vec<String>,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub call_id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: Vec<Content>,
    pub tool_calls: Vec<ToolCallRequest>,
    pub usage: Option<Usage>,
    pub finish_reason: String,
}

#[derive(Debug, Clone)]
pub enum StreamEvent {
    Token { text: String },
    ToolCallStarted { call_id: String, name: String },
    ToolCallDelta { call_id: String, delta: String },
    Done { usage: Option<Usage>, finish_reason: String },
}

/// Trait every LLM adapter implements. One concrete adapter
/// (`HttpProviderClient`) ships in this crate; the upstream endpoint
/// itself is an external collaborator (§1/§2).
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse>;

    async fn chat_stream(&self, req: ChatRequest) -> Result<BoxStream<'static, Result<StreamEvent>>>;
}

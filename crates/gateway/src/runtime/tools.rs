//! ToolRegistry: lists declared tools and invokes them by name against
//! the tool endpoint. The endpoint itself is an external collaborator
//! (§1) — this module's job is the contract shape and the timeout/
//! unknown-tool recovery policy the Orchestrator's tool loop depends on.

use std::time::Duration;

use async_trait::async_trait;
use ro_domain::error::Result;
use ro_domain::model::ToolDefinition;
use serde_json::Value;

/// Outcome of one tool invocation. `error` is set instead of returning
/// `Err` for anything the orchestrator should recover from by feeding
/// the failure back to the model — only registry-internal faults
/// (endpoint unreachable before a response shape is known) are `Err`.
#[derive(Debug, Clone)]
pub struct ToolCallResult {
    pub output: Value,
    pub error: Option<String>,
}

impl ToolCallResult {
    pub fn ok(output: Value) -> Self {
        Self { output, error: None }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            output: Value::Null,
            error: Some(message.into()),
        }
    }
}

#[async_trait]
pub trait ToolRegistry: Send + Sync {
    fn list(&self) -> Vec<ToolDefinition>;

    async fn call(&self, name: &str, arguments: Value, timeout: Duration) -> Result<ToolCallResult>;
}

/// A registry backed by a fixed declared catalogue plus an HTTP
/// dispatch endpoint.
pub struct HttpToolRegistry {
    base_url: String,
    client: reqwest::Client,
    catalogue: Vec<ToolDefinition>,
}

impl HttpToolRegistry {
    pub fn new(base_url: impl Into<String>, catalogue: Vec<ToolDefinition>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            catalogue,
        }
    }
}

#[async_trait]
impl ToolRegistry for HttpToolRegistry {
    fn list(&self) -> Vec<ToolDefinition> {
        self.catalogue.clone()
    }

    async fn call(&self, name: &str, arguments: Value, timeout: Duration) -> Result<ToolCallResult> {
        if !self.catalogue.iter().any(|t| t.name == name) {
            return Ok(ToolCallResult::failed(format!("unknown tool \"{name}\"")));
        }

        let url = format!("{}/tools/{name}/invoke", self.base_url.trim_end_matches('/'));
        let call = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "arguments": arguments }))
            .send();

        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(resp)) if resp.status().is_success() => match resp.json::<Value>().await {
                Ok(body) => Ok(ToolCallResult::ok(body)),
                Err(e) => Ok(ToolCallResult::failed(format!("malformed tool response: {e}"))),
            },
            Ok(Ok(resp)) => Ok(ToolCallResult::failed(format!("tool endpoint HTTP {}", resp.status()))),
            Ok(Err(e)) => Ok(ToolCallResult::failed(format!("tool endpoint error: {e}"))),
            Err(_) => Ok(ToolCallResult::failed("tool call timed out")),
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use super::content::Content;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response lifecycle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    /// Pre-queue init state, used only while the row is being created.
    Pending,
    Queued,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl ResponseStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ResponseStatus::Completed | ResponseStatus::Failed | ResponseStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationParams {
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    #[serde(default)]
    pub stop: Vec<String>,
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
    #[serde(default)]
    pub tool_choice: Option<String>,
    #[serde(default)]
    pub response_format: Option<Value>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub store: bool,
    #[serde(default)]
    pub background: bool,
}

impl GenerationParams {
    pub fn webhook_url(&self) -> Option<&str> {
        self.metadata.get("webhook_url").map(|s| s.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseError {
    pub kind: String,
    pub message: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    pub model: String,
    pub input: Value,
    #[serde(default)]
    pub params: GenerationParams,
    pub status: ResponseStatus,
    #[serde(default)]
    pub output: Vec<Content>,
    #[serde(default)]
    pub usage: Option<Usage>,
    #[serde(default)]
    pub error: Option<ResponseError>,

    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub queued_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,

    /// Idempotency/tracing key: the id of the create-response request.
    pub request_id: Uuid,
    #[serde(default)]
    pub previous_response_id: Option<String>,
}

impl Response {
    pub fn new(
        user_id: impl Into<String>,
        model: impl Into<String>,
        input: Value,
        params: GenerationParams,
    ) -> Self {
        let now = Utc::now();
        let background = params.background;
        Self {
            id: format!("resp_{}", Uuid::new_v4().simple()),
            user_id: user_id.into(),
            conversation_id: None,
            model: model.into(),
            input,
            params,
            status: if background {
                ResponseStatus::Queued
            } else {
                ResponseStatus::InProgress
            },
            output: Vec::new(),
            usage: None,
            error: None,
            created_at: now,
            queued_at: if background { Some(now) } else { None },
            started_at: if background { None } else { Some(now) },
            completed_at: None,
            cancelled_at: None,
            updated_at: now,
            request_id: Uuid::new_v4(),
            previous_response_id: None,
        }
    }

    /// Attempt a transition, respecting terminal-status write-once.
    /// Returns `false` (a no-op) if `self.status` is already terminal.
    pub fn transition(&mut self, to: ResponseStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        let now = Utc::now();
        match to {
            ResponseStatus::InProgress => self.started_at.get_or_insert(now),
            ResponseStatus::Completed | ResponseStatus::Failed | ResponseStatus::Cancelled => {
                self.completed_at.get_or_insert(now)
            }
            _ => &mut self.created_at,
        };
        if to == ResponseStatus::Cancelled {
            self.cancelled_at = Some(now);
        }
        self.status = to;
        self.updated_at = now;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_background_response_starts_queued() {
        let r = Response::new(
            "u1",
            "gpt-4o-mini",
            Value::String("hi".into()),
            GenerationParams {
                background: true,
                store: true,
                ..Default::default()
            },
        );
        assert_eq!(r.status, ResponseStatus::Queued);
        assert!(r.queued_at.is_some());
    }

    #[test]
    fn new_sync_response_starts_in_progress() {
        let r = Response::new(
            "u1",
            "gpt-4o-mini",
            Value::String("hi".into()),
            GenerationParams::default(),
        );
        assert_eq!(r.status, ResponseStatus::InProgress);
        assert!(r.started_at.is_some());
    }

    #[test]
    fn terminal_status_is_write_once() {
        let mut r = Response::new(
            "u1",
            "m",
            Value::Null,
            GenerationParams::default(),
        );
        assert!(r.transition(ResponseStatus::Completed));
        let completed_at = r.completed_at;
        assert!(!r.transition(ResponseStatus::Failed));
        assert_eq!(r.status, ResponseStatus::Completed);
        assert_eq!(r.completed_at, completed_at);
    }
}

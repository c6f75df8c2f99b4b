use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::content::Content;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Message,
    ToolCall,
    ToolResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemRole {
    User,
    Assistant,
    System,
    Tool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Completed,
    /// Produced by an aborted orchestrator run; replaced on re-entry
    /// rather than surfaced to the caller (§4.1 idempotence).
    Incomplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Like,
    Unlike,
}

/// One element in a branch. `(conversation_id, branch, sequence)` is
/// unique; `content` is non-empty; sequence numbers are contiguous
/// within a branch starting at 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub conversation_id: String,
    pub branch: String,
    pub sequence: u64,
    pub item_type: ItemType,
    /// Tool results carry no role.
    #[serde(default)]
    pub role: Option<ItemRole>,
    pub content: Vec<Content>,
    pub status: ItemStatus,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// The Response that produced this item, if any (user input items
    /// created directly by Ingress have none).
    #[serde(default)]
    pub response_id: Option<String>,
    #[serde(default)]
    pub rating: Option<Rating>,
    #[serde(default)]
    pub rating_comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Item {
    pub fn new(
        conversation_id: impl Into<String>,
        branch: impl Into<String>,
        sequence: u64,
        item_type: ItemType,
        role: Option<ItemRole>,
        content: Vec<Content>,
    ) -> Self {
        Self {
            id: format!("item_{}", Uuid::new_v4().simple()),
            conversation_id: conversation_id.into(),
            branch: branch.into(),
            sequence,
            item_type,
            role,
            content,
            status: ItemStatus::Completed,
            completed_at: Some(Utc::now()),
            response_id: None,
            rating: None,
            rating_comment: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.content.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::content::Content;

    #[test]
    fn item_with_no_content_is_invalid() {
        let it = Item::new("c1", "MAIN", 1, ItemType::Message, Some(ItemRole::User), vec![]);
        assert!(!it.is_valid());
    }

    #[test]
    fn item_with_content_is_valid() {
        let it = Item::new(
            "c1",
            "MAIN",
            1,
            ItemType::Message,
            Some(ItemRole::User),
            vec![Content::text("hi")],
        );
        assert!(it.is_valid());
    }
}

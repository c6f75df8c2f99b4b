use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAIN_BRANCH: &str = "MAIN";
pub const TEMPORARY_CHAT_ID: &str = "TEMPORARY_CHAT_ID";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub title: String,
    /// Name of the currently active branch.
    pub active_branch: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub project_id: Option<String>,
    pub instruction_version: u32,
    /// Snapshot of the system/instruction prompt at creation time, for
    /// reproducibility independent of later instruction edits.
    pub effective_instructions: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(
        user_id: impl Into<String>,
        title: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: format!("conv_{}", Uuid::new_v4().simple()),
            user_id: user_id.into(),
            title: title.into(),
            active_branch: MAIN_BRANCH.to_string(),
            private: false,
            project_id: None,
            instruction_version: 1,
            effective_instructions: instructions.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A named, ordered sequence of Items inside a Conversation. Branches
/// form a forest — only root branches have `parent_branch = None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub conversation_id: String,
    pub name: String,
    #[serde(default)]
    pub parent_branch: Option<String>,
    #[serde(default)]
    pub forked_from_item_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Branch {
    pub fn root(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            name: MAIN_BRANCH.to_string(),
            parent_branch: None,
            forked_from_item_id: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_conversation_starts_on_main_branch() {
        let c = Conversation::new("u1", "My thread", "be helpful");
        assert_eq!(c.active_branch, MAIN_BRANCH);
        assert!(!c.private);
    }

    #[test]
    fn root_branch_has_no_parent() {
        let b = Branch::root("conv_1");
        assert!(b.parent_branch.is_none());
        assert!(b.forked_from_item_id.is_none());
    }
}

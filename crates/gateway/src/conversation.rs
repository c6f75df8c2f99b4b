//! ConversationService: append/fork/paginate branch items, and the
//! item↔provider-message translation the Orchestrator needs to build a
//! prompt from conversation history (§4.6).

use std::sync::Arc;

use ro_domain::error::{Error, Result};
use ro_domain::model::{Branch, Conversation, Item, ItemRole, ItemStatus, ItemType, Rating, MAIN_BRANCH};
use ro_providers::ChatMessage;
use ro_store::StoreGateway;

pub struct ConversationService {
    store: Arc<dyn StoreGateway>,
}

impl ConversationService {
    pub fn new(store: Arc<dyn StoreGateway>) -> Self {
        Self { store }
    }

    pub fn create(&self, user_id: &str, title: &str, instructions: &str) -> Result<Conversation> {
        let conversation = Conversation::new(user_id, title, instructions);
        self.store.create_branch(Branch::root(&conversation.id))?;
        self.store.create_conversation(conversation)
    }

    pub fn get(&self, id: &str) -> Result<Conversation> {
        self.store.get_conversation(id)
    }

    pub fn append_items(&self, conversation_id: &str, branch: &str, items: Vec<Item>) -> Result<Vec<Item>> {
        self.store.append_items(conversation_id, branch, items)
    }

    pub fn branch_items(&self, conversation_id: &str, branch: &str, offset: usize, limit: usize) -> Result<Vec<Item>> {
        self.store.list_branch_items(conversation_id, branch, offset, limit)
    }

    pub fn fork(
        &self,
        conversation_id: &str,
        source_branch: &str,
        new_branch: &str,
        from_item_id: &str,
    ) -> Result<Branch> {
        self.store.fork_branch(conversation_id, source_branch, new_branch, from_item_id)
    }

    pub fn rate(&self, item_id: &str, rating: Rating, comment: Option<String>) -> Result<()> {
        self.store.rate_item(item_id, rating, comment)
    }

    /// Load every item on a conversation's active branch, in order.
    /// Large conversations page transparently at `PAGE_SIZE`.
    pub fn load_active_branch(&self, conversation: &Conversation) -> Result<Vec<Item>> {
        const PAGE_SIZE: usize = 500;
        let mut items = Vec::new();
        let mut offset = 0;
        loop {
            let page = self
                .store
                .list_branch_items(&conversation.id, &conversation.active_branch, offset, PAGE_SIZE)?;
            let got = page.len();
            items.extend(page);
            if got < PAGE_SIZE {
                break;
            }
            offset += got;
        }
        Ok(items)
    }
}

/// Translate persisted items into provider-shaped messages, preserving
/// order. Tool-result items carry no role on the wire, matching
/// `ChatMessage::role: Option<ItemRole>`.
pub fn items_to_messages(items: &[Item]) -> Vec<ChatMessage> {
    items
        .iter()
        .filter(|it| it.status == ItemStatus::Completed)
        .map(|it| ChatMessage::new(it.role, it.content.clone()))
        .collect()
}

/// Build the next sequence-numbered item for a branch append. The
/// StoreGateway assigns the authoritative sequence number on persist;
/// this only fills in everything else `Item::new` needs.
pub fn new_item(
    conversation_id: &str,
    branch: &str,
    item_type: ItemType,
    role: Option<ItemRole>,
    content: Vec<ro_domain::model::Content>,
    response_id: Option<&str>,
) -> Result<Item> {
    if content.is_empty() {
        return Err(Error::validation("item content must not be empty"));
    }
    let mut item = Item::new(conversation_id, branch, 0, item_type, role, content);
    item.response_id = response_id.map(str::to_owned);
    Ok(item)
}

pub fn main_branch() -> &'static str {
    MAIN_BRANCH
}

#[cfg(test)]
mod tests {
    use super::*;
    use ro_domain::model::Content;
    use ro_store::MemoryStoreGateway;

    fn service() -> ConversationService {
        let dir = tempfile::tempdir().unwrap().keep();
        ConversationService::new(Arc::new(MemoryStoreGateway::new(&dir).unwrap()))
    }

    #[test]
    fn create_seeds_an_empty_main_branch() {
        let svc = service();
        let conv = svc.create("u1", "t", "be nice").unwrap();
        assert!(svc.load_active_branch(&conv).unwrap().is_empty());
    }

    #[test]
    fn items_round_trip_through_message_translation() {
        let svc = service();
        let conv = svc.create("u1", "t", "be nice").unwrap();
        let item = new_item(
            &conv.id,
            MAIN_BRANCH,
            ItemType::Message,
            Some(ItemRole::User),
            vec![Content::text("hi")],
            None,
        )
        .unwrap();
        svc.append_items(&conv.id, MAIN_BRANCH, vec![item]).unwrap();
        let items = svc.load_active_branch(&conv).unwrap();
        let messages = items_to_messages(&items);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Some(ItemRole::User));
    }

    #[test]
    fn empty_content_is_rejected() {
        let err = new_item("c1", MAIN_BRANCH, ItemType::Message, None, vec![], None).unwrap_err();
        assert_eq!(err.kind.as_str(), "validation");
    }
}

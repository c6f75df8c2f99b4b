use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use ro_domain::error::{Error, Result};
use ro_domain::model::{Branch, Conversation, Item, ItemStatus, Rating, MAIN_BRANCH};

/// In-memory index backing ConversationService: conversations, the
/// branch forest, and branch items. Modeled per DESIGN NOTES §9 as
/// three id-keyed tables rather than cyclic in-memory pointers.
pub(crate) struct ConversationIndex {
    conversations_log: PathBuf,
    branches_log: PathBuf,
    items_log: PathBuf,

    conversations: HashMap<String, Conversation>,
    branches: HashMap<(String, String), Branch>,
    items_by_id: HashMap<String, Item>,
    /// (conversation_id, branch) -> item ids in sequence order.
    items_by_branch: HashMap<(String, String), Vec<String>>,
}

fn append_jsonl<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(Error::from)?;
    writeln!(file, "{}", serde_json::to_string(value)?).map_err(Error::from)?;
    Ok(())
}

fn load_jsonl<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path).map_err(Error::from)?;
    let mut out = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(Error::from)?;
        if line.trim().is_empty() {
            continue;
        }
        out.push(serde_json::from_str(&line)?);
    }
    Ok(out)
}

impl ConversationIndex {
    pub(crate) fn load(state_dir: &Path) -> Result<Self> {
        let conversations_log = state_dir.join("conversations.jsonl");
        let branches_log = state_dir.join("conversation_branches.jsonl");
        let items_log = state_dir.join("conversation_items.jsonl");

        let mut conversations = HashMap::new();
        for c in load_jsonl::<Conversation>(&conversations_log)? {
            conversations.insert(c.id.clone(), c);
        }

        let mut branches = HashMap::new();
        for b in load_jsonl::<Branch>(&branches_log)? {
            branches.insert((b.conversation_id.clone(), b.name.clone()), b);
        }

        let mut items_by_id = HashMap::new();
        let mut items_by_branch: HashMap<(String, String), Vec<String>> = HashMap::new();
        for item in load_jsonl::<Item>(&items_log)? {
            let key = (item.conversation_id.clone(), item.branch.clone());
            let ids = items_by_branch.entry(key).or_default();
            // last write for a given id wins; insert once, keep position by sequence
            if !items_by_id.contains_key(&item.id) {
                ids.push(item.id.clone());
            }
            items_by_id.insert(item.id.clone(), item);
        }
        for ids in items_by_branch.values_mut() {
            ids.sort_by_key(|id| items_by_id.get(id).map(|i| i.sequence).unwrap_or(0));
        }

        Ok(Self {
            conversations_log,
            branches_log,
            items_log,
            conversations,
            branches,
            items_by_id,
            items_by_branch,
        })
    }

    pub(crate) fn create_conversation(&mut self, conversation: Conversation) -> Result<Conversation> {
        append_jsonl(&self.conversations_log, &conversation)?;
        self.conversations.insert(conversation.id.clone(), conversation.clone());
        let root = Branch::root(&conversation.id);
        self.create_branch(root)?;
        Ok(conversation)
    }

    pub(crate) fn get_conversation(&self, id: &str) -> Result<Conversation> {
        self.conversations
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("conversation {id} not found")))
    }

    pub(crate) fn create_branch(&mut self, branch: Branch) -> Result<()> {
        append_jsonl(&self.branches_log, &branch)?;
        self.branches
            .insert((branch.conversation_id.clone(), branch.name.clone()), branch);
        Ok(())
    }

    pub(crate) fn get_branch(&self, conversation_id: &str, name: &str) -> Result<Branch> {
        self.branches
            .get(&(conversation_id.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| Error::not_found(format!("branch {conversation_id}/{name} not found")))
    }

    pub(crate) fn append_items(
        &mut self,
        conversation_id: &str,
        branch: &str,
        mut items: Vec<Item>,
    ) -> Result<Vec<Item>> {
        self.get_branch(conversation_id, branch)?;
        let key = (conversation_id.to_string(), branch.to_string());
        let existing = self.items_by_branch.entry(key.clone()).or_default();
        let mut next_seq = existing.len() as u64 + 1;

        for item in &mut items {
            if !item.is_valid() {
                return Err(Error::validation(format!(
                    "item for {conversation_id}/{branch} has empty content"
                )));
            }
            item.conversation_id = conversation_id.to_string();
            item.branch = branch.to_string();
            item.sequence = next_seq;
            next_seq += 1;
        }

        for item in &items {
            append_jsonl(&self.items_log, item)?;
        }

        let existing = self.items_by_branch.get_mut(&key).expect("just inserted above");
        for item in &items {
            existing.push(item.id.clone());
            self.items_by_id.insert(item.id.clone(), item.clone());
        }

        Ok(items)
    }

    pub(crate) fn list_branch_items(
        &self,
        conversation_id: &str,
        branch: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Item>> {
        let key = (conversation_id.to_string(), branch.to_string());
        let ids = self.items_by_branch.get(&key).cloned().unwrap_or_default();
        Ok(ids
            .into_iter()
            .skip(offset)
            .take(limit)
            .filter_map(|id| self.items_by_id.get(&id).cloned())
            .collect())
    }

    pub(crate) fn rate_item(
        &mut self,
        item_id: &str,
        rating: Rating,
        comment: Option<String>,
    ) -> Result<()> {
        let item = self
            .items_by_id
            .get_mut(item_id)
            .ok_or_else(|| Error::not_found(format!("item {item_id} not found")))?;
        item.rating = Some(rating);
        item.rating_comment = comment;
        let snapshot = item.clone();
        append_jsonl(&self.items_log, &snapshot)?;
        Ok(())
    }

    /// Mark the assistant/tool items produced by an aborted orchestrator
    /// run as `incomplete` so crash recovery replaces rather than
    /// duplicates them (§4.1 idempotence).
    pub(crate) fn mark_incomplete(&mut self, response_id: &str) -> Result<()> {
        let ids: Vec<String> = self
            .items_by_id
            .values()
            .filter(|i| i.response_id.as_deref() == Some(response_id))
            .map(|i| i.id.clone())
            .collect();
        for id in ids {
            if let Some(item) = self.items_by_id.get_mut(&id) {
                item.status = ItemStatus::Incomplete;
                let snapshot = item.clone();
                append_jsonl(&self.items_log, &snapshot)?;
            }
        }
        Ok(())
    }

    pub(crate) fn fork_branch(
        &mut self,
        conversation_id: &str,
        source_branch: &str,
        new_branch: &str,
        from_item_id: &str,
    ) -> Result<Branch> {
        let source = self.get_branch(conversation_id, source_branch)?;
        let source_items = self.list_branch_items(conversation_id, source_branch, 0, usize::MAX)?;
        let cut = source_items
            .iter()
            .position(|i| i.id == from_item_id)
            .ok_or_else(|| Error::not_found(format!("item {from_item_id} not in branch")))?;

        let branch = Branch {
            conversation_id: conversation_id.to_string(),
            name: new_branch.to_string(),
            parent_branch: Some(source.name.clone()),
            forked_from_item_id: Some(from_item_id.to_string()),
            created_at: chrono::Utc::now(),
        };
        self.create_branch(branch.clone())?;

        let copied: Vec<Item> = source_items[..=cut]
            .iter()
            .map(|original| {
                let mut clone = original.clone();
                clone.id = format!("item_{}", uuid::Uuid::new_v4().simple());
                clone.branch = new_branch.to_string();
                clone
            })
            .collect();
        let key = (conversation_id.to_string(), new_branch.to_string());
        for item in &copied {
            append_jsonl(&self.items_log, item)?;
            self.items_by_branch.entry(key.clone()).or_default().push(item.id.clone());
            self.items_by_id.insert(item.id.clone(), item.clone());
        }

        Ok(branch)
    }

    /// Swap `branch` into `MAIN` using a temporary third name so the
    /// rename never collides with the `(conversation_id, name)` unique
    /// index (§4.6).
    pub(crate) fn swap_to_main(&mut self, conversation_id: &str, branch: &str) -> Result<()> {
        let tmp_name = format!("__swap_{}", uuid::Uuid::new_v4().simple());
        self.rename_branch(conversation_id, MAIN_BRANCH, &tmp_name)?;
        self.rename_branch(conversation_id, branch, MAIN_BRANCH)?;
        self.rename_branch(conversation_id, &tmp_name, branch)?;
        if let Some(conversation) = self.conversations.get_mut(conversation_id) {
            conversation.active_branch = MAIN_BRANCH.to_string();
            conversation.updated_at = chrono::Utc::now();
            let snapshot = conversation.clone();
            append_jsonl(&self.conversations_log, &snapshot)?;
        }
        Ok(())
    }

    fn rename_branch(&mut self, conversation_id: &str, from: &str, to: &str) -> Result<()> {
        let key = (conversation_id.to_string(), from.to_string());
        let mut branch = self
            .branches
            .remove(&key)
            .ok_or_else(|| Error::not_found(format!("branch {conversation_id}/{from} not found")))?;
        branch.name = to.to_string();
        append_jsonl(&self.branches_log, &branch)?;
        self.branches.insert((conversation_id.to_string(), to.to_string()), branch);

        if let Some(ids) = self.items_by_branch.remove(&(conversation_id.to_string(), from.to_string())) {
            for id in &ids {
                if let Some(item) = self.items_by_id.get_mut(id) {
                    item.branch = to.to_string();
                }
            }
            self.items_by_branch.insert((conversation_id.to_string(), to.to_string()), ids);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ro_domain::model::{Content, ItemRole, ItemType};

    fn new_item(role: ItemRole, text: &str) -> Item {
        Item::new("", "", 0, ItemType::Message, Some(role), vec![Content::text(text)])
    }

    #[test]
    fn appended_items_get_contiguous_sequence_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let mut idx = ConversationIndex::load(dir.path()).unwrap();
        let conv = idx.create_conversation(Conversation::new("u1", "t", "be nice")).unwrap();

        let appended = idx
            .append_items(
                &conv.id,
                MAIN_BRANCH,
                vec![new_item(ItemRole::User, "hi"), new_item(ItemRole::Assistant, "hello")],
            )
            .unwrap();
        assert_eq!(appended[0].sequence, 1);
        assert_eq!(appended[1].sequence, 2);

        let more = idx
            .append_items(&conv.id, MAIN_BRANCH, vec![new_item(ItemRole::User, "again")])
            .unwrap();
        assert_eq!(more[0].sequence, 3);
    }

    #[test]
    fn empty_content_item_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut idx = ConversationIndex::load(dir.path()).unwrap();
        let conv = idx.create_conversation(Conversation::new("u1", "t", "x")).unwrap();
        let empty = Item::new("", "", 0, ItemType::Message, Some(ItemRole::User), vec![]);
        assert!(idx.append_items(&conv.id, MAIN_BRANCH, vec![empty]).is_err());
    }

    #[test]
    fn fork_copies_prefix_and_sets_lineage() {
        let dir = tempfile::tempdir().unwrap();
        let mut idx = ConversationIndex::load(dir.path()).unwrap();
        let conv = idx.create_conversation(Conversation::new("u1", "t", "x")).unwrap();
        let items = idx
            .append_items(
                &conv.id,
                MAIN_BRANCH,
                vec![
                    new_item(ItemRole::User, "1"),
                    new_item(ItemRole::Assistant, "2"),
                    new_item(ItemRole::User, "3"),
                ],
            )
            .unwrap();

        let branch = idx
            .fork_branch(&conv.id, MAIN_BRANCH, "edit-1", &items[1].id)
            .unwrap();
        assert_eq!(branch.parent_branch.as_deref(), Some(MAIN_BRANCH));
        assert_eq!(branch.forked_from_item_id.as_deref(), Some(items[1].id.as_str()));

        let forked_items = idx.list_branch_items(&conv.id, "edit-1", 0, 100).unwrap();
        assert_eq!(forked_items.len(), 2);
    }

    #[test]
    fn swap_to_main_exchanges_branch_contents() {
        let dir = tempfile::tempdir().unwrap();
        let mut idx = ConversationIndex::load(dir.path()).unwrap();
        let conv = idx.create_conversation(Conversation::new("u1", "t", "x")).unwrap();
        idx.append_items(&conv.id, MAIN_BRANCH, vec![new_item(ItemRole::User, "main-1")])
            .unwrap();
        let items = idx
            .append_items(&conv.id, MAIN_BRANCH, vec![new_item(ItemRole::User, "main-2")])
            .unwrap();
        idx.fork_branch(&conv.id, MAIN_BRANCH, "edit-1", &items[0].id).unwrap();
        idx.append_items(&conv.id, "edit-1", vec![new_item(ItemRole::User, "edit-only")])
            .unwrap();

        idx.swap_to_main(&conv.id, "edit-1").unwrap();

        let main_items = idx.list_branch_items(&conv.id, MAIN_BRANCH, 0, 100).unwrap();
        assert!(main_items.iter().any(|i| i.content.iter().any(|c| matches!(c, Content::Text{text} if text == "edit-only"))));

        let demoted = idx.list_branch_items(&conv.id, "edit-1", 0, 100).unwrap();
        assert!(demoted.iter().any(|i| i.content.iter().any(|c| matches!(c, Content::Text{text} if text == "main-1"))));
    }
}

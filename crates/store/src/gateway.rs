use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use ro_domain::error::{Error, Result};
use ro_domain::model::{
    Artifact, Branch, Conversation, Item, Rating, Response, ResponseStatus, Share,
};

use crate::artifacts::ArtifactIndex;
use crate::conversations::ConversationIndex;
use crate::responses::ResponseIndex;
use crate::shares::ShareIndex;

/// Typed read/write contract for the persisted state behind the
/// orchestration core. One implementation (`MemoryStoreGateway`) ships
/// here; a Postgres-backed implementation would satisfy the same trait
/// without touching any caller.
pub trait StoreGateway: Send + Sync {
    fn create_response(&self, response: Response) -> Result<Response>;
    fn get_response(&self, id: &str) -> Result<Response>;
    /// Persist the full record (used after appending output/usage mid-run).
    fn save_response(&self, response: Response) -> Result<()>;
    /// Attempt a status transition. Returns `Ok(None)` if the record was
    /// already terminal (write-once) or didn't match `expected_from`.
    fn transition_response(
        &self,
        id: &str,
        expected_from: &[ResponseStatus],
        to: ResponseStatus,
    ) -> Result<Option<Response>>;
    /// `SELECT ... FOR UPDATE SKIP LOCKED` equivalent: atomically claim
    /// the oldest queued response and flip it to `in_progress`. At most
    /// one caller across concurrent callers receives `Some`.
    fn claim_next_queued(&self) -> Result<Option<Response>>;

    fn create_conversation(&self, conversation: Conversation) -> Result<Conversation>;
    fn get_conversation(&self, id: &str) -> Result<Conversation>;
    fn create_branch(&self, branch: Branch) -> Result<()>;
    fn get_branch(&self, conversation_id: &str, name: &str) -> Result<Branch>;
    /// Assigns contiguous sequence numbers and appends. Returns the
    /// stored items (with sequence populated).
    fn append_items(
        &self,
        conversation_id: &str,
        branch: &str,
        items: Vec<Item>,
    ) -> Result<Vec<Item>>;
    fn list_branch_items(
        &self,
        conversation_id: &str,
        branch: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Item>>;
    fn rate_item(&self, item_id: &str, rating: Rating, comment: Option<String>) -> Result<()>;
    fn fork_branch(
        &self,
        conversation_id: &str,
        source_branch: &str,
        new_branch: &str,
        from_item_id: &str,
    ) -> Result<Branch>;
    /// Atomically swap `branch` into `MAIN`, using a temporary name as a
    /// third slot so the rename never collides with the uniqueness index
    /// on `(conversation_id, name)`.
    fn swap_to_main(&self, conversation_id: &str, branch: &str) -> Result<()>;

    fn create_share(&self, share: Share) -> Result<Share>;
    fn get_share_by_slug(&self, slug: &str) -> Result<Share>;
    fn increment_share_view(&self, slug: &str) -> Result<()>;

    fn insert_artifact_version(&self, artifact: Artifact) -> Result<Artifact>;
    fn get_artifact(&self, id: &str) -> Result<Artifact>;

    /// Mark items an aborted orchestrator run left behind as `incomplete`
    /// so crash recovery replaces rather than duplicates them (§4.1
    /// idempotence).
    fn mark_items_incomplete(&self, response_id: &str) -> Result<()>;
}

pub struct MemoryStoreGateway {
    pub(crate) responses: RwLock<ResponseIndex>,
    pub(crate) conversations: RwLock<ConversationIndex>,
    pub(crate) shares: RwLock<ShareIndex>,
    pub(crate) artifacts: RwLock<ArtifactIndex>,
}

impl MemoryStoreGateway {
    /// Load (or create) the store rooted at `state_dir`. Each sub-index
    /// keeps its own append-only JSONL log under this directory so a
    /// crashed process can reconstruct the last known state on restart.
    pub fn new(state_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_dir).map_err(Error::from)?;
        Ok(Self {
            responses: RwLock::new(ResponseIndex::load(&responses_log_path(state_dir))?),
            conversations: RwLock::new(ConversationIndex::load(state_dir)?),
            shares: RwLock::new(ShareIndex::load(&shares_log_path(state_dir))?),
            artifacts: RwLock::new(ArtifactIndex::load(&artifacts_log_path(state_dir))?),
        })
    }
}

fn responses_log_path(dir: &Path) -> PathBuf {
    dir.join("responses.jsonl")
}
fn shares_log_path(dir: &Path) -> PathBuf {
    dir.join("shares.jsonl")
}
fn artifacts_log_path(dir: &Path) -> PathBuf {
    dir.join("artifacts.jsonl")
}

impl StoreGateway for MemoryStoreGateway {
    fn create_response(&self, response: Response) -> Result<Response> {
        self.responses.write().create(response)
    }

    fn get_response(&self, id: &str) -> Result<Response> {
        self.responses.read().get(id)
    }

    fn save_response(&self, response: Response) -> Result<()> {
        self.responses.write().save(response)
    }

    fn transition_response(
        &self,
        id: &str,
        expected_from: &[ResponseStatus],
        to: ResponseStatus,
    ) -> Result<Option<Response>> {
        self.responses.write().transition(id, expected_from, to)
    }

    fn claim_next_queued(&self) -> Result<Option<Response>> {
        self.responses.write().claim_next_queued()
    }

    fn create_conversation(&self, conversation: Conversation) -> Result<Conversation> {
        self.conversations.write().create_conversation(conversation)
    }

    fn get_conversation(&self, id: &str) -> Result<Conversation> {
        self.conversations.read().get_conversation(id)
    }

    fn create_branch(&self, branch: Branch) -> Result<()> {
        self.conversations.write().create_branch(branch)
    }

    fn get_branch(&self, conversation_id: &str, name: &str) -> Result<Branch> {
        self.conversations.read().get_branch(conversation_id, name)
    }

    fn append_items(
        &self,
        conversation_id: &str,
        branch: &str,
        items: Vec<Item>,
    ) -> Result<Vec<Item>> {
        self.conversations.write().append_items(conversation_id, branch, items)
    }

    fn list_branch_items(
        &self,
        conversation_id: &str,
        branch: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Item>> {
        self.conversations
            .read()
            .list_branch_items(conversation_id, branch, offset, limit)
    }

    fn rate_item(&self, item_id: &str, rating: Rating, comment: Option<String>) -> Result<()> {
        self.conversations.write().rate_item(item_id, rating, comment)
    }

    fn fork_branch(
        &self,
        conversation_id: &str,
        source_branch: &str,
        new_branch: &str,
        from_item_id: &str,
    ) -> Result<Branch> {
        self.conversations
            .write()
            .fork_branch(conversation_id, source_branch, new_branch, from_item_id)
    }

    fn swap_to_main(&self, conversation_id: &str, branch: &str) -> Result<()> {
        self.conversations.write().swap_to_main(conversation_id, branch)
    }

    fn create_share(&self, share: Share) -> Result<Share> {
        self.shares.write().create(share)
    }

    fn get_share_by_slug(&self, slug: &str) -> Result<Share> {
        self.shares.read().get_by_slug(slug)
    }

    fn increment_share_view(&self, slug: &str) -> Result<()> {
        self.shares.write().increment_view(slug)
    }

    fn insert_artifact_version(&self, artifact: Artifact) -> Result<Artifact> {
        self.artifacts.write().insert_version(artifact)
    }

    fn get_artifact(&self, id: &str) -> Result<Artifact> {
        self.artifacts.read().get(id)
    }

    fn mark_items_incomplete(&self, response_id: &str) -> Result<()> {
        self.conversations.write().mark_incomplete(response_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ro_domain::model::{Content, ItemType};

    fn gateway() -> MemoryStoreGateway {
        let dir = tempfile::tempdir().unwrap().keep();
        MemoryStoreGateway::new(&dir).unwrap()
    }

    #[test]
    fn conversation_starts_with_an_empty_main_branch() {
        let gw = gateway();
        let conv = gw
            .create_conversation(Conversation::new("u1", "t", "be nice"))
            .unwrap();
        let items = gw
            .list_branch_items(&conv.id, ro_domain::model::MAIN_BRANCH, 0, 10)
            .unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn share_snapshot_round_trips_through_the_gateway() {
        let gw = gateway();
        let conv = gw
            .create_conversation(Conversation::new("u1", "t", "be nice"))
            .unwrap();
        let items = gw
            .append_items(
                &conv.id,
                ro_domain::model::MAIN_BRANCH,
                vec![
                    Item::new("", "", 0, ItemType::Message, None, vec![Content::text("a")]),
                    Item::new("", "", 0, ItemType::Message, None, vec![Content::text("b")]),
                ],
            )
            .unwrap();
        let snapshot = Share::build_snapshot(&conv.id, &items).unwrap();
        let share = gw
            .create_share(Share::new(&conv.id, ro_domain::model::generate_slug(), snapshot))
            .unwrap();
        let fetched = gw.get_share_by_slug(&share.slug).unwrap();
        assert_eq!(fetched.snapshot.len(), 2);
    }
}

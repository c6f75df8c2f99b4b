use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;

use ro_domain::error::{Error, Result};
use ro_domain::model::{Response, ResponseStatus};

/// In-memory index of Responses plus their JSONL change log. Responses
/// are never evicted — terminal records are retained for audit per §3 —
/// so this index keeps every record in memory for the life of the
/// process and relies on the log purely for crash recovery.
pub(crate) struct ResponseIndex {
    log_path: PathBuf,
    by_id: HashMap<String, Response>,
}

impl ResponseIndex {
    pub(crate) fn load(log_path: &Path) -> Result<Self> {
        let mut by_id = HashMap::new();
        if log_path.exists() {
            let file = File::open(log_path).map_err(Error::from)?;
            for line in BufReader::new(file).lines() {
                let line = line.map_err(Error::from)?;
                if line.trim().is_empty() {
                    continue;
                }
                let resp: Response = serde_json::from_str(&line)?;
                by_id.insert(resp.id.clone(), resp);
            }
        }
        tracing::info!(responses = by_id.len(), path = %log_path.display(), "response store loaded");
        Ok(Self {
            log_path: log_path.to_path_buf(),
            by_id,
        })
    }

    fn append(&self, response: &Response) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(Error::from)?;
        let line = serde_json::to_string(response)?;
        writeln!(file, "{line}").map_err(Error::from)?;
        Ok(())
    }

    pub(crate) fn create(&mut self, response: Response) -> Result<Response> {
        self.append(&response)?;
        self.by_id.insert(response.id.clone(), response.clone());
        Ok(response)
    }

    pub(crate) fn get(&self, id: &str) -> Result<Response> {
        self.by_id
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("response {id} not found")))
    }

    pub(crate) fn save(&mut self, response: Response) -> Result<()> {
        self.append(&response)?;
        self.by_id.insert(response.id.clone(), response);
        Ok(())
    }

    pub(crate) fn transition(
        &mut self,
        id: &str,
        expected_from: &[ResponseStatus],
        to: ResponseStatus,
    ) -> Result<Option<Response>> {
        let response = self
            .by_id
            .get_mut(id)
            .ok_or_else(|| Error::not_found(format!("response {id} not found")))?;
        if response.status.is_terminal() {
            return Ok(None);
        }
        if !expected_from.is_empty() && !expected_from.contains(&response.status) {
            return Ok(None);
        }
        response.transition(to);
        let snapshot = response.clone();
        self.append(&snapshot)?;
        Ok(Some(snapshot))
    }

    /// Atomically claim the oldest queued response. Holding `&mut self`
    /// for the whole scan-and-flip is what makes this winner-take-all —
    /// the equivalent of `SELECT ... FOR UPDATE SKIP LOCKED` plus a
    /// conditional update inside one transaction.
    pub(crate) fn claim_next_queued(&mut self) -> Result<Option<Response>> {
        let winner_id = self
            .by_id
            .values()
            .filter(|r| r.status == ResponseStatus::Queued)
            .min_by_key(|r| r.queued_at.unwrap_or(r.created_at))
            .map(|r| r.id.clone());

        let Some(id) = winner_id else {
            return Ok(None);
        };
        let response = self.by_id.get_mut(&id).expect("winner_id came from by_id");
        response.status = ResponseStatus::InProgress;
        response.started_at = Some(Utc::now());
        response.updated_at = Utc::now();
        let snapshot = response.clone();
        self.append(&snapshot)?;
        Ok(Some(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ro_domain::model::GenerationParams;
    use serde_json::Value;

    fn background_response() -> Response {
        Response::new(
            "u1",
            "gpt-4o",
            Value::String("hi".into()),
            GenerationParams {
                background: true,
                store: true,
                ..Default::default()
            },
        )
    }

    #[test]
    fn claim_picks_oldest_queued_and_is_winner_take_all() {
        let dir = tempfile::tempdir().unwrap();
        let mut idx = ResponseIndex::load(&dir.path().join("responses.jsonl")).unwrap();
        let r1 = idx.create(background_response()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let _r2 = idx.create(background_response()).unwrap();

        let claimed = idx.claim_next_queued().unwrap().unwrap();
        assert_eq!(claimed.id, r1.id);
        assert_eq!(claimed.status, ResponseStatus::InProgress);

        // The same response cannot be claimed again.
        let second_claim = idx.claim_next_queued().unwrap().unwrap();
        assert_ne!(second_claim.id, r1.id);
    }

    #[test]
    fn claim_returns_none_when_nothing_queued() {
        let dir = tempfile::tempdir().unwrap();
        let mut idx = ResponseIndex::load(&dir.path().join("responses.jsonl")).unwrap();
        assert!(idx.claim_next_queued().unwrap().is_none());
    }

    #[test]
    fn transition_is_noop_on_terminal_status() {
        let dir = tempfile::tempdir().unwrap();
        let mut idx = ResponseIndex::load(&dir.path().join("responses.jsonl")).unwrap();
        let r = idx.create(background_response()).unwrap();
        idx.transition(&r.id, &[], ResponseStatus::Completed)
            .unwrap();
        let result = idx
            .transition(&r.id, &[], ResponseStatus::Failed)
            .unwrap();
        assert!(result.is_none());
        assert_eq!(idx.get(&r.id).unwrap().status, ResponseStatus::Completed);
    }

    #[test]
    fn reload_from_log_recovers_last_written_state() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("responses.jsonl");
        let id = {
            let mut idx = ResponseIndex::load(&log_path).unwrap();
            let r = idx.create(background_response()).unwrap();
            idx.transition(&r.id, &[], ResponseStatus::Cancelled).unwrap();
            r.id
        };

        let idx = ResponseIndex::load(&log_path).unwrap();
        let reloaded = idx.get(&id).unwrap();
        assert_eq!(reloaded.status, ResponseStatus::Cancelled);
    }

    #[test]
    fn expected_from_mismatch_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut idx = ResponseIndex::load(&dir.path().join("responses.jsonl")).unwrap();
        let r = idx.create(background_response()).unwrap();
        // r is Queued; ask for a transition that only applies FROM InProgress.
        let result = idx
            .transition(&r.id, &[ResponseStatus::InProgress], ResponseStatus::Completed)
            .unwrap();
        assert!(result.is_none());
        assert_eq!(idx.get(&r.id).unwrap().status, ResponseStatus::Queued);
    }
}

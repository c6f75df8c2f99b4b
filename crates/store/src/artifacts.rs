use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use ro_domain::error::{Error, Result};
use ro_domain::model::Artifact;

/// In-memory index of Artifacts. Version chains are linked via
/// `parent_artifact_id`; `is_latest` is flipped across the whole chain
/// inside `insert_version`'s single lock scope, the in-process analog of
/// the two-row `UPDATE` a database-backed implementation would run in one
/// transaction.
pub(crate) struct ArtifactIndex {
    log_path: PathBuf,
    by_id: HashMap<String, Artifact>,
}

impl ArtifactIndex {
    pub(crate) fn load(log_path: &Path) -> Result<Self> {
        let mut by_id = HashMap::new();
        if log_path.exists() {
            let file = File::open(log_path).map_err(Error::from)?;
            for line in BufReader::new(file).lines() {
                let line = line.map_err(Error::from)?;
                if line.trim().is_empty() {
                    continue;
                }
                let artifact: Artifact = serde_json::from_str(&line)?;
                by_id.insert(artifact.id.clone(), artifact);
            }
        }
        Ok(Self {
            log_path: log_path.to_path_buf(),
            by_id,
        })
    }

    fn append(&self, artifact: &Artifact) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(Error::from)?;
        writeln!(file, "{}", serde_json::to_string(artifact)?).map_err(Error::from)?;
        Ok(())
    }

    pub(crate) fn insert_version(&mut self, artifact: Artifact) -> Result<Artifact> {
        if let Some(parent_id) = &artifact.parent_artifact_id {
            let mut ancestor_id = Some(parent_id.clone());
            while let Some(id) = ancestor_id {
                let Some(ancestor) = self.by_id.get_mut(&id) else {
                    break;
                };
                ancestor_id = ancestor.parent_artifact_id.clone();
                if ancestor.is_latest {
                    ancestor.is_latest = false;
                    let snapshot = ancestor.clone();
                    self.append(&snapshot)?;
                }
            }
        }
        self.append(&artifact)?;
        self.by_id.insert(artifact.id.clone(), artifact.clone());
        Ok(artifact)
    }

    pub(crate) fn get(&self, id: &str) -> Result<Artifact> {
        self.by_id
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("artifact {id} not found")))
    }
}

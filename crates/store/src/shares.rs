use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use ro_domain::error::{Error, Result};
use ro_domain::model::{generate_slug, Share, MAX_SLUG_RETRIES};

/// In-memory index of Shares, keyed by slug. Slug collisions are vanishingly
/// unlikely at 131 bits of entropy, but the retry loop lives in the caller
/// (`create`) rather than `generate_slug` itself so the boundary between
/// "generate a candidate" and "give up after N tries" (§8) stays testable.
pub(crate) struct ShareIndex {
    log_path: PathBuf,
    by_slug: HashMap<String, Share>,
}

impl ShareIndex {
    pub(crate) fn load(log_path: &Path) -> Result<Self> {
        let mut by_slug = HashMap::new();
        if log_path.exists() {
            let file = File::open(log_path).map_err(Error::from)?;
            for line in BufReader::new(file).lines() {
                let line = line.map_err(Error::from)?;
                if line.trim().is_empty() {
                    continue;
                }
                let share: Share = serde_json::from_str(&line)?;
                by_slug.insert(share.slug.clone(), share);
            }
        }
        Ok(Self {
            log_path: log_path.to_path_buf(),
            by_slug,
        })
    }

    fn append(&self, share: &Share) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(Error::from)?;
        writeln!(file, "{}", serde_json::to_string(share)?).map_err(Error::from)?;
        Ok(())
    }

    /// Insert `share`, regenerating its slug up to `MAX_SLUG_RETRIES` times
    /// if the one it carries already collides with a live slug.
    pub(crate) fn create(&mut self, mut share: Share) -> Result<Share> {
        let mut attempts = 0;
        while self.by_slug.contains_key(&share.slug) {
            attempts += 1;
            if attempts > MAX_SLUG_RETRIES {
                return Err(Error::conflict("exhausted slug retries"));
            }
            share.slug = generate_slug();
        }
        self.append(&share)?;
        self.by_slug.insert(share.slug.clone(), share.clone());
        Ok(share)
    }

    pub(crate) fn get_by_slug(&self, slug: &str) -> Result<Share> {
        self.by_slug
            .get(slug)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("share {slug} not found")))
    }

    pub(crate) fn increment_view(&mut self, slug: &str) -> Result<()> {
        let share = self
            .by_slug
            .get_mut(slug)
            .ok_or_else(|| Error::not_found(format!("share {slug} not found")))?;
        share.view_count += 1;
        let snapshot = share.clone();
        self.append(&snapshot)?;
        Ok(())
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    Ephemeral,
    Session,
    Permanent,
    TimeBased,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ArtifactBody {
    Inline(String),
    StoragePath(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub content_type: String,
    pub mime: String,
    pub title: String,
    pub body: ArtifactBody,
    pub version: u32,
    #[serde(default)]
    pub parent_artifact_id: Option<String>,
    pub is_latest: bool,
    pub retention: RetentionPolicy,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    pub fn first_version(
        content_type: impl Into<String>,
        mime: impl Into<String>,
        title: impl Into<String>,
        body: ArtifactBody,
        retention: RetentionPolicy,
    ) -> Self {
        Self {
            id: format!("artifact_{}", Uuid::new_v4().simple()),
            content_type: content_type.into(),
            mime: mime.into(),
            title: title.into(),
            body,
            version: 1,
            parent_artifact_id: None,
            is_latest: true,
            retention,
            expires_at: None,
            created_at: Utc::now(),
        }
    }

    /// Build the next version in this artifact's chain. The caller is
    /// responsible for atomically flipping `is_latest=false` on every
    /// prior version in the chain (the StoreGateway does this inside a
    /// single transaction/lock scope).
    pub fn next_version(&self, body: ArtifactBody) -> Self {
        Self {
            id: format!("artifact_{}", Uuid::new_v4().simple()),
            content_type: self.content_type.clone(),
            mime: self.mime.clone(),
            title: self.title.clone(),
            body,
            version: self.version + 1,
            parent_artifact_id: Some(self.id.clone()),
            is_latest: true,
            retention: self.retention,
            expires_at: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_version_links_to_parent_and_increments() {
        let v1 = Artifact::first_version(
            "slides",
            "application/pdf",
            "Q3 deck",
            ArtifactBody::StoragePath("s3://x".into()),
            RetentionPolicy::Permanent,
        );
        let v2 = v1.next_version(ArtifactBody::StoragePath("s3://y".into()));
        assert_eq!(v2.version, 2);
        assert_eq!(v2.parent_artifact_id.as_deref(), Some(v1.id.as_str()));
        assert!(v2.is_latest);
    }
}

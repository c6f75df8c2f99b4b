//! AuthBinding: resolves an inbound credential — bearer JWT or `sk_`
//! API key — to a caller identity (§4.9). Both shapes may be presented
//! concurrently; their subjects must then match exactly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use parking_lot::RwLock;
use ro_domain::config::AuthConfig;
use ro_domain::error::{Error, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// The resolved caller. `api_key_id` is set only when an API key
/// authenticated the request; `roles`/`groups`/`feature_flags` are
/// populated from JWT claims and are empty for API-key-only auth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub email: Option<String>,
    pub roles: Vec<String>,
    pub groups: Vec<String>,
    pub feature_flags: Vec<String>,
    pub api_key_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    groups: Vec<String>,
    #[serde(default)]
    feature_flags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    n: String,
    e: String,
}

#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<Jwk>,
}

/// One registered API key: the key material is never stored, only its
/// SHA-256 digest, compared in constant time.
#[derive(Debug, Clone)]
pub struct ApiKeyRecord {
    pub id: String,
    pub user_id: String,
    pub hash: Vec<u8>,
    pub issued_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

struct JwksCache {
    keys: HashMap<String, (String, String)>,
    fetched_at: Instant,
}

/// Resolves credentials for inbound requests. Holds the JWKS cache
/// (refreshed lazily at `refresh_jwks_interval_secs`) and the API key
/// table (populated by the caller — persistence of `api_keys` itself is
/// out of this crate's scope beyond the lookup contract).
pub struct AuthBinding {
    config: AuthConfig,
    client: reqwest::Client,
    jwks: RwLock<Option<JwksCache>>,
    api_keys: RwLock<HashMap<String, ApiKeyRecord>>,
}

impl AuthBinding {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            jwks: RwLock::new(None),
            api_keys: RwLock::new(HashMap::new()),
        }
    }

    pub fn register_api_key(&self, key_plaintext: &str, record: ApiKeyRecord) {
        let digest = Sha256::digest(key_plaintext.as_bytes()).to_vec();
        let mut record = record;
        record.hash = digest;
        self.api_keys.write().insert(record.id.clone(), record);
    }

    /// Mint a fresh `sk_`-prefixed key for `user_id` with the configured
    /// default TTL, used by guest-login and by refresh (§6 `/auth/*`).
    /// Returns the plaintext (shown to the caller once) and its record.
    /// Enforces `api_key_max_per_user`: once the cap is reached, the
    /// user's oldest live keys are revoked to make room for this one.
    pub fn issue_api_key(&self, user_id: &str) -> (String, ApiKeyRecord) {
        self.enforce_api_key_cap(user_id);

        use rand::Rng;
        let suffix: String = rand::thread_rng()
            .sample_iter(&rand::distributions::Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let plaintext = format!("{}_{}", self.config.api_key_prefix, suffix);
        let now = chrono::Utc::now();
        let record = ApiKeyRecord {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            hash: Vec::new(),
            issued_at: now,
            expires_at: now + chrono::Duration::seconds(self.config.api_key_default_ttl_secs as i64),
        };
        self.register_api_key(&plaintext, record.clone());
        (plaintext, record)
    }

    /// Revokes the user's oldest live keys until issuing one more would
    /// not exceed `api_key_max_per_user`. A cap of 0 disables enforcement.
    fn enforce_api_key_cap(&self, user_id: &str) {
        let cap = self.config.api_key_max_per_user as usize;
        if cap == 0 {
            return;
        }

        let mut keys = self.api_keys.write();
        let now = chrono::Utc::now();
        let mut live: Vec<(String, chrono::DateTime<chrono::Utc>)> = keys
            .values()
            .filter(|r| r.user_id == user_id && r.expires_at > now)
            .map(|r| (r.id.clone(), r.issued_at))
            .collect();
        if live.len() < cap {
            return;
        }

        live.sort_by_key(|(_, issued_at)| *issued_at);
        let to_revoke = live.len() + 1 - cap;
        for (id, _) in live.into_iter().take(to_revoke) {
            keys.remove(&id);
        }
    }

    /// Rotate an existing key: validates `old_key_plaintext`, revokes it,
    /// and issues a new one for the same user.
    pub fn refresh_api_key(&self, old_key_plaintext: &str) -> Result<(String, ApiKeyRecord)> {
        let principal = self.resolve_api_key(old_key_plaintext)?;
        if let Some(id) = &principal.api_key_id {
            self.api_keys.write().remove(id);
        }
        Ok(self.issue_api_key(&principal.user_id))
    }

    /// Validate a bearer value and an optional API key, per §4.9: if
    /// both are present their resolved subjects must match exactly.
    pub async fn resolve(&self, bearer: Option<&str>, api_key: Option<&str>) -> Result<Principal> {
        if !self.config.auth_enabled {
            return Ok(Principal {
                user_id: "anonymous".into(),
                email: None,
                roles: vec![],
                groups: vec![],
                feature_flags: vec![],
                api_key_id: None,
            });
        }

        let jwt_principal = match bearer {
            Some(token) => Some(self.resolve_jwt(token).await?),
            None => None,
        };
        let key_principal = match api_key {
            Some(key) => Some(self.resolve_api_key(key)?),
            None => None,
        };

        match (jwt_principal, key_principal) {
            (Some(jwt), Some(key)) if jwt.user_id == key.user_id => Ok(Principal { api_key_id: key.api_key_id, ..jwt }),
            (Some(_), Some(_)) => Err(Error::forbidden("credential subject mismatch")),
            (Some(jwt), None) => Ok(jwt),
            (None, Some(key)) => Ok(key),
            (None, None) => Err(Error::forbidden("no credential presented")),
        }
    }

    async fn resolve_jwt(&self, token: &str) -> Result<Principal> {
        let header = decode_header(token).map_err(|e| Error::forbidden(format!("malformed token: {e}")))?;
        let kid = header.kid.ok_or_else(|| Error::forbidden("token missing kid"))?;

        let (n, e) = self.decoding_components(&kid).await?;
        let key = DecodingKey::from_rsa_components(&n, &e).map_err(|e| Error::internal(format!("bad JWKS key: {e}")))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.config.audience]);
        validation.set_issuer(&[&self.config.issuer]);
        validation.leeway = self.config.auth_clock_skew_secs;

        let data = decode::<Claims>(token, &key, &validation).map_err(|e| Error::forbidden(format!("invalid token: {e}")))?;
        Ok(Principal {
            user_id: data.claims.sub,
            email: data.claims.email,
            roles: data.claims.roles,
            groups: data.claims.groups,
            feature_flags: data.claims.feature_flags,
            api_key_id: None,
        })
    }

    async fn decoding_components(&self, kid: &str) -> Result<(String, String)> {
        {
            let cache = self.jwks.read();
            if let Some(c) = cache.as_ref() {
                let ttl = Duration::from_secs(self.config.refresh_jwks_interval_secs);
                if c.fetched_at.elapsed() < ttl {
                    if let Some(entry) = c.keys.get(kid) {
                        return Ok(entry.clone());
                    }
                }
            }
        }

        let doc: JwksDocument = self
            .client
            .get(&self.config.jwks_url)
            .send()
            .await
            .map_err(|e| Error::external(format!("JWKS fetch failed: {e}")))?
            .json()
            .await
            .map_err(|e| Error::external(format!("malformed JWKS: {e}")))?;

        let keys: HashMap<String, (String, String)> =
            doc.keys.into_iter().map(|k| (k.kid, (k.n, k.e))).collect();
        let found = keys.get(kid).cloned();
        *self.jwks.write() = Some(JwksCache { keys, fetched_at: Instant::now() });

        found.ok_or_else(|| Error::forbidden("unknown signing key"))
    }

    fn resolve_api_key(&self, key_plaintext: &str) -> Result<Principal> {
        if !key_plaintext.starts_with(&self.config.api_key_prefix) {
            return Err(Error::forbidden("malformed API key"));
        }
        let digest = Sha256::digest(key_plaintext.as_bytes());
        let keys = self.api_keys.read();
        let record = keys
            .values()
            .find(|r| bool::from(r.hash.as_slice().ct_eq(digest.as_slice())))
            .ok_or_else(|| Error::forbidden("unknown API key"))?;

        if record.expires_at < chrono::Utc::now() {
            return Err(Error::expired("API key has expired"));
        }

        Ok(Principal {
            user_id: record.user_id.clone(),
            email: None,
            roles: vec![],
            groups: vec![],
            feature_flags: vec![],
            api_key_id: Some(record.id.clone()),
        })
    }
}

pub type SharedAuthBinding = Arc<AuthBinding>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn auth_disabled_resolves_to_anonymous() {
        let binding = AuthBinding::new(AuthConfig { auth_enabled: false, ..Default::default() });
        let principal = binding.resolve(None, None).await.unwrap();
        assert_eq!(principal.user_id, "anonymous");
    }

    #[tokio::test]
    async fn no_credential_is_forbidden_when_auth_enabled() {
        let binding = AuthBinding::new(AuthConfig::default());
        let err = binding.resolve(None, None).await.unwrap_err();
        assert_eq!(err.kind.as_str(), "forbidden");
    }

    #[tokio::test]
    async fn expired_api_key_is_rejected() {
        let binding = AuthBinding::new(AuthConfig::default());
        binding.register_api_key(
            "sk_live_test",
            ApiKeyRecord {
                id: "key_1".into(),
                user_id: "u1".into(),
                hash: vec![],
                issued_at: chrono::Utc::now(),
                expires_at: chrono::Utc::now() - chrono::Duration::seconds(1),
            },
        );
        let err = binding.resolve(None, Some("sk_live_test")).await.unwrap_err();
        assert_eq!(err.kind.as_str(), "expired");
    }

    #[tokio::test]
    async fn valid_api_key_resolves_its_user() {
        let binding = AuthBinding::new(AuthConfig::default());
        binding.register_api_key(
            "sk_live_test",
            ApiKeyRecord {
                id: "key_1".into(),
                user_id: "u1".into(),
                hash: vec![],
                issued_at: chrono::Utc::now(),
                expires_at: chrono::Utc::now() + chrono::Duration::seconds(3600),
            },
        );
        let principal = binding.resolve(None, Some("sk_live_test")).await.unwrap();
        assert_eq!(principal.user_id, "u1");
        assert_eq!(principal.api_key_id, Some("key_1".into()));
    }

    #[tokio::test]
    async fn malformed_api_key_without_prefix_is_rejected() {
        let binding = AuthBinding::new(AuthConfig::default());
        let err = binding.resolve(None, Some("not-a-key")).await.unwrap_err();
        assert_eq!(err.kind.as_str(), "forbidden");
    }

    #[tokio::test]
    async fn issued_key_resolves_back_to_its_user() {
        let binding = AuthBinding::new(AuthConfig::default());
        let (plaintext, record) = binding.issue_api_key("guest_1");
        let principal = binding.resolve(None, Some(&plaintext)).await.unwrap();
        assert_eq!(principal.user_id, "guest_1");
        assert_eq!(principal.api_key_id, Some(record.id));
    }

    #[tokio::test]
    async fn refresh_revokes_the_old_key_and_issues_a_new_one() {
        let binding = AuthBinding::new(AuthConfig::default());
        let (old_plaintext, _) = binding.issue_api_key("guest_1");
        let (new_plaintext, _) = binding.refresh_api_key(&old_plaintext).unwrap();

        assert!(binding.resolve(None, Some(&old_plaintext)).await.is_err());
        let principal = binding.resolve(None, Some(&new_plaintext)).await.unwrap();
        assert_eq!(principal.user_id, "guest_1");
    }

    #[tokio::test]
    async fn issuing_past_the_per_user_cap_revokes_the_oldest_key() {
        let binding = AuthBinding::new(AuthConfig { api_key_max_per_user: 2, ..Default::default() });
        let (first, _) = binding.issue_api_key("guest_1");
        let (second, _) = binding.issue_api_key("guest_1");
        let (third, _) = binding.issue_api_key("guest_1");

        assert!(binding.resolve(None, Some(&first)).await.is_err(), "oldest key must be revoked once the cap is exceeded");
        assert!(binding.resolve(None, Some(&second)).await.is_ok());
        assert!(binding.resolve(None, Some(&third)).await.is_ok());
    }

    #[tokio::test]
    async fn cap_is_tracked_per_user() {
        let binding = AuthBinding::new(AuthConfig { api_key_max_per_user: 1, ..Default::default() });
        let (guest_1_key, _) = binding.issue_api_key("guest_1");
        let (guest_2_key, _) = binding.issue_api_key("guest_2");

        assert!(binding.resolve(None, Some(&guest_1_key)).await.is_ok());
        assert!(binding.resolve(None, Some(&guest_2_key)).await.is_ok());
    }
}

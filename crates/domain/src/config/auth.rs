use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AuthBinding
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "d_true")]
    pub auth_enabled: bool,
    #[serde(default)]
    pub issuer: String,
    #[serde(default)]
    pub audience: String,
    #[serde(default)]
    pub jwks_url: String,
    #[serde(default = "d_refresh_jwks")]
    pub refresh_jwks_interval_secs: u64,
    #[serde(default = "d_clock_skew")]
    pub auth_clock_skew_secs: u64,
    #[serde(default = "d_api_key_prefix")]
    pub api_key_prefix: String,
    #[serde(default = "d_api_key_ttl")]
    pub api_key_default_ttl_secs: u64,
    #[serde(default = "d_api_key_max")]
    pub api_key_max_per_user: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            auth_enabled: d_true(),
            issuer: String::new(),
            audience: String::new(),
            jwks_url: String::new(),
            refresh_jwks_interval_secs: d_refresh_jwks(),
            auth_clock_skew_secs: d_clock_skew(),
            api_key_prefix: d_api_key_prefix(),
            api_key_default_ttl_secs: d_api_key_ttl(),
            api_key_max_per_user: d_api_key_max(),
        }
    }
}

fn d_true() -> bool {
    true
}
fn d_refresh_jwks() -> u64 {
    300
}
fn d_clock_skew() -> u64 {
    60
}
fn d_api_key_prefix() -> String {
    "sk_live".into()
}
fn d_api_key_ttl() -> u64 {
    90 * 24 * 3600
}
fn d_api_key_max() -> u32 {
    5
}

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Database — a contract-only surface (§1: the driver is an external
// collaborator). Carried here so config precedence/provenance behaves
// identically whether or not a live driver is wired in.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "d_url")]
    pub database_url: String,
    #[serde(default = "d_max_idle")]
    pub max_idle_conns: u32,
    #[serde(default = "d_max_open")]
    pub max_open_conns: u32,
    #[serde(default = "d_conn_lifetime")]
    pub conn_max_lifetime_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: d_url(),
            max_idle_conns: d_max_idle(),
            max_open_conns: d_max_open(),
            conn_max_lifetime_secs: d_conn_lifetime(),
        }
    }
}

fn d_url() -> String {
    "memory://responses".into()
}
fn d_max_idle() -> u32 {
    4
}
fn d_max_open() -> u32 {
    16
}
fn d_conn_lifetime() -> u64 {
    1800
}

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// WebhookDispatcher
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default = "d_timeout")]
    pub webhook_timeout_secs: u64,
    #[serde(default = "d_max_retries")]
    pub webhook_max_retries: u32,
    /// Fixed (not exponential) delay between retry attempts.
    #[serde(default = "d_retry_delay")]
    pub webhook_retry_delay_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            webhook_timeout_secs: d_timeout(),
            webhook_max_retries: d_max_retries(),
            webhook_retry_delay_secs: d_retry_delay(),
        }
    }
}

fn d_timeout() -> u64 {
    10
}
fn d_max_retries() -> u32 {
    3
}
fn d_retry_delay() -> u64 {
    2
}

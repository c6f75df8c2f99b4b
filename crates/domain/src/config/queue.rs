use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Background queue (QueueWorker)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "d_worker_count")]
    pub background_worker_count: u32,
    #[serde(default = "d_task_timeout")]
    pub background_task_timeout_secs: u64,
    #[serde(default = "d_poll_interval")]
    pub background_poll_interval_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            background_worker_count: d_worker_count(),
            background_task_timeout_secs: d_task_timeout(),
            background_poll_interval_secs: d_poll_interval(),
        }
    }
}

fn d_worker_count() -> u32 {
    4
}
fn d_task_timeout() -> u64 {
    600
}
fn d_poll_interval() -> u64 {
    2
}

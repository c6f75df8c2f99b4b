use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Provider + tool-loop (Orchestrator)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "d_llm_base_url")]
    pub llm_base_url: String,
    #[serde(default = "d_max_tool_depth")]
    pub max_tool_depth: u32,
    #[serde(default = "d_tool_timeout")]
    pub tool_timeout_secs: u64,
    #[serde(default = "d_default_timeout")]
    pub default_timeout_secs: u64,
    #[serde(default = "d_max_provider_retries")]
    pub max_provider_retries: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            llm_base_url: d_llm_base_url(),
            max_tool_depth: d_max_tool_depth(),
            tool_timeout_secs: d_tool_timeout(),
            default_timeout_secs: d_default_timeout(),
            max_provider_retries: d_max_provider_retries(),
        }
    }
}

fn d_llm_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn d_max_tool_depth() -> u32 {
    8
}
fn d_tool_timeout() -> u64 {
    45
}
fn d_default_timeout() -> u64 {
    120
}
fn d_max_provider_retries() -> u32 {
    3
}

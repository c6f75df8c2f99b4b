use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ContextBudgeter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextBudgetConfig {
    /// Fraction of the resolved context length the budgeter trims down
    /// to. Do not lower without recalibrating the token estimator (§9).
    #[serde(default = "d_safety_margin")]
    pub context_safety_margin_ratio: f64,
    /// Characters-per-token assumed by the estimator.
    #[serde(default = "d_token_ratio")]
    pub token_estimate_ratio: f64,
    #[serde(default = "d_default_context_length")]
    pub default_context_length: u32,
}

impl Default for ContextBudgetConfig {
    fn default() -> Self {
        Self {
            context_safety_margin_ratio: d_safety_margin(),
            token_estimate_ratio: d_token_ratio(),
            default_context_length: d_default_context_length(),
        }
    }
}

fn d_safety_margin() -> f64 {
    0.80
}
fn d_token_ratio() -> f64 {
    4.0
}
fn d_default_context_length() -> u32 {
    128_000
}

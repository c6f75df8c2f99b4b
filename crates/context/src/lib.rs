//! ContextBudgeter: a pure function that trims a provider-shaped message
//! list to fit a token budget.
//!
//! Whole-message removal oldest-first rather than within-message
//! head/tail trimming, since that is what the orchestration core needs
//! (provider context windows, not tool-result bloat).

use ro_domain::config::ContextBudgetConfig;
use ro_domain::model::ItemRole;
use ro_providers::{ChatMessage, ToolCallRequest};

/// Result of a trim pass.
#[derive(Debug, Clone)]
pub struct BudgetResult {
    pub messages: Vec<ChatMessage>,
    pub trimmed_count: usize,
    pub estimated_tokens: usize,
}

/// Estimate the token cost of one message: `ceil(chars / 4) + 10`.
fn message_tokens(msg: &ChatMessage, ratio: f64) -> usize {
    let chars: usize = msg.content.iter().map(|c| c.char_count()).sum();
    ((chars as f64) / ratio).ceil() as usize + 10
}

fn tool_call_tokens(tool_calls: &[ToolCallRequest], ratio: f64) -> usize {
    tool_calls
        .iter()
        .map(|tc| {
            let chars = tc.arguments.to_string().chars().count();
            ((chars as f64) / ratio).ceil() as usize
        })
        .sum()
}

fn estimate_tokens(messages: &[ChatMessage], tool_calls: &[ToolCallRequest], ratio: f64) -> usize {
    let per_message: usize = messages.iter().map(|m| message_tokens(m, ratio)).sum();
    per_message + 20 + tool_call_tokens(tool_calls, ratio)
}

fn is_system(msg: &ChatMessage) -> bool {
    matches!(msg.role, Some(ItemRole::System))
}

/// Trim `messages` to fit `target_context_length` tokens, per §4.3:
/// index 0, every system-role message, and the newest message are
/// preserved unconditionally; the oldest remaining removable message is
/// removed repeatedly until the estimate is within
/// `ContextBudgetConfig::context_safety_margin_ratio` of the target, or
/// only the protected minimum remains.
pub fn budget(
    messages: Vec<ChatMessage>,
    tool_calls: &[ToolCallRequest],
    target_context_length: usize,
    config: &ContextBudgetConfig,
) -> BudgetResult {
    let mut kept = messages;
    let original_len = kept.len();
    let budget_tokens = (target_context_length as f64 * config.context_safety_margin_ratio) as usize;

    loop {
        let estimated = estimate_tokens(&kept, tool_calls, config.token_estimate_ratio);
        if estimated <= budget_tokens {
            return BudgetResult {
                trimmed_count: original_len - kept.len(),
                messages: kept,
                estimated_tokens: estimated,
            };
        }

        let last = kept.len().saturating_sub(1);
        let removable = kept
            .iter()
            .enumerate()
            .skip(1)
            .find(|(i, m)| *i != last && !is_system(m))
            .map(|(i, _)| i);

        match removable {
            Some(idx) => {
                kept.remove(idx);
            }
            None => {
                let estimated = estimate_tokens(&kept, tool_calls, config.token_estimate_ratio);
                return BudgetResult {
                    trimmed_count: original_len - kept.len(),
                    messages: kept,
                    estimated_tokens: estimated,
                };
            }
        }
    }
}

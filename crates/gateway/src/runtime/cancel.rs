//! Cooperative cancellation tokens, one per in-flight Response.
//!
//! A running Orchestrator checks its token at provider/tool boundaries
//! (§5: "Cancellation... Orchestrator observes cancellation only at its
//! next provider/tool boundary"). `CancelMap` is how `POST
//! /v1/responses/{id}/cancel` reaches a worker that may be running on a
//! different task.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks active cancellation tokens keyed by response id.
#[derive(Default)]
pub struct CancelMap {
    tokens: Mutex<HashMap<String, CancelToken>>,
}

impl CancelMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, response_id: &str) -> CancelToken {
        let token = CancelToken::new();
        self.tokens.lock().insert(response_id.to_owned(), token.clone());
        token
    }

    /// Returns true if a running orchestrator was found and signalled.
    /// A `false` result means the response is not currently in flight
    /// (queued, or already terminal) — the caller falls back to a
    /// direct store transition in that case.
    pub fn cancel(&self, response_id: &str) -> bool {
        match self.tokens.lock().get(response_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, response_id: &str) {
        self.tokens.lock().remove(response_id);
    }

    pub fn is_running(&self, response_id: &str) -> bool {
        self.tokens.lock().contains_key(response_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_lifecycle() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_map_register_and_cancel() {
        let map = CancelMap::new();
        let token = map.register("resp_1");
        assert!(map.is_running("resp_1"));
        assert!(map.cancel("resp_1"));
        assert!(token.is_cancelled());
        map.remove("resp_1");
        assert!(!map.is_running("resp_1"));
    }

    #[test]
    fn cancel_of_unregistered_response_returns_false() {
        let map = CancelMap::new();
        assert!(!map.cancel("resp_ghost"));
    }

    #[test]
    fn remove_is_idempotent() {
        let map = CancelMap::new();
        map.register("r1");
        map.remove("r1");
        map.remove("r1");
        assert!(!map.is_running("r1"));
    }
}

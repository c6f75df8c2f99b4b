//! Orchestration runtime: the bounded tool-call loop over an LLM
//! provider, its background worker pool, cancellation, tool dispatch,
//! and the SSE/webhook delivery of its events.

pub mod cancel;
pub mod orchestrator;
pub mod queue;
pub mod streamer;
pub mod tools;
pub mod webhook;

pub use cancel::{CancelMap, CancelToken};
pub use orchestrator::{EventSender, Orchestrator, OrchestratorEvent};
pub use queue::{spawn_workers, QueueWaker};
pub use tools::{HttpToolRegistry, ToolCallResult, ToolRegistry};
pub use webhook::WebhookDispatcher;

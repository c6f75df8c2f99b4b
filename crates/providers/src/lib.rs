//! ProviderClient: a typed chat-completion contract plus one concrete
//! HTTP adapter. The LLM endpoint itself is an external collaborator
//! (§1) — normalising its wire shape at this boundary is the whole job.

mod http;
mod sse;
mod traits;
mod util;

pub use http::HttpProviderClient;
pub use traits::{ChatMessage, ChatRequest, ChatResponse, LlmProvider, StreamEvent, ToolCallRequest};

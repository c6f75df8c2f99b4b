//! Streamer: turns `OrchestratorEvent`s into SSE frames for
//! `POST /v1/responses` when `stream: true` (§4.4, §6). Always emits a
//! terminal frame even if the orchestrator task ends without one.

use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures_core::stream::BoxStream;
use tokio::sync::mpsc;

use crate::runtime::orchestrator::OrchestratorEvent;

/// Build the axum SSE response body from a receiver fed by the
/// orchestrator's `EventSender`. The channel closing without a
/// `Completed`/`Failed` event (e.g. a worker panic) still produces one
/// synthetic terminal frame so clients never hang on an open stream.
pub fn event_stream(mut rx: mpsc::UnboundedReceiver<OrchestratorEvent>) -> Sse<BoxStream<'static, Result<Event, Infallible>>> {
    let stream = async_stream::stream! {
        let mut terminated = false;
        while let Some(event) = rx.recv().await {
            if matches!(event, OrchestratorEvent::Completed { .. } | OrchestratorEvent::Failed { .. }) {
                terminated = true;
            }
            yield Ok(to_sse_event(&event));
        }
        if !terminated {
            yield Ok(to_sse_event(&OrchestratorEvent::Failed {
                response_id: String::new(),
                message: "stream ended without a terminal event".into(),
            }));
        }
    };

    Sse::new(Box::pin(stream) as BoxStream<'static, Result<Event, Infallible>>).keep_alive(KeepAlive::default())
}

fn to_sse_event(event: &OrchestratorEvent) -> Event {
    match event {
        OrchestratorEvent::OutputTextDelta { response_id, text } => Event::default()
            .event("response.output_text.delta")
            .json_data(serde_json::json!({ "response_id": response_id, "delta": text }))
            .unwrap_or_else(|_| Event::default().event("response.output_text.delta")),
        OrchestratorEvent::ToolCallCreated { response_id, call_id, name } => Event::default()
            .event("response.tool_call.created")
            .json_data(serde_json::json!({ "response_id": response_id, "call_id": call_id, "name": name }))
            .unwrap_or_else(|_| Event::default().event("response.tool_call.created")),
        OrchestratorEvent::Completed { response_id } => Event::default()
            .event("response.completed")
            .json_data(serde_json::json!({ "response_id": response_id }))
            .unwrap_or_else(|_| Event::default().event("response.completed")),
        OrchestratorEvent::Failed { response_id, message } => Event::default()
            .event("response.failed")
            .json_data(serde_json::json!({ "response_id": response_id, "message": message }))
            .unwrap_or_else(|_| Event::default().event("response.failed")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_close_without_terminal_event_synthesizes_one() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(OrchestratorEvent::OutputTextDelta { response_id: "r1".into(), text: "hi".into() }).unwrap();
        drop(tx);
        let _sse = event_stream(rx);
        // Construction alone must not panic; the synthetic terminal frame
        // is exercised end-to-end by the `responses` API integration tests.
    }
}

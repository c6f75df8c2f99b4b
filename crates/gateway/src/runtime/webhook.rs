//! WebhookDispatcher: POSTs terminal event payloads with bounded,
//! fixed-delay retry (§4.5). A delivery failure is logged and dropped —
//! it never alters the Response's terminal status.

use std::time::Duration;

use ro_domain::config::WebhookConfig;
use ro_domain::model::{Response, ResponseStatus};
use serde_json::json;

pub struct WebhookDispatcher {
    client: reqwest::Client,
    config: WebhookConfig,
}

impl WebhookDispatcher {
    pub fn new(config: WebhookConfig) -> Self {
        Self { client: reqwest::Client::new(), config }
    }

    /// Fire-and-forget: if `response` is terminal and carries a
    /// `webhook_url` metadata field, spawn the delivery so the caller
    /// (the queue worker) never blocks on it.
    pub fn dispatch_if_terminal(&self, response: &Response) {
        if !response.status.is_terminal() {
            return;
        }
        let Some(url) = response.params.webhook_url().map(str::to_owned) else {
            return;
        };
        let body = build_payload(response);
        let client = self.client.clone();
        let timeout = Duration::from_secs(self.config.webhook_timeout_secs);
        let retry_delay = Duration::from_secs(self.config.webhook_retry_delay_secs);
        let max_retries = self.config.webhook_max_retries;
        let event = event_name(response.status);
        let response_id = response.id.clone();

        tokio::spawn(async move {
            deliver(client, url, body, event, response_id, timeout, retry_delay, max_retries).await;
        });
    }
}

fn event_name(status: ResponseStatus) -> &'static str {
    match status {
        ResponseStatus::Completed => "response.completed",
        ResponseStatus::Failed => "response.failed",
        ResponseStatus::Cancelled => "response.cancelled",
        _ => "response.completed",
    }
}

fn build_payload(response: &Response) -> serde_json::Value {
    json!({
        "id": response.id,
        "event": event_name(response.status),
        "status": response.status,
        "output": response.output,
        "error": response.error,
        "metadata": response.params.metadata,
        "completed_at": response.completed_at,
    })
}

async fn deliver(
    client: reqwest::Client,
    url: String,
    body: serde_json::Value,
    event: &'static str,
    response_id: String,
    timeout: Duration,
    retry_delay: Duration,
    max_retries: u32,
) {
    for attempt in 0..=max_retries {
        let send = client
            .post(&url)
            .header("content-type", "application/json")
            .header("user-agent", "jan-response-api/1.0")
            .header("x-jan-event", event)
            .header("x-jan-response-id", &response_id)
            .json(&body)
            .send();

        match tokio::time::timeout(timeout, send).await {
            Ok(Ok(resp)) if resp.status().is_success() => return,
            Ok(Ok(resp)) => {
                tracing::warn!(response_id = %response_id, status = %resp.status(), attempt, "webhook delivery rejected");
            }
            Ok(Err(e)) => {
                tracing::warn!(response_id = %response_id, error = %e, attempt, "webhook delivery failed");
            }
            Err(_) => {
                tracing::warn!(response_id = %response_id, attempt, "webhook delivery timed out");
            }
        }
        if attempt < max_retries {
            tokio::time::sleep(retry_delay).await;
        }
    }
    tracing::error!(response_id = %response_id, "webhook delivery exhausted retries, dropping");
}

#[cfg(test)]
mod tests {
    use super::*;
    use ro_domain::model::GenerationParams;

    fn completed_response(webhook_url: Option<&str>) -> Response {
        let mut params = GenerationParams { store: true, background: true, ..Default::default() };
        if let Some(url) = webhook_url {
            params.metadata.insert("webhook_url".into(), url.into());
        }
        let mut r = Response::new("u1", "gpt-4", serde_json::json!("hi"), params);
        r.transition(ResponseStatus::Completed);
        r
    }

    #[test]
    fn event_name_matches_terminal_status() {
        assert_eq!(event_name(ResponseStatus::Completed), "response.completed");
        assert_eq!(event_name(ResponseStatus::Failed), "response.failed");
    }

    #[test]
    fn payload_carries_id_event_and_status() {
        let r = completed_response(Some("https://hook.example/cb"));
        let body = build_payload(&r);
        assert_eq!(body["id"], r.id);
        assert_eq!(body["event"], "response.completed");
    }

    #[tokio::test]
    async fn no_dispatch_without_webhook_url() {
        let dispatcher = WebhookDispatcher::new(WebhookConfig::default());
        let r = completed_response(None);
        // Should not panic and should simply no-op (no spawned task to observe).
        dispatcher.dispatch_if_terminal(&r);
    }

    #[tokio::test]
    async fn no_dispatch_for_non_terminal_response() {
        let dispatcher = WebhookDispatcher::new(WebhookConfig::default());
        let r = Response::new("u1", "gpt-4", serde_json::json!("hi"), GenerationParams::default());
        dispatcher.dispatch_if_terminal(&r);
    }
}

//! QueueWorker: a fixed pool of N workers claiming queued Responses and
//! running them through the Orchestrator (§4.2).

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use ro_domain::error::{Error, ErrorKind};
use ro_domain::model::{Response, ResponseError, ResponseStatus};
use tokio::sync::watch;
use tokio::sync::Notify;

use crate::runtime::cancel::CancelMap;
use crate::runtime::orchestrator::Orchestrator;
use crate::state::AppState;

/// Wakes idle workers early when a background Response is enqueued,
/// instead of waiting out the full poll interval.
#[derive(Default)]
pub struct QueueWaker(Notify);

impl QueueWaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wake_one(&self) {
        self.0.notify_one();
    }

    async fn wait(&self, timeout: Duration) {
        let _ = tokio::time::timeout(timeout, self.0.notified()).await;
    }
}

/// Spawn `background_worker_count` worker loops. Each holds its own
/// clone of the shared state; the returned handles are background
/// tasks the caller does not need to await.
pub fn spawn_workers(state: Arc<AppState>, shutdown: watch::Receiver<bool>) -> Vec<tokio::task::JoinHandle<()>> {
    let worker_count = state.config.queue.background_worker_count;
    (0..worker_count)
        .map(|id| {
            let state = state.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { worker_loop(id, state, shutdown).await })
        })
        .collect()
}

async fn worker_loop(id: u32, state: Arc<AppState>, mut shutdown: watch::Receiver<bool>) {
    let poll_interval = Duration::from_secs(state.config.queue.background_poll_interval_secs);
    tracing::info!(worker_id = id, "queue worker started");
    loop {
        if *shutdown.borrow() {
            tracing::info!(worker_id = id, "queue worker shutting down");
            return;
        }
        tokio::select! {
            _ = shutdown.changed() => {
                tracing::info!(worker_id = id, "queue worker shutting down");
                return;
            }
            claimed = claim_and_run(&state) => {
                if !claimed {
                    state.queue_waker.wait(poll_interval).await;
                }
            }
        }
    }
}

/// Attempt one claim; if successful, run it to completion and hand off
/// to the webhook dispatcher. Returns whether a Response was claimed
/// (used only to decide whether to skip the poll sleep).
async fn claim_and_run(state: &Arc<AppState>) -> bool {
    let claimed = match state.store.claim_next_queued() {
        Ok(Some(r)) => r,
        Ok(None) => return false,
        Err(e) => {
            tracing::error!(error = %e, "queue claim failed");
            return false;
        }
    };

    run_claimed(state.clone(), claimed).await;
    true
}

async fn run_claimed(state: Arc<AppState>, response: Response) {
    let response_id = response.id.clone();
    let conversation = match &response.conversation_id {
        Some(id) => match state.store.get_conversation(id) {
            Ok(c) => Some(c),
            Err(e) => {
                tracing::error!(response_id = %response_id, error = %e, "failed to load conversation for queued response");
                None
            }
        },
        None => None,
    };

    let cancel_map: Arc<CancelMap> = state.cancel_map.clone();
    let cancel_token = cancel_map.register(&response_id);
    let deadline = Duration::from_secs(state.config.queue.background_task_timeout_secs);

    let orchestrator = Orchestrator::new(
        state.store.clone(),
        state.provider.clone(),
        state.tools.clone(),
        state.config.clone(),
    );

    let run_future = AssertUnwindSafe(orchestrator.run(response.clone(), conversation, cancel_token.clone(), None)).catch_unwind();

    let outcome = tokio::time::timeout(deadline, run_future).await;
    cancel_map.remove(&response_id);

    let finished = match outcome {
        Ok(Ok(Ok(r))) => r,
        Ok(Ok(Err(e))) => {
            tracing::error!(response_id = %response_id, error = %e, "orchestrator run failed");
            mark_worker_failure(&state, &response_id, &e.to_string())
        }
        Ok(Err(_panic)) => {
            tracing::error!(response_id = %response_id, "orchestrator panicked");
            mark_worker_failure(&state, &response_id, "worker panicked mid-run")
        }
        Err(_timeout) => {
            tracing::warn!(response_id = %response_id, "background task timed out");
            mark_timeout(&state, &response_id)
        }
    };

    state.webhooks.dispatch_if_terminal(&finished);
}

fn mark_worker_failure(state: &AppState, response_id: &str, message: &str) -> Response {
    let err = Error::new(ErrorKind::Internal, message.to_string());
    let _ = state.store.transition_response(
        response_id,
        &[ResponseStatus::InProgress, ResponseStatus::Queued],
        ResponseStatus::Failed,
    );
    match state.store.get_response(response_id) {
        Ok(mut r) => {
            r.error = Some(ResponseError {
                kind: "internal".into(),
                message: "worker-crashed".into(),
                code: err.code.to_string(),
            });
            let _ = state.store.save_response(r.clone());
            r
        }
        Err(_) => Response::new("unknown", "unknown", serde_json::Value::Null, Default::default()),
    }
}

fn mark_timeout(state: &AppState, response_id: &str) -> Response {
    let _ = state.store.transition_response(
        response_id,
        &[ResponseStatus::InProgress, ResponseStatus::Queued],
        ResponseStatus::Failed,
    );
    match state.store.get_response(response_id) {
        Ok(mut r) => {
            r.error = Some(ResponseError {
                kind: "internal".into(),
                message: "background-task-timeout".into(),
                code: uuid::Uuid::new_v4().to_string(),
            });
            let _ = state.store.save_response(r.clone());
            r
        }
        Err(_) => Response::new("unknown", "unknown", serde_json::Value::Null, Default::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn waker_wait_returns_promptly_when_notified() {
        let waker = Arc::new(QueueWaker::new());
        let w2 = waker.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            w2.wake_one();
        });
        let started = tokio::time::Instant::now();
        waker.wait(Duration::from_secs(5)).await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn waker_wait_times_out_without_notification() {
        let waker = QueueWaker::new();
        let started = tokio::time::Instant::now();
        waker.wait(Duration::from_millis(20)).await;
        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}

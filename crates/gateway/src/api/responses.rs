//! Ingress for the create/get/cancel Response endpoints (§4.8, §6).

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response as AxumResponse};
use axum::Extension;
use axum::Json;
use ro_domain::error::Error;
use ro_domain::model::{Conversation, GenerationParams, Response, ResponseStatus};
use serde::Deserialize;
use serde_json::Value;

use crate::auth::Principal;
use crate::conversation::ConversationService;
use crate::errors::ApiResult;
use crate::runtime::streamer::event_stream;
use crate::runtime::Orchestrator;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateResponseRequest {
    pub model: String,
    pub input: Value,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub background: bool,
    #[serde(default)]
    pub store: bool,
    #[serde(default)]
    pub conversation: Option<String>,
    #[serde(default)]
    pub previous_response_id: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    #[serde(default)]
    pub stop: Vec<String>,
    #[serde(default)]
    pub tools: Vec<ro_domain::model::ToolDefinition>,
    #[serde(default)]
    pub tool_choice: Option<String>,
    #[serde(default)]
    pub metadata: std::collections::HashMap<String, String>,
}

/// §4.8 validation: `model != ""`, `input != null`, `background=true ⇒ store=true`.
fn validate(req: &CreateResponseRequest) -> ApiResult<()> {
    if req.model.is_empty() {
        return Err(Error::validation("model must not be empty").into());
    }
    if req.input.is_null() {
        return Err(Error::validation("input must not be null").into());
    }
    if req.background && !req.store {
        return Err(Error::validation("background responses must set store=true").into());
    }
    Ok(())
}

pub async fn create(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateResponseRequest>,
) -> ApiResult<AxumResponse> {
    validate(&req)?;

    let params = GenerationParams {
        temperature: req.temperature,
        top_p: req.top_p,
        max_output_tokens: req.max_output_tokens,
        stop: req.stop,
        tools: req.tools,
        tool_choice: req.tool_choice,
        response_format: None,
        metadata: req.metadata,
        store: req.store,
        background: req.background,
    };

    let mut response = Response::new(principal.user_id.clone(), req.model, req.input, params);
    response.previous_response_id = req.previous_response_id;

    let conv_service = ConversationService::new(state.store.clone());
    let conversation = match &req.conversation {
        Some(id) => Some(conv_service.get(id)?),
        None if response.params.store => Some(conv_service.create(&principal.user_id, "", "")?),
        None => None,
    };
    response.conversation_id = conversation.as_ref().map(|c| c.id.clone());

    let response = state.store.create_response(response)?;

    if response.params.background {
        state.queue_waker.wake_one();
        return Ok((axum::http::StatusCode::CREATED, Json(response)).into_response());
    }

    let cancel = state.cancel_map.register(&response.id);
    let orchestrator = Orchestrator::new(state.store.clone(), state.provider.clone(), state.tools.clone(), state.config.clone());

    if req.stream {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tokio::spawn(run_and_release(state.clone(), orchestrator, response, conversation, cancel, Some(tx)));
        return Ok(event_stream(rx).into_response());
    }

    let response_id = response.id.clone();
    let finished = orchestrator
        .run(response, conversation, cancel.clone(), None)
        .await
        .map_err(|e| e.with_response_id(&response_id))?;
    state.cancel_map.remove(&finished.id);
    state.webhooks.dispatch_if_terminal(&finished);
    Ok(Json(finished).into_response())
}

async fn run_and_release(
    state: AppState,
    orchestrator: Orchestrator,
    response: Response,
    conversation: Option<Conversation>,
    cancel: crate::runtime::CancelToken,
    events: Option<crate::runtime::EventSender>,
) {
    let id = response.id.clone();
    match orchestrator.run(response, conversation, cancel, events).await {
        Ok(finished) => state.webhooks.dispatch_if_terminal(&finished),
        Err(e) => tracing::error!(response_id = %id, error = %e, "streamed orchestrator run failed"),
    }
    state.cancel_map.remove(&id);
}

pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Response>> {
    let response = state.store.get_response(&id).map_err(|e| e.with_response_id(&id))?;
    Ok(Json(response))
}

pub async fn cancel(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Response>> {
    if !state.cancel_map.cancel(&id) {
        let transitioned = state
            .store
            .transition_response(&id, &[ResponseStatus::Queued], ResponseStatus::Cancelled)
            .map_err(|e| e.with_response_id(&id))?;
        if let Some(r) = transitioned {
            return Ok(Json(r));
        }
    }
    let response = state.store.get_response(&id).map_err(|e| e.with_response_id(&id))?;
    Ok(Json(response))
}

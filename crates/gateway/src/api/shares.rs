//! Public share create/read endpoints (§6). Share creation snapshots a
//! conversation's items, stripping anything share-sensitive and
//! retrying slug generation on collision (§8).

use axum::extract::{Path, State};
use axum::Extension;
use axum::Json;
use ro_domain::error::Error;
use ro_domain::model::{generate_slug, Share, MAX_SLUG_RETRIES, TEMPORARY_CHAT_ID};
use serde::Deserialize;

use crate::auth::Principal;
use crate::conversation::ConversationService;
use crate::errors::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateShareRequest {
    pub conversation_id: String,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(_principal): Extension<Principal>,
    Json(req): Json<CreateShareRequest>,
) -> ApiResult<Json<Share>> {
    let conv_service = ConversationService::new(state.store.clone());
    let conversation = conv_service.get(&req.conversation_id)?;
    if conversation.private || conversation.id == TEMPORARY_CHAT_ID {
        return Err(Error::forbidden("private or temporary conversations cannot be shared").into());
    }
    let items = conv_service.load_active_branch(&conversation)?;

    let snapshot = Share::build_snapshot(&conversation.id, &items)
        .ok_or_else(|| Error::validation("conversation has too few shareable items or the snapshot is too large"))?;

    for _ in 0..MAX_SLUG_RETRIES {
        let slug = generate_slug();
        let share = Share::new(&conversation.id, slug, snapshot.clone());
        match state.store.create_share(share) {
            Ok(share) => return Ok(Json(share)),
            Err(e) if e.kind.as_str() == "conflict" => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(Error::conflict("exhausted slug retries").into())
}

pub async fn get(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult<Json<Share>> {
    let share = state.store.get_share_by_slug(&slug)?;
    let store = state.store.clone();
    let slug_for_count = slug.clone();
    tokio::spawn(async move {
        if let Err(e) = store.increment_share_view(&slug_for_count) {
            tracing::warn!(slug = %slug_for_count, error = %e, "failed to record share view");
        }
    });
    Ok(Json(share))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use ro_domain::config::Config;
    use ro_providers::HttpProviderClient;
    use ro_store::MemoryStoreGateway;

    use crate::auth::AuthBinding;
    use crate::runtime::HttpToolRegistry;

    use super::*;

    fn test_state() -> AppState {
        let dir = tempfile::tempdir().unwrap().keep();
        let store: Arc<dyn ro_store::StoreGateway> = Arc::new(MemoryStoreGateway::new(&dir).unwrap());
        let config = Arc::new(Config::default());
        let provider = Arc::new(HttpProviderClient::new("http://unused", None, Duration::from_secs(1)).unwrap());
        let tools = Arc::new(HttpToolRegistry::new("http://unused", vec![]));
        let auth = Arc::new(AuthBinding::new(config.auth.clone()));
        AppState::new(config, store, provider, tools, auth)
    }

    fn principal() -> Principal {
        Principal {
            user_id: "u1".into(),
            email: None,
            roles: vec![],
            groups: vec![],
            feature_flags: vec![],
            api_key_id: None,
        }
    }

    #[tokio::test]
    async fn private_conversation_cannot_be_shared() {
        let state = test_state();
        let mut conversation = ro_domain::model::Conversation::new("u1", "", "");
        conversation.private = true;
        let conversation = state.store.create_conversation(conversation).unwrap();

        let result = create(
            State(state),
            Extension(principal()),
            Json(CreateShareRequest { conversation_id: conversation.id }),
        )
        .await;

        let err = result.err().expect("private conversation must be rejected");
        assert_eq!(err.0.kind.as_str(), "forbidden");
    }

    #[tokio::test]
    async fn temporary_chat_cannot_be_shared() {
        let state = test_state();
        let mut conversation = ro_domain::model::Conversation::new("u1", "", "");
        conversation.id = TEMPORARY_CHAT_ID.to_string();
        state.store.create_conversation(conversation).unwrap();

        let result = create(
            State(state),
            Extension(principal()),
            Json(CreateShareRequest { conversation_id: TEMPORARY_CHAT_ID.to_string() }),
        )
        .await;

        let err = result.err().expect("temporary chat must be rejected");
        assert_eq!(err.0.kind.as_str(), "forbidden");
    }
}

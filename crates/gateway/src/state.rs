use std::sync::Arc;

use ro_domain::config::Config;
use ro_providers::LlmProvider;
use ro_store::StoreGateway;

use crate::auth::AuthBinding;
use crate::runtime::{CancelMap, HttpToolRegistry, QueueWaker, ToolRegistry, WebhookDispatcher};

/// Shared application state passed to every API handler and the
/// background worker pool.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn StoreGateway>,
    pub provider: Arc<dyn LlmProvider>,
    pub tools: Arc<dyn ToolRegistry>,
    pub cancel_map: Arc<CancelMap>,
    pub queue_waker: Arc<QueueWaker>,
    pub webhooks: Arc<WebhookDispatcher>,
    pub auth: Arc<AuthBinding>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn StoreGateway>,
        provider: Arc<dyn LlmProvider>,
        tools: Arc<HttpToolRegistry>,
        auth: Arc<AuthBinding>,
    ) -> Self {
        Self {
            webhooks: Arc::new(WebhookDispatcher::new(config.webhook.clone())),
            cancel_map: Arc::new(CancelMap::new()),
            queue_waker: Arc::new(QueueWaker::new()),
            config,
            store,
            provider,
            tools,
            auth,
        }
    }
}

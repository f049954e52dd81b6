use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;

use sadam_clients::{LlmClient, PostgresClient, R2Client};
use sadam_common::ModuleClient;
use sadam_runtime::{Consultation, FortuneStore, GenerationGateway};

/// Everything the handlers need. The single `Consultation` sits behind a
/// Mutex: one user, one logical thread of control, actions serialized.
#[derive(Clone)]
pub struct GlobalState {
    pub store: FortuneStore,
    pub gateway: GenerationGateway,
    pub consultation: Arc<Mutex<Consultation>>,
}

impl GlobalState {
    pub async fn new() -> Result<Self> {
        let db = PostgresClient::setup_connection().await;
        let llm = LlmClient::setup_connection().await;

        // portraits are optional: without bucket credentials the orchestrator
        // skips the step instead of failing startup
        let bucket = if R2Client::validate_env() {
            Some(R2Client::setup_connection().await)
        } else {
            None
        };

        let store = FortuneStore::new(db, bucket);
        store.init_schema().await?;

        let user_id = std::env::var("SADAM_USER_ID").unwrap_or_else(|_| "anonymous".to_string());

        Ok(Self {
            store,
            gateway: GenerationGateway::new(llm),
            consultation: Arc::new(Mutex::new(Consultation::new(user_id))),
        })
    }
}

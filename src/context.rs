//! Shared handles for every pipeline operation.
//!
//! An [`AppContext`] owns the database pool, the blob store and the two model
//! providers. The CLI builds one per command, the HTTP server shares one across
//! handlers, and tests inject in-memory providers via
//! [`AppContext::with_providers`].

use anyhow::Result;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::config::Config;
use crate::db;
use crate::embedding::{self, EmbeddingProvider};
use crate::llm::{self, ChatModel};
use crate::storage::BlobStore;

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub pool: SqlitePool,
    pub blobs: BlobStore,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub chat: Arc<dyn ChatModel>,
}

impl AppContext {
    /// Connect, migrate, and build providers from configuration.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let embedder: Arc<dyn EmbeddingProvider> =
            Arc::from(embedding::create_provider(&config.embedding)?);
        let chat: Arc<dyn ChatModel> = Arc::from(llm::create_chat_model(&config.llm)?);
        Self::with_providers(config, embedder, chat).await
    }

    /// Like [`from_config`](Self::from_config) with caller-supplied providers.
    pub async fn with_providers(
        config: &Config,
        embedder: Arc<dyn EmbeddingProvider>,
        chat: Arc<dyn ChatModel>,
    ) -> Result<Self> {
        let pool = db::connect(config).await?;
        db::migrate(&pool).await?;
        Ok(Self {
            config: Arc::new(config.clone()),
            pool,
            blobs: BlobStore::new(config.storage.root.clone()),
            embedder,
            chat,
        })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

//! Application state for NeuroNest.
//!
//! Contains the shared state that is passed to all handlers. Every
//! collaborator is built once here and injected into the services.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::db::DbPool;
use crate::services::{
    AttachmentStore, Augmentation, HttpAugmentation, LocalAttachmentStore, NoteService,
    NoteSettings, TagService,
};
use crate::Result;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: DbPool,
    /// Note lifecycle service.
    pub notes: NoteService,
    /// Tag management service.
    pub tags: TagService,
    /// HS256 secret for access token verification.
    pub jwt_secret: Arc<str>,
    /// Upper bound on request body size, in bytes.
    pub max_request_body: usize,
}

/// Request body bound used when none is configured (50 MiB).
pub const DEFAULT_MAX_REQUEST_BODY: usize = 50 * 1024 * 1024;

impl AppState {
    /// Create the application state from configuration, initializing the
    /// database, the augmentation provider, and the local attachment store.
    pub async fn new(config: &Config) -> Result<Self> {
        // Initialize database
        let db = crate::db::init_pool(&config.database.path).await?;

        // Initialize database schema
        crate::db::initialize_schema(&db).await?;

        let augmentation = Arc::new(HttpAugmentation::new(config.augmentation.clone())?);
        let store = Arc::new(LocalAttachmentStore::new(
            PathBuf::from(&config.storage.uploads_path),
            config.server.public_url.clone(),
        ));

        let settings = NoteSettings {
            max_attachment_size: config.storage.max_attachment_size,
            provider_timeout: config.augmentation.timeout,
        };

        Ok(Self::with_services(
            db,
            augmentation,
            store,
            settings,
            config.auth.jwt_secret.as_str(),
        )
        .with_max_request_body(config.storage.max_request_body))
    }

    /// Assemble the state from already-built collaborators.
    pub fn with_services(
        db: DbPool,
        augmentation: Arc<dyn Augmentation>,
        store: Arc<dyn AttachmentStore>,
        settings: NoteSettings,
        jwt_secret: &str,
    ) -> Self {
        let notes = NoteService::new(db.clone(), augmentation, store, settings);
        let tags = TagService::new(db.clone());

        Self {
            db,
            notes,
            tags,
            jwt_secret: Arc::from(jwt_secret),
            max_request_body: DEFAULT_MAX_REQUEST_BODY,
        }
    }

    /// Override the request body bound.
    pub fn with_max_request_body(mut self, max_request_body: usize) -> Self {
        self.max_request_body = max_request_body;
        self
    }
}

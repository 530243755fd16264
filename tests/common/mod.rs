//! Common test utilities and helpers.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::Value;

use neuronest::db::{self, CreateTag, DbPool};
use neuronest::middleware::Claims;
use neuronest::services::{
    Augmentation, MemoryAttachmentStore, NoteService, NoteSettings, ProviderError, TagService,
};
use neuronest::AppState;

pub const TEST_SECRET: &str = "test-secret";

// ============================================================================
// Test doubles
// ============================================================================

/// Augmentation double that counts calls and can fail or stall.
#[derive(Default)]
pub struct FakeAugmentation {
    pub embed_calls: AtomicUsize,
    pub summarize_calls: AtomicUsize,
    pub fail_embed: AtomicBool,
    pub fail_summarize: AtomicBool,
    /// When set, every call sleeps this long before answering.
    pub delay: Option<Duration>,
}

impl FakeAugmentation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    pub fn summarize_calls(&self) -> usize {
        self.summarize_calls.load(Ordering::SeqCst)
    }

    async fn stall(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl Augmentation for FakeAugmentation {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        self.stall().await;
        if self.fail_embed.load(Ordering::SeqCst) {
            return Err(ProviderError::Provider("embedding backend down".into()));
        }
        Ok(vec![text.len() as f32, 0.5, -0.25])
    }

    async fn summarize(&self, text: &str) -> Result<String, ProviderError> {
        self.summarize_calls.fetch_add(1, Ordering::SeqCst);
        self.stall().await;
        if self.fail_summarize.load(Ordering::SeqCst) {
            return Err(ProviderError::Status {
                status: 503,
                body: "unavailable".into(),
            });
        }
        let words: Vec<&str> = text.split_whitespace().collect();
        Ok(format!("Summary: {}", words[..words.len() * 2 / 3].join(" ")))
    }
}

// ============================================================================
// Context
// ============================================================================

pub struct TestContext {
    pub db: DbPool,
    pub augmentation: Arc<FakeAugmentation>,
    pub store: Arc<MemoryAttachmentStore>,
    pub notes: NoteService,
    pub tags: TagService,
}

impl TestContext {
    /// Build an `AppState` sharing this context's collaborators.
    pub fn app_state(&self) -> AppState {
        AppState::with_services(
            self.db.clone(),
            self.augmentation.clone(),
            self.store.clone(),
            NoteSettings::default(),
            TEST_SECRET,
        )
    }
}

/// Fresh in-memory database with the schema applied.
pub async fn setup_db() -> DbPool {
    let pool = db::init_pool(":memory:").await.unwrap();
    db::initialize_schema(&pool).await.unwrap();
    pool
}

pub async fn setup() -> TestContext {
    setup_with(FakeAugmentation::new(), NoteSettings::default()).await
}

pub async fn setup_with(augmentation: FakeAugmentation, settings: NoteSettings) -> TestContext {
    context_for(setup_db().await, augmentation, settings)
}

/// Context over a WAL database file in `dir`, for tests that need real
/// cross-connection locking.
pub async fn setup_file_backed(dir: &Path) -> TestContext {
    let path = dir.join("neuronest.db");
    let pool = db::init_pool(path.to_str().unwrap()).await.unwrap();
    db::initialize_schema(&pool).await.unwrap();
    context_for(pool, FakeAugmentation::new(), NoteSettings::default())
}

fn context_for(db: DbPool, augmentation: FakeAugmentation, settings: NoteSettings) -> TestContext {
    let augmentation = Arc::new(augmentation);
    let store = Arc::new(MemoryAttachmentStore::new());
    let notes = NoteService::new(db.clone(), augmentation.clone(), store.clone(), settings);
    let tags = TagService::new(db.clone());

    TestContext {
        db,
        augmentation,
        store,
        notes,
        tags,
    }
}

// ============================================================================
// Data helpers
// ============================================================================

/// Text of exactly `n` words.
pub fn words(n: usize) -> String {
    (0..n)
        .map(|i| format!("word{}", i))
        .collect::<Vec<_>>()
        .join(" ")
}

pub async fn create_tag(pool: &DbPool, user_id: i64, name: &str) -> i64 {
    db::create_tag(
        pool,
        CreateTag {
            user_id,
            name: name.to_string(),
            description: None,
        },
    )
    .await
    .unwrap()
    .id
}

pub async fn count_rows(pool: &DbPool, table: &str, note_id: i64) -> i64 {
    let column = if table == "notes" { "id" } else { "note_id" };
    let (count,): (i64,) = sqlx::query_as(&format!(
        "SELECT COUNT(*) FROM {} WHERE {} = ?",
        table, column
    ))
    .bind(note_id)
    .fetch_one(pool)
    .await
    .unwrap();
    count
}

// ============================================================================
// HTTP helpers
// ============================================================================

/// Mint an access token the way the external identity service does.
pub fn token_for(user_id: i64) -> String {
    let exp = (chrono::Utc::now().timestamp() + 3600) as usize;
    encode(
        &Header::new(Algorithm::HS256),
        &Claims { user_id, exp },
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .unwrap()
}

/// Extract JSON body from response
pub async fn extract_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

/// Create a GET request
pub fn get_request(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

/// Create a request with no body and the given method
pub fn empty_request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

/// Create a POST request with JSON body
pub fn post_json(uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

/// One part of a multipart form.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

const BOUNDARY: &str = "neuronest-test-boundary";

/// Create a POST request with a multipart/form-data body
pub fn post_multipart(uri: &str, token: &str, parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, filename, data) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        name, filename
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::from(body))
        .unwrap()
}

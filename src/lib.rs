//! NeuroNest - personal note service
//!
//! Notes with tags, attachments, embeddings, and summaries, served over
//! an axum HTTP API backed by SQLite.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;
pub mod state;

pub use config::config;
pub use error::{Error, Result};
pub use state::AppState;

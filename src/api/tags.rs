//! Tags Routes
//!
//! Routes:
//! - POST /tags/create - Create a tag
//! - GET /tags/list - List the caller's tags
//! - DELETE /tags/:id - Delete a tag and unlink it from notes

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};

use super::extract::PathId;
use crate::db::Tag;
use crate::middleware::AuthUser;
use crate::{AppState, Result};

/// Build tag routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/create", post(create_tag))
        .route("/list", get(list_tags))
        .route("/:id", delete(delete_tag))
}

#[derive(Debug, Deserialize)]
pub struct CreateTagRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateTagResponse {
    pub message: String,
    pub tag: Tag,
}

#[derive(Debug, Serialize)]
pub struct ListTagsResponse {
    pub tags: Vec<Tag>,
    pub total: usize,
}

/// POST /tags/create
async fn create_tag(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateTagRequest>,
) -> Result<(StatusCode, Json<CreateTagResponse>)> {
    let tag = state
        .tags
        .create(user.user_id, &request.name, request.description)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateTagResponse {
            message: "Tag created successfully".into(),
            tag,
        }),
    ))
}

/// GET /tags/list
async fn list_tags(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ListTagsResponse>> {
    let tags = state.tags.list(user.user_id).await?;
    Ok(Json(ListTagsResponse {
        total: tags.len(),
        tags,
    }))
}

/// DELETE /tags/:id
async fn delete_tag(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathId(id): PathId,
) -> Result<Json<serde_json::Value>> {
    state.tags.delete(user.user_id, id).await?;
    Ok(Json(serde_json::json!({
        "message": "Tag deleted successfully"
    })))
}

//! Notes Routes
//!
//! Routes:
//! - POST /notes/create - Create a note (multipart)
//! - GET /notes/list - List the caller's notes
//! - GET /notes/:id - Get one note with tags and attachments
//! - POST /notes/:id/summarize - Compute and store the summary
//! - PATCH /notes/:id/archive - Archive a note
//! - DELETE /notes/:id - Delete a note and its dependents

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::extract::PathId;
use crate::middleware::AuthUser;
use crate::models::{ArchiveOutcome, FileUpload, NewNote, NoteDetails};
use crate::{AppState, Error, Result};

/// Build note routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/create", post(create_note))
        .route("/list", get(list_notes))
        .route("/:id", get(get_note).delete(delete_note))
        .route("/:id/summarize", post(summarize_note))
        .route("/:id/archive", patch(archive_note))
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct TagRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct AttachmentRef {
    pub id: i64,
    pub file_url: String,
    pub file_type: String,
    pub file_size: i64,
}

/// Note with its tags and attachments.
#[derive(Debug, Serialize)]
pub struct NoteResponse {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    pub is_archived: bool,
    pub tags: Vec<TagRef>,
    pub attachments: Vec<AttachmentRef>,
    pub related_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<NoteDetails> for NoteResponse {
    fn from(details: NoteDetails) -> Self {
        let NoteDetails {
            note,
            tags,
            attachments,
        } = details;

        Self {
            related_ids: note.related_ids_vec(),
            id: note.id,
            title: note.title,
            content: note.content,
            summary: note.summary,
            is_archived: note.is_archived,
            tags: tags
                .into_iter()
                .map(|t| TagRef {
                    id: t.id,
                    name: t.name,
                })
                .collect(),
            attachments: attachments
                .into_iter()
                .map(|a| AttachmentRef {
                    id: a.id,
                    file_url: a.file_url,
                    file_type: a.file_type,
                    file_size: a.file_size,
                })
                .collect(),
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateNoteResponse {
    pub message: String,
    pub id: i64,
}

#[derive(Debug, Serialize)]
pub struct ListNotesResponse {
    pub notes: Vec<NoteResponse>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub summary: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a note.
///
/// POST /notes/create
///
/// Multipart fields: `title`, `content`, repeated `tag_ids[]` and
/// `related_ids[]` (comma-separated values also accepted), and any number
/// of `attachments` files.
async fn create_note(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<CreateNoteResponse>)> {
    let input = read_note_form(multipart, state.max_request_body).await?;
    let created = state.notes.create(user.user_id, input).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateNoteResponse {
            message: "Note created successfully".into(),
            id: created.id,
        }),
    ))
}

/// List the caller's notes.
///
/// GET /notes/list
async fn list_notes(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ListNotesResponse>> {
    let notes: Vec<NoteResponse> = state
        .notes
        .list(user.user_id)
        .await?
        .into_iter()
        .map(NoteResponse::from)
        .collect();

    Ok(Json(ListNotesResponse {
        total: notes.len(),
        notes,
    }))
}

/// GET /notes/:id
async fn get_note(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathId(id): PathId,
) -> Result<Json<NoteResponse>> {
    let details = state.notes.get(user.user_id, id).await?;
    Ok(Json(details.into()))
}

/// POST /notes/:id/summarize
async fn summarize_note(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathId(id): PathId,
) -> Result<Json<SummaryResponse>> {
    let summary = state.notes.summarize(user.user_id, id).await?;
    Ok(Json(SummaryResponse { summary }))
}

/// PATCH /notes/:id/archive
async fn archive_note(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathId(id): PathId,
) -> Result<Json<MessageResponse>> {
    let message = match state.notes.archive(user.user_id, id).await? {
        ArchiveOutcome::Archived => "Note archived successfully",
        ArchiveOutcome::AlreadyArchived => "Note is already archived",
    };
    Ok(Json(MessageResponse {
        message: message.into(),
    }))
}

/// DELETE /notes/:id
async fn delete_note(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathId(id): PathId,
) -> Result<Json<MessageResponse>> {
    state.notes.delete(user.user_id, id).await?;
    Ok(Json(MessageResponse {
        message: "Note deleted successfully".into(),
    }))
}

// ============================================================================
// Multipart parsing
// ============================================================================

async fn read_note_form(mut multipart: Multipart, max_size: usize) -> Result<NewNote> {
    let mut input = NewNote::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Failed to read multipart field", e, max_size))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "attachments" | "attachments[]" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error("Failed to read file", e, max_size))?;
                input.files.push(FileUpload::new(filename, data.to_vec()));
            }
            "title" | "content" | "tag_ids" | "tag_ids[]" | "related_ids" | "related_ids[]" => {
                let value = field.text().await.map_err(|e| {
                    multipart_error(&format!("Failed to read field {}", name), e, max_size)
                })?;

                match name.trim_end_matches("[]") {
                    "title" => input.title = value,
                    "content" => input.content = value,
                    "tag_ids" => input.tag_ids.extend(parse_ids(&name, &value)?),
                    _ => input.related_ids.extend(parse_ids(&name, &value)?),
                }
            }
            _ => {}
        }
    }

    Ok(input)
}

/// Map a multipart read failure. Hitting the body limit is `FileTooLarge`,
/// anything else is a malformed form.
fn multipart_error(context: &str, err: MultipartError, max_size: usize) -> Error {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::FileTooLarge { max_size }
    } else {
        Error::Validation(format!("{}: {}", context, err))
    }
}

/// Parse a form value holding one id or a comma-separated list of ids.
fn parse_ids(field: &str, value: &str) -> Result<Vec<i64>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| {
            v.parse::<i64>()
                .map_err(|_| Error::Validation(format!("Invalid id in {}: {}", field, v)))
        })
        .collect()
}

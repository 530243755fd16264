//! Extractors shared by the route modules.

use axum::async_trait;
use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;

use crate::Error;

/// Numeric `:id` path segment. A malformed id is a validation error.
#[derive(Debug, Clone, Copy)]
pub struct PathId(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for PathId
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| Error::Validation(e.body_text()))?;

        raw.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| Error::Validation(format!("Invalid id: {}", raw)))
    }
}

//! Access token authentication middleware.
//!
//! Validates `Authorization: Bearer {jwt}` headers. Tokens are HS256 JWTs
//! issued elsewhere; the `user_id` claim becomes the owner id of every
//! note and tag operation on the request.

use axum::{
    body::Body,
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{error::Error, AppState};

/// JWT claims carried by access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    /// Expiry as a unix timestamp.
    pub exp: usize,
}

/// Authenticated owner injected into request extensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i64,
}

fn extract_bearer(req: &Request<Body>) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Verify a token and return its owner id.
pub fn verify_token(token: &str, secret: &str) -> Result<i64, Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| {
        debug!(error = %e, "Rejected access token");
        Error::InvalidToken
    })?;

    if data.claims.user_id <= 0 {
        return Err(Error::InvalidToken);
    }
    Ok(data.claims.user_id)
}

/// Middleware that requires a valid access token.
///
/// # Errors
///
/// Returns 401 Unauthorized if the header is missing or not a Bearer
/// token (`UNAUTHENTICATED`), or if the token fails verification or has
/// expired (`INVALID_TOKEN`).
pub async fn require_user(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Error> {
    let token = extract_bearer(&req).ok_or(Error::Unauthenticated)?;
    let user_id = verify_token(token, &state.jwt_secret)?;

    req.extensions_mut().insert(AuthUser { user_id });
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(user_id: i64, secret: &str, exp_offset: i64) -> String {
        let exp = (chrono::Utc::now().timestamp() + exp_offset) as usize;
        encode(
            &Header::new(Algorithm::HS256),
            &Claims { user_id, exp },
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_verify_valid_token() {
        assert_eq!(verify_token(&token(7, "s3cret", 3600), "s3cret").unwrap(), 7);
    }

    #[test]
    fn test_verify_rejects_bad_tokens() {
        assert!(matches!(
            verify_token(&token(7, "other", 3600), "s3cret"),
            Err(Error::InvalidToken)
        ));
        assert!(matches!(
            verify_token(&token(7, "s3cret", -3600), "s3cret"),
            Err(Error::InvalidToken)
        ));
        assert!(matches!(
            verify_token(&token(0, "s3cret", 3600), "s3cret"),
            Err(Error::InvalidToken)
        ));
        assert!(matches!(
            verify_token("not-a-jwt", "s3cret"),
            Err(Error::InvalidToken)
        ));
    }
}

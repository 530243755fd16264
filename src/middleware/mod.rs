//! Middleware for NeuroNest.
//!
//! Bearer-token verification that resolves the owner id for note and
//! tag routes.

mod token_auth;

pub use token_auth::{require_user, AuthUser, Claims};

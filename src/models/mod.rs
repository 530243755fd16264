//! Data models for NeuroNest.
//!
//! Plain records exchanged between the API layer and the note services.
//! No framework types cross this boundary.

mod attachment;
mod note;

pub use attachment::*;
pub use note::*;

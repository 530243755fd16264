//! Service layer for NeuroNest.
//!
//! Contains the note lifecycle orchestration and its collaborators:
//! - Augmentation (embeddings and summaries from an external provider)
//! - AttachmentStore (physical attachment files)
//! - Notes (create, fetch, list, summarize, archive, delete)
//! - Tags (owner-scoped tag management)

mod attachment_store;
mod augmentation;
mod notes;
mod tags;

pub use attachment_store::{AttachmentStore, LocalAttachmentStore, MemoryAttachmentStore};
pub use augmentation::{Augmentation, HttpAugmentation, ProviderError};
pub use notes::{needs_summary, NoteService, NoteSettings, SUMMARY_MIN_CHARS, SUMMARY_MIN_WORDS};
pub use tags::TagService;

//! Core conversation components
//!
//! The chat engine orchestrates one turn at a time; sessions, redirects,
//! notifications and persisted preferences support it.

mod chat;
mod notification;
mod preferences;
mod redirect;
mod session;

pub use chat::{ChatEngine, ChatOutcome};
pub use preferences::PreferenceStore;
pub use session::SessionStore;

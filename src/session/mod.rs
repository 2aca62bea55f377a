//! Editor sessions
//!
//! One session is one embed, authenticate, edit, extract and teardown
//! lifecycle.

pub mod config;
pub mod controller;
pub mod state;

pub use config::{editor_url_for_site, SessionConfig, SessionConfigBuilder};
pub use controller::{EditorSessionController, OnSave, SessionHandle, SessionOutcome};
pub use state::SessionState;

//! WebEdit Bridge - Embedded Block Editor Sessions
//!
//! This crate embeds a remote block editor in a Chromium surface and talks to
//! it through a small message protocol: the editor request is authenticated,
//! script payloads are injected at defined lifecycle points, the page posts
//! typed messages back, and everything injected is removed before the
//! surface is closed.
//!
//! # Features
//!
//! - **Authenticated loads**: cookies and headers from a pluggable authenticator
//! - **Message bus**: closed set of page-to-host channels with safe teardown
//! - **Script catalog**: logging shim, content seeding, styling, extraction
//! - **Sessions**: a serialized state machine from load to saved content
//! - **Chromium surface**: CDP bindings and user scripts via ChromiumOxide
//!
//! # Architecture
//!
//! ```text
//! Host ──▶ EditorSessionController ──▶ AuthenticatingRequestBuilder
//!                  │
//!                  ▼
//!             MessageBus ◀──── ScriptCatalog
//!                  │
//!                  ▼
//!           ContentSurface (ChromiumSurface)
//!                  │
//!                  ▼
//!        log / htmlPostContent messages
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use url::Url;
//! use webedit_bridge::auth::BearerTokenAuthenticator;
//! use webedit_bridge::browser::BrowserController;
//! use webedit_bridge::session::{EditorSessionController, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let browser = Arc::new(BrowserController::new().await?);
//!     let config = SessionConfig::for_site(&Url::parse("https://example.com")?)?;
//!     let auth = Arc::new(BearerTokenAuthenticator::new("token"));
//!
//!     let handle = EditorSessionController::new(config, auth, browser)
//!         .on_save(|html| println!("{}", html))
//!         .start()
//!         .await?;
//!
//!     handle.save().await?;
//!     let outcome = handle.finished().await;
//!     println!("Saved: {:?}", outcome.content());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod auth;
pub mod bridge;
pub mod browser;
pub mod error;
pub mod naming;
pub mod session;

// Re-exports for convenience
pub use bridge::{ChannelName, InboundMessage, MessageBus, ScriptCatalog};
pub use browser::BrowserController;
pub use error::{Error, Result};
pub use naming::next_available_name;
pub use session::{EditorSessionController, SessionConfig, SessionHandle, SessionOutcome};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

//! The content surface seam
//!
//! A [`ContentSurface`] is the embedded renderer hosting the editor page.
//! Commands go in through the trait; navigation events and page messages come
//! back as [`SurfaceEvent`]s on the channel the surface was opened with.

use crate::auth::AuthenticatedRequest;
use crate::bridge::channel::InboundMessage;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Identifier of a before-load script registered with a surface
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserScriptId(pub String);

/// Events a surface reports to its session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// The main frame committed a navigation
    NavigationCommitted {
        /// Committed URL
        url: String,
    },
    /// The main frame failed to load
    LoadFailed {
        /// Reason reported by the renderer
        reason: String,
    },
    /// Script code posted a message on a channel
    Message(InboundMessage),
}

/// Sender half handed to a surface when it is opened
pub type SurfaceEventSender = mpsc::UnboundedSender<SurfaceEvent>;

/// Receiver half owned by the session
pub type SurfaceEventReceiver = mpsc::UnboundedReceiver<SurfaceEvent>;

/// Embedded renderer operations the bridge relies on
#[async_trait]
pub trait ContentSurface: Send + Sync {
    /// Start loading an authenticated request. Commit is reported as an event.
    async fn load(&self, request: &AuthenticatedRequest) -> Result<()>;

    /// Register a script that runs in every new document before page scripts
    async fn add_user_script(&self, source: &str) -> Result<UserScriptId>;

    /// Remove a previously registered user script
    async fn remove_user_script(&self, id: &UserScriptId) -> Result<()>;

    /// Expose a named receiver the page can post string payloads to
    async fn add_channel(&self, name: &str) -> Result<()>;

    /// Remove a named receiver
    async fn remove_channel(&self, name: &str) -> Result<()>;

    /// Evaluate script in the page's execution context
    async fn evaluate(&self, script: &str) -> Result<Option<String>>;

    /// Close the surface. Must come after the bus is torn down.
    async fn dispose(&self) -> Result<()>;
}

/// Opens surfaces for sessions
///
/// Sessions only ask for a surface once their request is authenticated, so
/// a failed authentication never opens one.
#[async_trait]
pub trait SurfaceProvider: Send + Sync {
    /// Open a fresh surface that reports to `events`
    async fn open(&self, events: SurfaceEventSender) -> Result<Arc<dyn ContentSurface>>;
}

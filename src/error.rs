//! Error types for the editor bridge
//!
//! This module provides the error hierarchy using `thiserror`. Each area of
//! the crate has its own enum; all of them convert into [`Error`].

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for editor bridge operations
#[derive(Error, Debug)]
pub enum Error {
    /// Authentication errors
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Message bus errors
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// Session lifecycle errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Resource naming errors
    #[error("Naming error: {0}")]
    Naming(#[from] NamingError),

    /// Content surface errors
    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceError),

    /// ChromiumOxide errors
    #[error("CDP error: {0}")]
    Cdp(String),

    /// Generic error with message
    #[error("{0}")]
    Generic(String),
}

/// Credential and request-building errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// The authenticator could not produce credentials
    #[error("Authentication unavailable: {0}")]
    AuthenticationUnavailable(String),

    /// The target address cannot carry credentials
    #[error("Invalid target URL: {0}")]
    InvalidTarget(String),

    /// A credential could not be turned into a request header
    #[error("Invalid credential header {name}: {reason}")]
    InvalidHeader {
        /// Header name
        name: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Message bus errors
#[derive(Error, Debug)]
pub enum BridgeError {
    /// A channel was registered twice before teardown
    #[error("Channel already registered: {0}")]
    ChannelAlreadyRegistered(String),

    /// Script evaluation failed inside the content surface
    #[error("Script evaluation failed ({script}): {cause}")]
    ScriptEvaluationFailed {
        /// Name of the payload that failed
        script: String,
        /// Underlying cause reported by the surface
        cause: String,
    },

    /// The bus was already torn down
    #[error("Message bus already torn down")]
    TornDown,
}

/// Session state machine errors
#[derive(Error, Debug)]
pub enum SessionError {
    /// The session is closed and no longer accepts commands
    #[error("Session closed")]
    Closed,

    /// An operation is not valid in the current state
    #[error("Operation {operation} not allowed in state {state}")]
    InvalidState {
        /// Requested operation
        operation: &'static str,
        /// State the session was in
        state: String,
    },

    /// The page failed to load
    #[error("Load failed: {0}")]
    LoadFailed(String),
}

/// Resource naming errors
#[derive(Error, Debug)]
pub enum NamingError {
    /// Probing for an existing resource failed
    #[error("Existence check failed for {path}: {source}")]
    ExistenceCheckFailed {
        /// Path that was checked
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// The candidate has no file name to increment
    #[error("Path has no file name: {0}")]
    NoFileName(PathBuf),
}

/// Content surface lifecycle errors
#[derive(Error, Debug)]
pub enum SurfaceError {
    /// Failed to launch the browser backing the surface
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    /// Surface configuration error
    #[error("Invalid surface configuration: {0}")]
    ConfigError(String),

    /// Failed to create the page
    #[error("Failed to create page: {0}")]
    PageCreationFailed(String),

    /// Navigation could not be started
    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    /// Navigation did not commit in time
    #[error("Navigation did not commit within {0:?}")]
    Timeout(std::time::Duration),

    /// Surface already disposed
    #[error("Surface already disposed")]
    Disposed,
}

/// Result type alias for editor bridge operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a generic error from a string
    pub fn generic<S: Into<String>>(msg: S) -> Self {
        Error::Generic(msg.into())
    }

    /// Create a CDP error from a string
    pub fn cdp<S: Into<String>>(msg: S) -> Self {
        Error::Cdp(msg.into())
    }

    /// Whether this is a failed script evaluation
    pub fn is_script_evaluation_failure(&self) -> bool {
        matches!(
            self,
            Error::Bridge(BridgeError::ScriptEvaluationFailed { .. })
        )
    }

    /// Whether this is a missing-credentials failure
    pub fn is_authentication_unavailable(&self) -> bool {
        matches!(self, Error::Auth(AuthError::AuthenticationUnavailable(_)))
    }
}

/// Convert chromiumoxide errors
impl From<chromiumoxide::error::CdpError> for Error {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        Error::Cdp(err.to_string())
    }
}

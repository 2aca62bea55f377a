//! Authentication of editor requests
//!
//! An [`RequestAuthenticator`] produces [`Credentials`]; the
//! [`AuthenticatingRequestBuilder`] attaches them to a request for the editor
//! URL without sending it.

pub mod credentials;
pub mod login;
pub mod request;

pub use credentials::{
    BearerTokenAuthenticator, Credentials, NoAuthenticator, RequestAuthenticator, SessionCookie,
    StaticAuthenticator,
};
pub use login::{login_url_for_site, FormLoginAuthenticator};
pub use request::{AuthenticatedRequest, AuthenticatingRequestBuilder};

//! Authenticated request building
//!
//! The builder asks an authenticator for credentials and returns a request
//! ready to load. It never sends anything itself, and it never returns an
//! unauthenticated request as a fallback.

use crate::auth::credentials::{RequestAuthenticator, SessionCookie};
use crate::error::{AuthError, Result};
use http::header::COOKIE;
use http::{HeaderMap, HeaderValue};
use tracing::{debug, instrument, warn};
use url::Url;

/// A request carrying the credential material for its target
#[derive(Debug, Clone)]
pub struct AuthenticatedRequest {
    url: Url,
    headers: HeaderMap,
    cookies: Vec<SessionCookie>,
}

impl AuthenticatedRequest {
    /// Target URL, exactly as requested
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Extra headers from the authenticator
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Cookies from the authenticator
    pub fn cookies(&self) -> &[SessionCookie] {
        &self.cookies
    }

    /// `Cookie` header value for the attached cookies
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// The request as an `http::Request`, cookies folded into a `Cookie` header
    pub fn to_http(&self) -> Result<http::Request<()>> {
        let mut builder = http::Request::get(self.url.as_str());
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        if let Some(cookie) = self.cookie_header() {
            let value = HeaderValue::from_str(&cookie).map_err(|e| AuthError::InvalidHeader {
                name: COOKIE.to_string(),
                reason: e.to_string(),
            })?;
            builder = builder.header(COOKIE, value);
        }
        builder
            .body(())
            .map_err(|e| AuthError::InvalidTarget(e.to_string()).into())
    }
}

/// Builds authenticated requests
pub struct AuthenticatingRequestBuilder;

impl AuthenticatingRequestBuilder {
    /// Build a request for `target` signed by `authenticator`
    ///
    /// Fails with [`AuthError::AuthenticationUnavailable`] when the
    /// authenticator fails or produces no credentials at all.
    #[instrument(skip(authenticator, target), fields(url = %target))]
    pub async fn build(
        target: &Url,
        authenticator: &dyn RequestAuthenticator,
    ) -> Result<AuthenticatedRequest> {
        if !matches!(target.scheme(), "http" | "https") || target.host_str().is_none() {
            return Err(AuthError::InvalidTarget(format!(
                "expected an http(s) URL with a host: {}",
                target
            ))
            .into());
        }

        let credentials = authenticator.credentials(target).await.map_err(|e| {
            warn!("Authenticator failed: {}", e);
            match e {
                AuthError::AuthenticationUnavailable(_) => e,
                other => AuthError::AuthenticationUnavailable(other.to_string()),
            }
        })?;

        if credentials.is_empty() {
            return Err(AuthError::AuthenticationUnavailable(
                "authenticator produced no credentials".to_string(),
            )
            .into());
        }

        debug!(
            cookies = credentials.cookies.len(),
            headers = credentials.headers.len(),
            "Request authenticated"
        );

        Ok(AuthenticatedRequest {
            url: target.clone(),
            headers: credentials.headers,
            cookies: credentials.cookies,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credentials::{Credentials, StaticAuthenticator};

    #[test]
    fn test_cookie_header_joins_pairs() {
        let request = AuthenticatedRequest {
            url: Url::parse("https://example.com/").unwrap(),
            headers: HeaderMap::new(),
            cookies: vec![SessionCookie::new("a", "1"), SessionCookie::new("b", "2")],
        };
        assert_eq!(request.cookie_header().as_deref(), Some("a=1; b=2"));

        let http = request.to_http().unwrap();
        assert_eq!(http.uri(), "https://example.com/");
        assert_eq!(http.headers().get(COOKIE).unwrap(), "a=1; b=2");
    }

    #[tokio::test]
    async fn test_rejects_non_http_target() {
        let auth = StaticAuthenticator::new(Credentials::with_cookies(vec![SessionCookie::new(
            "a", "1",
        )]));
        let target = Url::parse("file:///etc/passwd").unwrap();
        let err = AuthenticatingRequestBuilder::build(&target, &auth)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Auth(AuthError::InvalidTarget(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_credentials_unavailable() {
        let auth = StaticAuthenticator::new(Credentials::default());
        let target = Url::parse("https://example.com/editor").unwrap();
        let err = AuthenticatingRequestBuilder::build(&target, &auth)
            .await
            .unwrap_err();
        assert!(err.is_authentication_unavailable());
    }
}

//! Credential material and the authenticators that produce it

use crate::error::AuthError;
use async_trait::async_trait;
use http::header::{HeaderName, HeaderValue, AUTHORIZATION};
use http::HeaderMap;
use serde::{Deserialize, Serialize};
use url::Url;

/// A cookie the target origin expects on the editor request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// Domain attribute, if the origin set one
    pub domain: Option<String>,
    /// Path attribute, if the origin set one
    pub path: Option<String>,
    /// Secure attribute
    pub secure: bool,
    /// HttpOnly attribute
    pub http_only: bool,
}

impl SessionCookie {
    /// Host-only cookie with no attributes
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
            secure: false,
            http_only: false,
        }
    }

    /// Parse a `Set-Cookie` header value
    ///
    /// Returns `None` for malformed values and for cookies the server is
    /// clearing (empty value or `deleted`).
    pub fn parse_set_cookie(header: &str) -> Option<Self> {
        let mut parts = header.split(';');
        let (name, value) = parts.next()?.split_once('=')?;
        let name = name.trim();
        let value = value.trim().trim_matches('"');
        if name.is_empty() || value.is_empty() || value == "deleted" {
            return None;
        }

        let mut cookie = Self::new(name, value);
        for attr in parts {
            let attr = attr.trim();
            let (key, val) = match attr.split_once('=') {
                Some((k, v)) => (k.trim(), Some(v.trim())),
                None => (attr, None),
            };
            match key.to_ascii_lowercase().as_str() {
                "domain" => cookie.domain = val.map(|d| d.trim_start_matches('.').to_string()),
                "path" => cookie.path = val.map(str::to_string),
                "secure" => cookie.secure = true,
                "httponly" => cookie.http_only = true,
                _ => {}
            }
        }
        Some(cookie)
    }
}

/// Everything an authenticator attaches to a request
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// Cookies to install before loading
    pub cookies: Vec<SessionCookie>,
    /// Extra request headers
    pub headers: HeaderMap,
}

impl Credentials {
    /// Credentials made of cookies only
    pub fn with_cookies(cookies: Vec<SessionCookie>) -> Self {
        Self {
            cookies,
            headers: HeaderMap::new(),
        }
    }

    /// Add a header, validating name and value
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, AuthError> {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| AuthError::InvalidHeader {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| AuthError::InvalidHeader {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        self.headers.append(header_name, header_value);
        Ok(self)
    }

    /// Whether nothing would be attached
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty() && self.headers.is_empty()
    }
}

/// Opaque request-signing collaborator
///
/// Implementations may perform their own network round trip (a login, a
/// token refresh). They are shared read-only between sessions.
#[async_trait]
pub trait RequestAuthenticator: Send + Sync {
    /// Produce credentials for a request to `target`
    async fn credentials(&self, target: &Url) -> Result<Credentials, AuthError>;
}

/// Hands out the same credentials for every target
#[derive(Debug, Clone)]
pub struct StaticAuthenticator {
    credentials: Credentials,
}

impl StaticAuthenticator {
    /// Wrap fixed credentials
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl RequestAuthenticator for StaticAuthenticator {
    async fn credentials(&self, _target: &Url) -> Result<Credentials, AuthError> {
        Ok(self.credentials.clone())
    }
}

/// Signs requests with an OAuth bearer token
#[derive(Clone)]
pub struct BearerTokenAuthenticator {
    token: String,
}

impl BearerTokenAuthenticator {
    /// Use `token` for every request
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Read the token from an environment variable, if set and non-empty
    pub fn from_env(var: &str) -> Option<Self> {
        std::env::var(var)
            .ok()
            .filter(|t| !t.is_empty())
            .map(Self::new)
    }
}

impl std::fmt::Debug for BearerTokenAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerTokenAuthenticator")
            .field("token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl RequestAuthenticator for BearerTokenAuthenticator {
    async fn credentials(&self, _target: &Url) -> Result<Credentials, AuthError> {
        if self.token.is_empty() {
            return Err(AuthError::AuthenticationUnavailable(
                "empty bearer token".to_string(),
            ));
        }
        Credentials::default().header(AUTHORIZATION.as_str(), &format!("Bearer {}", self.token))
    }
}

/// Authenticator for hosts with no active account
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuthenticator;

#[async_trait]
impl RequestAuthenticator for NoAuthenticator {
    async fn credentials(&self, _target: &Url) -> Result<Credentials, AuthError> {
        Err(AuthError::AuthenticationUnavailable(
            "no active session".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_set_cookie_attributes() {
        let cookie = SessionCookie::parse_set_cookie(
            "wordpress_logged_in_abc=admin%7C1700; path=/; domain=.example.com; secure; HttpOnly",
        )
        .unwrap();

        assert_eq!(
            cookie,
            SessionCookie {
                name: "wordpress_logged_in_abc".to_string(),
                value: "admin%7C1700".to_string(),
                domain: Some("example.com".to_string()),
                path: Some("/".to_string()),
                secure: true,
                http_only: true,
            }
        );
    }

    #[test]
    fn test_parse_set_cookie_rejects_cleared() {
        assert!(SessionCookie::parse_set_cookie("wp_lang=deleted; path=/").is_none());
        assert!(SessionCookie::parse_set_cookie("wp_lang=; path=/").is_none());
        assert!(SessionCookie::parse_set_cookie("garbage").is_none());
    }

    #[test]
    fn test_credentials_header_validation() {
        let err = Credentials::default().header("bad header", "x").unwrap_err();
        assert!(matches!(err, AuthError::InvalidHeader { .. }));

        let creds = Credentials::default().header("X-Test", "1").unwrap();
        assert_eq!(creds.headers.get("x-test").unwrap(), "1");
        assert!(!creds.is_empty());
    }

    #[tokio::test]
    async fn test_bearer_token_header() {
        let target = Url::parse("https://example.com/wp-admin/post-new.php").unwrap();
        let creds = BearerTokenAuthenticator::new("secret")
            .credentials(&target)
            .await
            .unwrap();
        assert_eq!(creds.headers.get(AUTHORIZATION).unwrap(), "Bearer secret");
        assert!(creds.cookies.is_empty());
    }

    #[test]
    fn test_bearer_debug_redacts_token() {
        let debug = format!("{:?}", BearerTokenAuthenticator::new("secret"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_no_authenticator_is_unavailable() {
        let target = Url::parse("https://example.com/").unwrap();
        let err = tokio_test::block_on(NoAuthenticator.credentials(&target)).unwrap_err();
        assert!(matches!(err, AuthError::AuthenticationUnavailable(_)));
    }
}

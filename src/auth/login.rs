//! Form login against a site's `wp-login.php`
//!
//! Self-hosted sites have no token endpoint, so the session cookies come from
//! the regular login form. Redirects are not followed: a successful login
//! answers with a redirect carrying the `Set-Cookie` headers we need.

use crate::auth::credentials::{Credentials, RequestAuthenticator, SessionCookie};
use crate::error::AuthError;
use async_trait::async_trait;
use reqwest::header::SET_COOKIE;
use reqwest::redirect::Policy;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Logs in with username and password to obtain session cookies
pub struct FormLoginAuthenticator {
    login_url: Url,
    username: String,
    password: String,
    client: reqwest::Client,
}

impl FormLoginAuthenticator {
    /// Authenticator posting to `login_url`
    pub fn new(
        login_url: Url,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AuthError::AuthenticationUnavailable(e.to_string()))?;

        Ok(Self {
            login_url,
            username: username.into(),
            password: password.into(),
            client,
        })
    }

    /// Authenticator for the login form of `site`
    pub fn for_site(
        site: &Url,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, AuthError> {
        Self::new(login_url_for_site(site)?, username, password)
    }

    /// Where the form is posted
    pub fn login_url(&self) -> &Url {
        &self.login_url
    }
}

impl std::fmt::Debug for FormLoginAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormLoginAuthenticator")
            .field("login_url", &self.login_url.as_str())
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// `<site>/wp-login.php`, keeping any sub-directory install path
pub fn login_url_for_site(site: &Url) -> Result<Url, AuthError> {
    let mut base = site.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join("wp-login.php")
        .map_err(|e| AuthError::InvalidTarget(e.to_string()))
}

/// Cookies from a set of `Set-Cookie` header values
pub fn cookies_from_headers<'a, I>(values: I) -> Vec<SessionCookie>
where
    I: IntoIterator<Item = &'a str>,
{
    values
        .into_iter()
        .filter_map(SessionCookie::parse_set_cookie)
        .collect()
}

#[async_trait]
impl RequestAuthenticator for FormLoginAuthenticator {
    #[instrument(skip(self, target), fields(login_url = %self.login_url, user = %self.username))]
    async fn credentials(&self, target: &Url) -> Result<Credentials, AuthError> {
        let form = [
            ("log", self.username.as_str()),
            ("pwd", self.password.as_str()),
            ("rememberme", "true"),
            ("redirect_to", target.as_str()),
        ];

        let response = self
            .client
            .post(self.login_url.clone())
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                AuthError::AuthenticationUnavailable(format!("login request failed: {}", e))
            })?;

        let status = response.status();
        debug!(%status, "Login responded");

        let cookies = cookies_from_headers(
            response
                .headers()
                .get_all(SET_COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok()),
        );

        if !status.is_redirection() || cookies.is_empty() {
            warn!(%status, cookies = cookies.len(), "Login did not yield a session");
            return Err(AuthError::AuthenticationUnavailable(format!(
                "login rejected with status {}",
                status
            )));
        }

        info!(cookies = cookies.len(), "Obtained session cookies");
        Ok(Credentials::with_cookies(cookies))
    }
}

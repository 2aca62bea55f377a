//! Authentication tests
//!
//! Request building against custom authenticators, and form login against a
//! one-shot local HTTP responder.

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;
use webedit_bridge::auth::{
    AuthenticatingRequestBuilder, BearerTokenAuthenticator, Credentials, FormLoginAuthenticator,
    NoAuthenticator, RequestAuthenticator, SessionCookie, StaticAuthenticator,
};
use webedit_bridge::error::{AuthError, Error};

/// Counts how often it was asked
#[derive(Default)]
struct CountingAuthenticator {
    calls: AtomicUsize,
}

#[async_trait]
impl RequestAuthenticator for CountingAuthenticator {
    async fn credentials(&self, _target: &Url) -> Result<Credentials, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Credentials::default().header("X-Session", "s1")
    }
}

/// Fails with something other than "unavailable"
struct BrokenAuthenticator;

#[async_trait]
impl RequestAuthenticator for BrokenAuthenticator {
    async fn credentials(&self, _target: &Url) -> Result<Credentials, AuthError> {
        Credentials::default().header("bad header", "x")
    }
}

fn editor() -> Url {
    Url::parse("https://example.com/editor").unwrap()
}

#[tokio::test]
async fn test_request_carries_credentials_and_exact_target() {
    let credentials = Credentials::with_cookies(vec![SessionCookie::new("sid", "42")])
        .header("X-Client", "webedit")
        .unwrap();
    let auth = StaticAuthenticator::new(credentials);

    let request = AuthenticatingRequestBuilder::build(&editor(), &auth)
        .await
        .unwrap();

    assert_eq!(request.url().as_str(), "https://example.com/editor");
    assert_eq!(request.cookies(), &[SessionCookie::new("sid", "42")]);
    assert_eq!(request.headers()["x-client"], "webedit");
    assert_eq!(request.cookie_header().as_deref(), Some("sid=42"));

    let http = request.to_http().unwrap();
    assert_eq!(http.uri(), "https://example.com/editor");
    assert_eq!(http.headers()["cookie"], "sid=42");
}

#[tokio::test]
async fn test_bearer_token_sets_authorization() {
    let auth = BearerTokenAuthenticator::new("tok");
    let request = AuthenticatingRequestBuilder::build(&editor(), &auth)
        .await
        .unwrap();

    assert_eq!(request.headers()["authorization"], "Bearer tok");
    assert!(request.cookies().is_empty());
}

#[tokio::test]
async fn test_authenticator_asked_once_per_build() {
    let auth = CountingAuthenticator::default();
    AuthenticatingRequestBuilder::build(&editor(), &auth)
        .await
        .unwrap();
    assert_eq!(auth.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_no_session_is_unavailable() {
    let err = AuthenticatingRequestBuilder::build(&editor(), &NoAuthenticator)
        .await
        .unwrap_err();
    assert!(err.is_authentication_unavailable());
}

#[tokio::test]
async fn test_other_authenticator_errors_become_unavailable() {
    let err = AuthenticatingRequestBuilder::build(&editor(), &BrokenAuthenticator)
        .await
        .unwrap_err();
    assert!(err.is_authentication_unavailable());
}

#[tokio::test]
async fn test_non_http_target_rejected_before_authenticating() {
    let auth = CountingAuthenticator::default();
    let target = Url::parse("file:///etc/passwd").unwrap();

    let err = AuthenticatingRequestBuilder::build(&target, &auth)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Auth(AuthError::InvalidTarget(_))));
    assert_eq!(auth.calls.load(Ordering::SeqCst), 0);
}

fn header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

/// Answer a single HTTP request with `response`; yields the raw request
async fn serve_once(response: &'static str) -> (Url, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let task = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = header_end(&buf) {
                let head = String::from_utf8_lossy(&buf[..end]).to_string();
                if buf.len() >= end + 4 + content_length(&head) {
                    break;
                }
            }
        }
        stream.write_all(response.as_bytes()).await.unwrap();
        let _ = stream.shutdown().await;
        String::from_utf8_lossy(&buf).to_string()
    });

    (Url::parse(&format!("http://{}/", addr)).unwrap(), task)
}

#[tokio::test]
async fn test_form_login_collects_session_cookies() {
    let (site, server) = serve_once(concat!(
        "HTTP/1.1 302 Found\r\n",
        "Location: /wp-admin/\r\n",
        "Set-Cookie: wordpress_test_cookie=WP%20Cookie%20check; path=/\r\n",
        "Set-Cookie: wordpress_logged_in_abc=admin%7C1; path=/; HttpOnly\r\n",
        "Content-Length: 0\r\n",
        "Connection: close\r\n",
        "\r\n",
    ))
    .await;

    let auth = FormLoginAuthenticator::for_site(&site, "admin", "secret").unwrap();
    let target = site.join("wp-admin/post-new.php").unwrap();
    let credentials = auth.credentials(&target).await.unwrap();

    let names: Vec<&str> = credentials
        .cookies
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(names, vec!["wordpress_test_cookie", "wordpress_logged_in_abc"]);
    assert!(credentials.cookies[1].http_only);

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /wp-login.php"));
    assert!(request.contains("log=admin"));
    assert!(request.contains("pwd=secret"));
}

#[tokio::test]
async fn test_form_login_rejected_without_redirect() {
    let (site, server) = serve_once(concat!(
        "HTTP/1.1 200 OK\r\n",
        "Content-Length: 0\r\n",
        "Connection: close\r\n",
        "\r\n",
    ))
    .await;

    let auth = FormLoginAuthenticator::for_site(&site, "admin", "wrong").unwrap();
    let err = auth.credentials(&site).await.unwrap_err();

    assert!(matches!(err, AuthError::AuthenticationUnavailable(_)));
    server.await.unwrap();
}

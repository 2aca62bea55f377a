//! Session configuration

use crate::error::{AuthError, Result};
use url::Url;

/// What one editing session loads and injects
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Editor address the authenticated request targets
    pub request_target: Url,
    /// Block HTML seeded into the editor (empty = leave the editor as loaded)
    pub content: String,
    /// Evaluate the style payload after each commit (default: true)
    pub inject_style: bool,
    /// Forward page console output to the host log (default: true)
    pub forward_page_logs: bool,
}

impl SessionConfig {
    /// Config with defaults for `request_target`
    pub fn new(request_target: Url) -> Self {
        Self {
            request_target,
            content: String::new(),
            inject_style: true,
            forward_page_logs: true,
        }
    }

    /// Create a new config builder
    pub fn builder(request_target: Url) -> SessionConfigBuilder {
        SessionConfigBuilder {
            config: Self::new(request_target),
        }
    }

    /// Config targeting the new-post editor of `site`
    pub fn for_site(site: &Url) -> Result<Self> {
        Ok(Self::new(editor_url_for_site(site)?))
    }
}

/// Builder for SessionConfig
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Set the content to seed into the editor
    pub fn content<S: Into<String>>(mut self, content: S) -> Self {
        self.config.content = content.into();
        self
    }

    /// Enable/disable style injection
    pub fn inject_style(mut self, inject: bool) -> Self {
        self.config.inject_style = inject;
        self
    }

    /// Enable/disable page log forwarding
    pub fn forward_page_logs(mut self, forward: bool) -> Self {
        self.config.forward_page_logs = forward;
        self
    }

    /// Build the config
    pub fn build(self) -> SessionConfig {
        self.config
    }
}

/// `<site>/wp-admin/post-new.php`
///
/// The admin editor is used rather than any hosted front end because only
/// wp-admin exposes the block editor data store the extraction script reads.
pub fn editor_url_for_site(site: &Url) -> Result<Url> {
    let mut base = site.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join("wp-admin/post-new.php")
        .map_err(|e| AuthError::InvalidTarget(e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_defaults() {
        let config = SessionConfig::new(Url::parse("https://example.com/editor").unwrap());
        assert!(config.inject_style);
        assert!(config.forward_page_logs);
        assert!(config.content.is_empty());
    }

    #[test]
    fn test_session_config_builder() {
        let config = SessionConfig::builder(Url::parse("https://example.com/editor").unwrap())
            .content("<p>hi</p>")
            .inject_style(false)
            .forward_page_logs(false)
            .build();

        assert_eq!(config.content, "<p>hi</p>");
        assert!(!config.inject_style);
        assert!(!config.forward_page_logs);
    }

    #[test]
    fn test_editor_url_for_site() {
        let site = Url::parse("https://example.com/blog").unwrap();
        assert_eq!(
            editor_url_for_site(&site).unwrap().as_str(),
            "https://example.com/blog/wp-admin/post-new.php"
        );
        let config = SessionConfig::for_site(&Url::parse("https://example.com").unwrap()).unwrap();
        assert_eq!(
            config.request_target.as_str(),
            "https://example.com/wp-admin/post-new.php"
        );
    }
}

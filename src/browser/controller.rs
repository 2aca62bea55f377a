//! Browser lifecycle management
//!
//! This module handles browser launch and shutdown, and opens one page per
//! editor session.

use crate::bridge::{ContentSurface, SurfaceEventSender, SurfaceProvider};
use crate::browser::surface::ChromiumSurface;
use crate::error::{Error, Result, SurfaceError};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// How editor pages are hosted
///
/// The default is a visible window because the editor is operated by a person;
/// headless only fits unattended saves of seeded content.
#[derive(Debug, Clone)]
pub struct SurfaceConfig {
    /// Hide the browser window
    pub headless: bool,
    /// Window size; below ~1000px wide the editor collapses its block sidebar
    pub window: (u32, u32),
    /// Chromium sandbox. Containers without user namespaces need it off.
    pub sandbox: bool,
    /// Replaces Chromium's user agent
    pub user_agent: Option<String>,
    /// Time the editor navigation has to commit before the session fails
    pub commit_timeout: Duration,
    /// Chromium binary; looked up on the system when unset
    pub chrome_path: Option<PathBuf>,
    /// Passed to Chromium verbatim
    pub extra_args: Vec<String>,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            headless: false,
            window: (1280, 900),
            sandbox: true,
            user_agent: None,
            commit_timeout: Duration::from_secs(30),
            chrome_path: None,
            extra_args: Vec::new(),
        }
    }
}

impl SurfaceConfig {
    /// Start from the defaults
    pub fn builder() -> SurfaceConfigBuilder {
        SurfaceConfigBuilder::default()
    }

    fn launch_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.extra_args.len() + 2);
        if !self.sandbox {
            args.push("--no-sandbox".to_string());
        }
        if let Some(ua) = &self.user_agent {
            args.push(format!("--user-agent={}", ua));
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// Builder for [`SurfaceConfig`]
#[derive(Default)]
pub struct SurfaceConfigBuilder {
    config: SurfaceConfig,
}

impl SurfaceConfigBuilder {
    /// Hide or show the window
    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    /// Window size in pixels
    pub fn window(mut self, width: u32, height: u32) -> Self {
        self.config.window = (width, height);
        self
    }

    /// Run Chromium without its sandbox
    pub fn no_sandbox(mut self) -> Self {
        self.config.sandbox = false;
        self
    }

    /// Override the user agent
    pub fn user_agent<S: Into<String>>(mut self, ua: S) -> Self {
        self.config.user_agent = Some(ua.into());
        self
    }

    /// Limit the wait for the editor navigation to commit
    pub fn commit_timeout(mut self, timeout: Duration) -> Self {
        self.config.commit_timeout = timeout;
        self
    }

    /// Use a specific Chromium binary
    pub fn chrome_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    /// Append a raw Chromium argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.config.extra_args.push(arg.into());
        self
    }

    /// Finish
    pub fn build(self) -> SurfaceConfig {
        self.config
    }
}

/// Launches Chromium and opens editor surfaces on it
pub struct BrowserController {
    browser: Browser,
    handler: JoinHandle<()>,
    config: SurfaceConfig,
    opened: AtomicUsize,
}

impl BrowserController {
    /// Launch a browser with default config
    #[instrument]
    pub async fn new() -> Result<Self> {
        Self::with_config(SurfaceConfig::default()).await
    }

    /// Launch a browser with custom config
    #[instrument(skip(config))]
    pub async fn with_config(config: SurfaceConfig) -> Result<Self> {
        info!(
            "Launching browser with config: headless={}",
            config.headless
        );

        let (width, height) = config.window;
        let mut builder = CdpBrowserConfig::builder()
            .viewport(chromiumoxide::handler::viewport::Viewport {
                width,
                height,
                device_scale_factor: None,
                emulating_mobile: false,
                is_landscape: true,
                has_touch: false,
            })
            .window_size(width, height)
            .args(config.launch_args());

        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &config.chrome_path {
            builder = builder.chrome_executable(path);
        }

        let cdp_config = builder
            .build()
            .map_err(|e| SurfaceError::ConfigError(e.to_string()))?;

        let (browser, mut handler) = Browser::launch(cdp_config)
            .await
            .map_err(|e| SurfaceError::LaunchFailed(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    warn!("Browser handler event error");
                    break;
                }
            }
            debug!("Browser handler finished");
        });

        info!("Browser launched successfully");

        Ok(Self {
            browser,
            handler: handler_task,
            config,
            opened: AtomicUsize::new(0),
        })
    }

    /// Get the surface configuration
    pub fn config(&self) -> &SurfaceConfig {
        &self.config
    }

    /// Number of surfaces opened so far
    pub fn surfaces_opened(&self) -> usize {
        self.opened.load(Ordering::Relaxed)
    }

    /// Close the browser
    #[instrument(skip(self))]
    pub async fn close(mut self) -> Result<()> {
        info!("Closing browser");

        self.browser
            .close()
            .await
            .map_err(|e| Error::cdp(e.to_string()))?;

        let _ = tokio::time::timeout(Duration::from_secs(5), self.handler).await;

        info!("Browser closed");
        Ok(())
    }
}

#[async_trait]
impl SurfaceProvider for BrowserController {
    #[instrument(skip(self, events))]
    async fn open(&self, events: SurfaceEventSender) -> Result<Arc<dyn ContentSurface>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| SurfaceError::PageCreationFailed(e.to_string()))?;

        let surface = ChromiumSurface::attach(page, events, self.config.commit_timeout).await?;
        self.opened.fetch_add(1, Ordering::Relaxed);
        debug!("Opened editor surface");

        Ok(Arc::new(surface))
    }
}

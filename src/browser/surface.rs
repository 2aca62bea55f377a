//! Chromium page as a content surface
//!
//! Channels map to `Runtime.addBinding`: the page calls `window.<name>(text)`
//! and the browser emits `Runtime.bindingCalled`. User scripts map to
//! `Page.addScriptToEvaluateOnNewDocument`. Main-frame `Page.frameNavigated`
//! is the commit event.

use crate::auth::AuthenticatedRequest;
use crate::bridge::{ContentSurface, InboundMessage, SurfaceEvent, SurfaceEventSender, UserScriptId};
use crate::error::{Error, Result, SurfaceError};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{
    CookieParam, Headers, SetExtraHttpHeadersParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, EventFrameNavigated, NavigateParams,
    RemoveScriptToEvaluateOnNewDocumentParams, ScriptIdentifier,
};
use chromiumoxide::cdp::js_protocol::runtime::{
    AddBindingParams, EventBindingCalled, RemoveBindingParams,
};
use chromiumoxide::Page;
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// A Chromium page driven over the DevTools protocol
pub struct ChromiumSurface {
    page: Page,
    events: SurfaceEventSender,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    committed: Arc<AtomicBool>,
    disposed: AtomicBool,
    commit_timeout: Duration,
}

impl ChromiumSurface {
    /// Wrap a page and start forwarding its events to `events`
    pub async fn attach(
        page: Page,
        events: SurfaceEventSender,
        commit_timeout: Duration,
    ) -> Result<Self> {
        let committed = Arc::new(AtomicBool::new(false));

        let mut bindings = page.event_listener::<EventBindingCalled>().await?;
        let binding_tx = events.clone();
        let binding_task = tokio::spawn(async move {
            while let Some(event) = bindings.next().await {
                let message = InboundMessage::new(event.name.clone(), event.payload.clone());
                if binding_tx.send(SurfaceEvent::Message(message)).is_err() {
                    break;
                }
            }
            debug!("Binding listener finished");
        });

        let mut navigations = page.event_listener::<EventFrameNavigated>().await?;
        let navigation_tx = events.clone();
        let navigation_committed = Arc::clone(&committed);
        let navigation_task = tokio::spawn(async move {
            while let Some(event) = navigations.next().await {
                if event.frame.parent_id.is_some() || event.frame.url == "about:blank" {
                    continue;
                }
                navigation_committed.store(true, Ordering::Release);
                let url = event.frame.url.clone();
                if navigation_tx
                    .send(SurfaceEvent::NavigationCommitted { url })
                    .is_err()
                {
                    break;
                }
            }
            debug!("Navigation listener finished");
        });

        Ok(Self {
            page,
            events,
            tasks: Mutex::new(vec![binding_task, navigation_task]),
            committed,
            disposed: AtomicBool::new(false),
            commit_timeout,
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(SurfaceError::Disposed.into());
        }
        Ok(())
    }

    async fn install_credentials(&self, request: &AuthenticatedRequest) -> Result<()> {
        let url = request.url().as_str();

        let mut cookies = Vec::with_capacity(request.cookies().len());
        for cookie in request.cookies() {
            let mut builder = CookieParam::builder()
                .name(cookie.name.clone())
                .value(cookie.value.clone())
                .secure(cookie.secure)
                .http_only(cookie.http_only);
            builder = match &cookie.domain {
                Some(domain) => builder.domain(domain.clone()),
                None => builder.url(url),
            };
            if let Some(path) = &cookie.path {
                builder = builder.path(path.clone());
            }
            cookies.push(builder.build().map_err(Error::cdp)?);
        }
        if !cookies.is_empty() {
            self.page.set_cookies(cookies).await?;
        }

        if !request.headers().is_empty() {
            let mut headers = Map::new();
            for (name, value) in request.headers() {
                let value = value
                    .to_str()
                    .map_err(|e| Error::cdp(format!("header {} is not text: {}", name, e)))?;
                headers.insert(name.as_str().to_string(), Value::String(value.to_string()));
            }
            self.page
                .execute(SetExtraHttpHeadersParams::new(Headers::new(Value::Object(
                    headers,
                ))))
                .await?;
        }

        Ok(())
    }

    fn spawn_commit_watchdog(&self) {
        let committed = Arc::clone(&self.committed);
        let events = self.events.clone();
        let timeout = self.commit_timeout;
        let task = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if !committed.load(Ordering::Acquire) {
                let _ = events.send(SurfaceEvent::LoadFailed {
                    reason: SurfaceError::Timeout(timeout).to_string(),
                });
            }
        });
        self.tasks.lock().push(task);
    }
}

#[async_trait]
impl ContentSurface for ChromiumSurface {
    #[instrument(skip(self, request), fields(url = %request.url()))]
    async fn load(&self, request: &AuthenticatedRequest) -> Result<()> {
        self.ensure_open()?;
        self.install_credentials(request).await?;

        info!("Loading editor");
        self.committed.store(false, Ordering::Release);
        self.spawn_commit_watchdog();

        let response = self
            .page
            .execute(NavigateParams::new(request.url().as_str()))
            .await
            .map_err(|e| SurfaceError::NavigationFailed(e.to_string()))?;

        if let Some(error) = &response.result.error_text {
            return Err(SurfaceError::NavigationFailed(error.clone()).into());
        }
        Ok(())
    }

    async fn add_user_script(&self, source: &str) -> Result<UserScriptId> {
        self.ensure_open()?;
        let params = AddScriptToEvaluateOnNewDocumentParams::builder()
            .source(source)
            .build()
            .map_err(|e| Error::cdp(format!("Failed to build script params: {}", e)))?;

        let response = self
            .page
            .execute(params)
            .await
            .map_err(|e| Error::cdp(format!("Failed to inject script: {}", e)))?;

        Ok(UserScriptId(response.result.identifier.inner().clone()))
    }

    async fn remove_user_script(&self, id: &UserScriptId) -> Result<()> {
        self.ensure_open()?;
        self.page
            .execute(RemoveScriptToEvaluateOnNewDocumentParams::new(
                ScriptIdentifier::new(id.0.clone()),
            ))
            .await?;
        Ok(())
    }

    async fn add_channel(&self, name: &str) -> Result<()> {
        self.ensure_open()?;
        self.page.execute(AddBindingParams::new(name)).await?;
        Ok(())
    }

    async fn remove_channel(&self, name: &str) -> Result<()> {
        self.ensure_open()?;
        self.page.execute(RemoveBindingParams::new(name)).await?;
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Option<String>> {
        self.ensure_open()?;
        let result = self.page.evaluate_expression(script).await?;
        Ok(match result.value() {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        })
    }

    #[instrument(skip(self))]
    async fn dispose(&self) -> Result<()> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        for task in self.tasks.lock().drain(..) {
            task.abort();
        }

        if let Err(e) = self.page.clone().close().await {
            warn!("Failed to close page: {}", e);
        }
        debug!("Surface disposed");
        Ok(())
    }
}

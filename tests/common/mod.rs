//! In-memory content surface for integration tests
//!
//! Records every command it receives and lets a test play the page side by
//! pushing events into the channel the session opened it with.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use webedit_bridge::auth::AuthenticatedRequest;
use webedit_bridge::bridge::{
    ContentSurface, InboundMessage, SurfaceEvent, SurfaceEventSender, SurfaceProvider,
    UserScriptId,
};
use webedit_bridge::error::{Error, Result};

/// Substring only the extraction payload contains
pub const EXTRACTION_MARKER: &str = "wp.blocks.serialize";

/// Substring only the style payload contains
pub const STYLE_MARKER: &str = "webedit-injected-style";

#[derive(Debug, Default, Clone)]
pub struct Recorded {
    pub loads: Vec<Url>,
    pub channels: Vec<String>,
    pub removed_channels: Vec<String>,
    pub user_scripts: Vec<(UserScriptId, String)>,
    pub removed_scripts: Vec<UserScriptId>,
    pub evaluations: Vec<String>,
    pub disposed: bool,
}

#[derive(Default)]
pub struct FakeSurface {
    recorded: Mutex<Recorded>,
    next_script: AtomicUsize,
    failing: Mutex<Vec<(String, usize)>>,
    fail_load: AtomicBool,
    fail_removals: AtomicBool,
    refused_channel: Mutex<Option<String>>,
}

impl FakeSurface {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn recorded(&self) -> Recorded {
        self.recorded.lock().clone()
    }

    /// Fail the next `times` evaluations of scripts containing `marker`
    pub fn fail_evaluations(&self, marker: &str, times: usize) {
        self.failing.lock().push((marker.to_string(), times));
    }

    pub fn fail_load(&self) {
        self.fail_load.store(true, Ordering::SeqCst);
    }

    /// Refuse to add the channel called `name`
    pub fn refuse_channel(&self, name: &str) {
        *self.refused_channel.lock() = Some(name.to_string());
    }

    pub fn accept_all_channels(&self) {
        *self.refused_channel.lock() = None;
    }

    pub fn fail_removals(&self) {
        self.fail_removals.store(true, Ordering::SeqCst);
    }

    pub fn evaluations_of(&self, marker: &str) -> usize {
        self.recorded
            .lock()
            .evaluations
            .iter()
            .filter(|s| s.contains(marker))
            .count()
    }

    /// Poll until `count` evaluations of `marker` were seen
    pub async fn wait_for_evaluations(&self, marker: &str, count: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while self.evaluations_of(marker) < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("evaluation never happened");
    }

    fn should_fail(&self, script: &str) -> bool {
        let mut failing = self.failing.lock();
        for (marker, remaining) in failing.iter_mut() {
            if *remaining > 0 && script.contains(marker.as_str()) {
                *remaining -= 1;
                return true;
            }
        }
        false
    }
}

#[async_trait]
impl ContentSurface for FakeSurface {
    async fn load(&self, request: &AuthenticatedRequest) -> Result<()> {
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(Error::generic("load refused"));
        }
        self.recorded.lock().loads.push(request.url().clone());
        Ok(())
    }

    async fn add_user_script(&self, source: &str) -> Result<UserScriptId> {
        let id = UserScriptId(format!(
            "script-{}",
            self.next_script.fetch_add(1, Ordering::SeqCst)
        ));
        self.recorded
            .lock()
            .user_scripts
            .push((id.clone(), source.to_string()));
        Ok(id)
    }

    async fn remove_user_script(&self, id: &UserScriptId) -> Result<()> {
        self.recorded.lock().removed_scripts.push(id.clone());
        if self.fail_removals.load(Ordering::SeqCst) {
            return Err(Error::generic("removal refused"));
        }
        Ok(())
    }

    async fn add_channel(&self, name: &str) -> Result<()> {
        if self.refused_channel.lock().as_deref() == Some(name) {
            return Err(Error::generic("binding refused"));
        }
        self.recorded.lock().channels.push(name.to_string());
        Ok(())
    }

    async fn remove_channel(&self, name: &str) -> Result<()> {
        self.recorded.lock().removed_channels.push(name.to_string());
        if self.fail_removals.load(Ordering::SeqCst) {
            return Err(Error::generic("removal refused"));
        }
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Option<String>> {
        self.recorded.lock().evaluations.push(script.to_string());
        if self.should_fail(script) {
            return Err(Error::generic("script threw"));
        }
        Ok(None)
    }

    async fn dispose(&self) -> Result<()> {
        self.recorded.lock().disposed = true;
        Ok(())
    }
}

/// Hands out one shared [`FakeSurface`] and keeps the event sender
#[derive(Default)]
pub struct FakeProvider {
    pub surface: Arc<FakeSurface>,
    events: Mutex<Option<SurfaceEventSender>>,
    opened: AtomicUsize,
}

impl FakeProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            surface: FakeSurface::new(),
            events: Mutex::new(None),
            opened: AtomicUsize::new(0),
        })
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn send(&self, event: SurfaceEvent) {
        if let Some(tx) = self.events.lock().as_ref() {
            let _ = tx.send(event);
        }
    }

    pub fn commit(&self) {
        self.send(SurfaceEvent::NavigationCommitted {
            url: "https://example.com/wp-admin/post-new.php".to_string(),
        });
    }

    pub fn post(&self, name: &str, payload: &str) {
        self.send(SurfaceEvent::Message(InboundMessage::new(name, payload)));
    }
}

#[async_trait]
impl SurfaceProvider for FakeProvider {
    async fn open(&self, events: SurfaceEventSender) -> Result<Arc<dyn ContentSurface>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        *self.events.lock() = Some(events);
        Ok(self.surface.clone())
    }
}

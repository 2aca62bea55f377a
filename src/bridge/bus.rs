//! Message bus between the host and the editor page
//!
//! The bus owns every channel and user script it installs on a surface, routes
//! inbound page messages to handlers, and removes all of it on teardown.
//! After teardown, messages are dropped and evaluations are refused.

use crate::bridge::channel::{ChannelName, InboundMessage};
use crate::bridge::scripts::{InjectionPayload, InjectionPoint};
use crate::bridge::surface::{ContentSurface, UserScriptId};
use crate::error::{BridgeError, Error, Result};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument, trace, warn};

/// What the session should do after a message was handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    /// Keep the session running
    Continue,
    /// The page delivered the final content; close the session
    Complete(String),
}

/// Receives messages on registered channels
pub trait MessageHandler: Send {
    /// Handle one payload
    fn handle(&mut self, channel: ChannelName, payload: String) -> Flow;
}

impl<F> MessageHandler for F
where
    F: FnMut(ChannelName, String) -> Flow + Send,
{
    fn handle(&mut self, channel: ChannelName, payload: String) -> Flow {
        self(channel, payload)
    }
}

type SharedHandler = Arc<Mutex<Box<dyn MessageHandler>>>;

/// Runs payloads in the surface without borrowing the bus
///
/// Cloned into background tasks. Once the bus is torn down every evaluation
/// fails with [`BridgeError::TornDown`] instead of touching the surface.
#[derive(Clone)]
pub struct ScriptEvaluator {
    surface: Arc<dyn ContentSurface>,
    alive: Arc<AtomicBool>,
}

impl ScriptEvaluator {
    /// Evaluate a payload
    #[instrument(skip(self, payload), fields(script = payload.name))]
    pub async fn evaluate(&self, payload: &InjectionPayload) -> Result<Option<String>> {
        if !self.alive.load(Ordering::Acquire) {
            return Err(BridgeError::TornDown.into());
        }

        match self.surface.evaluate(&payload.source).await {
            Ok(value) => {
                trace!(?value, "Evaluation finished");
                Ok(value)
            }
            Err(e) => Err(BridgeError::ScriptEvaluationFailed {
                script: payload.name.to_string(),
                cause: e.to_string(),
            }
            .into()),
        }
    }
}

/// Channel registrations and injected scripts of one session
pub struct MessageBus {
    surface: Arc<dyn ContentSurface>,
    handlers: HashMap<ChannelName, SharedHandler>,
    user_scripts: Vec<UserScriptId>,
    alive: Arc<AtomicBool>,
}

impl MessageBus {
    /// Create a bus over a surface
    pub fn new(surface: Arc<dyn ContentSurface>) -> Self {
        Self {
            surface,
            handlers: HashMap::new(),
            user_scripts: Vec::new(),
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Whether teardown has run
    pub fn is_torn_down(&self) -> bool {
        !self.alive.load(Ordering::Acquire)
    }

    /// Whether a channel currently has a receiver
    pub fn is_registered(&self, channel: ChannelName) -> bool {
        self.handlers.contains_key(&channel)
    }

    /// Number of user scripts this bus installed
    pub fn user_script_count(&self) -> usize {
        self.user_scripts.len()
    }

    /// Install a receiver for each channel, all routed to `handler`
    ///
    /// Fails with [`BridgeError::ChannelAlreadyRegistered`] if any channel
    /// already has a receiver (or appears twice in `channels`); nothing is
    /// installed in that case. If the surface rejects a channel, the ones
    /// added before it are removed again and the surface error is returned.
    #[instrument(skip(self, handler))]
    pub async fn register_channels<H>(&mut self, channels: &[ChannelName], handler: H) -> Result<()>
    where
        H: MessageHandler + 'static,
    {
        if self.is_torn_down() {
            return Err(BridgeError::TornDown.into());
        }

        let mut seen = HashSet::new();
        for channel in channels {
            if self.handlers.contains_key(channel) || !seen.insert(*channel) {
                return Err(BridgeError::ChannelAlreadyRegistered(channel.to_string()).into());
            }
        }

        let boxed: Box<dyn MessageHandler> = Box::new(handler);
        let shared: SharedHandler = Arc::new(Mutex::new(boxed));
        for (added, channel) in channels.iter().enumerate() {
            if let Err(e) = self.surface.add_channel(channel.as_str()).await {
                self.unregister(&channels[..added]).await;
                return Err(e);
            }
            self.handlers.insert(*channel, Arc::clone(&shared));
            debug!(%channel, "Registered channel");
        }

        Ok(())
    }

    /// Undo a partially applied registration
    async fn unregister(&mut self, channels: &[ChannelName]) {
        for channel in channels {
            self.handlers.remove(channel);
            if let Err(e) = self.surface.remove_channel(channel.as_str()).await {
                warn!(%channel, "Failed to roll back channel: {}", e);
            }
        }
    }

    /// Register a before-load payload with the surface
    #[instrument(skip(self, payload), fields(script = payload.name))]
    pub async fn inject_user_script(&mut self, payload: &InjectionPayload) -> Result<()> {
        if self.is_torn_down() {
            return Err(BridgeError::TornDown.into());
        }
        if payload.point != InjectionPoint::BeforeLoad {
            return Err(Error::generic(format!(
                "{} is not a before-load payload",
                payload.name
            )));
        }

        let id = self.surface.add_user_script(&payload.source).await?;
        debug!(id = %id.0, "Injected user script");
        self.user_scripts.push(id);
        Ok(())
    }

    /// Route one inbound message
    ///
    /// Unknown channel names, unregistered channels and anything arriving
    /// after teardown are dropped without calling a handler.
    pub fn dispatch(&self, message: InboundMessage) -> Flow {
        if self.is_torn_down() {
            trace!(name = %message.name, "Dropping message after teardown");
            return Flow::Continue;
        }

        let channel = match message.channel() {
            Some(channel) => channel,
            None => {
                debug!(name = %message.name, "Dropping message on unknown channel");
                return Flow::Continue;
            }
        };

        match self.handlers.get(&channel) {
            Some(handler) => handler.lock().handle(channel, message.payload),
            None => {
                debug!(%channel, "Dropping message on unregistered channel");
                Flow::Continue
            }
        }
    }

    /// Evaluate a payload in the surface
    pub async fn evaluate(&self, payload: &InjectionPayload) -> Result<Option<String>> {
        self.evaluator().evaluate(payload).await
    }

    /// Evaluator handle for running payloads off the session loop
    pub fn evaluator(&self) -> ScriptEvaluator {
        ScriptEvaluator {
            surface: Arc::clone(&self.surface),
            alive: Arc::clone(&self.alive),
        }
    }

    /// Remove every channel and user script this bus installed
    ///
    /// Best effort: surface failures are logged and the remaining items are
    /// still removed. Calling it again is a no-op.
    #[instrument(skip(self))]
    pub async fn teardown(&mut self) {
        if self.alive.swap(false, Ordering::AcqRel) {
            let mut channels: Vec<ChannelName> = self.handlers.keys().copied().collect();
            channels.sort_by_key(|c| c.as_str());
            self.handlers.clear();

            for channel in channels {
                if let Err(e) = self.surface.remove_channel(channel.as_str()).await {
                    warn!(%channel, "Failed to remove channel: {}", e);
                }
            }

            for id in self.user_scripts.drain(..) {
                if let Err(e) = self.surface.remove_user_script(&id).await {
                    warn!(id = %id.0, "Failed to remove user script: {}", e);
                }
            }

            debug!("Message bus torn down");
        } else {
            debug!("Message bus already torn down");
        }
    }
}

impl Drop for MessageBus {
    fn drop(&mut self) {
        if !self.is_torn_down() {
            warn!(
                channels = self.handlers.len(),
                "Message bus dropped without teardown"
            );
        }
    }
}

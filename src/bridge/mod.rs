//! Host/page messaging bridge
//!
//! This module holds the pieces every session is built from: the closed set
//! of channels, the script payload catalog, the [`ContentSurface`] seam and
//! the [`MessageBus`] that ties them together.

pub mod bus;
pub mod channel;
pub mod scripts;
pub mod surface;

pub use bus::{Flow, MessageBus, MessageHandler, ScriptEvaluator};
pub use channel::{ChannelName, InboundMessage};
pub use scripts::{InjectionPayload, InjectionPoint, ScriptCatalog};
pub use surface::{
    ContentSurface, SurfaceEvent, SurfaceEventReceiver, SurfaceEventSender, SurfaceProvider,
    UserScriptId,
};

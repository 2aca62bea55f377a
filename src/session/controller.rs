//! Editor session orchestration
//!
//! [`EditorSessionController::start`] authenticates the editor request, opens
//! a surface, installs the bridge and starts the load. Everything after that
//! runs on one spawned task that owns the surface and the [`MessageBus`]:
//! surface events, host commands and evaluation results are funneled into it
//! and handled one at a time.
//!
//! ```text
//! Idle ──auth──▶ Loading ──commit──▶ Ready ──save──▶ Extracting ──htmlPostContent──▶ Closed
//!                   │                  ▲                 │
//!                   │                  └─failed/commit───┘
//!                   └───────────── cancel (from any state) ─────────────────────────▶ Closed
//! ```

use crate::auth::{AuthenticatingRequestBuilder, RequestAuthenticator};
use crate::bridge::{
    ChannelName, ContentSurface, Flow, InboundMessage, MessageBus, ScriptCatalog, SurfaceEvent,
    SurfaceEventReceiver, SurfaceProvider,
};
use crate::error::{BridgeError, Error, Result, SessionError, SurfaceError};
use crate::session::config::SessionConfig;
use crate::session::state::SessionState;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{AbortHandle, JoinError, JoinSet};
use tracing::{debug, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

/// Completion callback, invoked at most once with the saved content
pub type OnSave = Box<dyn FnOnce(String) + Send>;

/// How a session ended
#[derive(Debug)]
pub enum SessionOutcome {
    /// The page delivered content and the callback ran
    Saved(String),
    /// The host cancelled; the callback never ran
    Cancelled,
    /// The session could not continue
    Failed(Error),
}

impl SessionOutcome {
    /// Saved content, if any
    pub fn content(&self) -> Option<&str> {
        match self {
            SessionOutcome::Saved(content) => Some(content),
            _ => None,
        }
    }
}

enum Command {
    Save(oneshot::Sender<Result<()>>),
    Cancel,
}

enum Evaluation {
    Style(Result<Option<String>>),
    Extraction(Result<Option<String>>),
}

/// Builds and starts editor sessions
pub struct EditorSessionController {
    config: SessionConfig,
    authenticator: Arc<dyn RequestAuthenticator>,
    provider: Arc<dyn SurfaceProvider>,
    on_save: Option<OnSave>,
}

impl EditorSessionController {
    /// Create a controller
    pub fn new(
        config: SessionConfig,
        authenticator: Arc<dyn RequestAuthenticator>,
        provider: Arc<dyn SurfaceProvider>,
    ) -> Self {
        Self {
            config,
            authenticator,
            provider,
            on_save: None,
        }
    }

    /// Register the completion callback
    pub fn on_save<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(String) + Send + 'static,
    {
        self.on_save = Some(Box::new(callback));
        self
    }

    /// Authenticate, open the surface, install the bridge and start loading
    ///
    /// Fails with `AuthenticationUnavailable` before any surface is opened if
    /// no credentials can be produced. Any later setup failure tears down
    /// what was installed and disposes the surface before returning.
    #[instrument(skip(self), fields(url = %self.config.request_target))]
    pub async fn start(self) -> Result<SessionHandle> {
        let id = Uuid::new_v4();
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);

        let request = match AuthenticatingRequestBuilder::build(
            &self.config.request_target,
            self.authenticator.as_ref(),
        )
        .await
        {
            Ok(request) => request,
            Err(e) => {
                warn!(%id, "Session not opened: {}", e);
                let _ = state_tx.send(SessionState::Closed);
                return Err(e);
            }
        };

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let surface = self.provider.open(events_tx).await?;
        let mut bus = MessageBus::new(Arc::clone(&surface));

        if let Err(e) = install_bridge(&mut bus, &self.config).await {
            shutdown(&mut bus, surface.as_ref()).await;
            return Err(e);
        }

        let _ = state_tx.send(SessionState::Loading);
        if let Err(e) = surface.load(&request).await {
            shutdown(&mut bus, surface.as_ref()).await;
            let _ = state_tx.send(SessionState::Closed);
            return Err(e);
        }
        info!(%id, "Editor session loading");

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = oneshot::channel();

        let actor = SessionActor {
            state: SessionState::Loading,
            state_tx,
            bus,
            surface,
            events: events_rx,
            commands: command_rx,
            evaluations: JoinSet::new(),
            extraction: None,
            pending_saves: Vec::new(),
            save_queued: false,
            on_save: self.on_save,
            inject_style: self.config.inject_style,
        };

        let span = info_span!("editor_session", %id);
        tokio::spawn(
            async move {
                let outcome = actor.run().await;
                let _ = outcome_tx.send(outcome);
            }
            .instrument(span),
        );

        Ok(SessionHandle {
            id,
            commands: command_tx,
            state: state_rx,
            outcome: outcome_rx,
        })
    }
}

async fn install_bridge(bus: &mut MessageBus, config: &SessionConfig) -> Result<()> {
    if config.forward_page_logs {
        bus.inject_user_script(&ScriptCatalog::logging_shim()).await?;
    }
    if !config.content.is_empty() {
        bus.inject_user_script(&ScriptCatalog::seed_content(&config.content))
            .await?;
    }

    let forward_logs = config.forward_page_logs;
    bus.register_channels(
        ScriptCatalog::channels(),
        move |channel: ChannelName, payload: String| match channel {
            ChannelName::Log => {
                if forward_logs {
                    info!(target: "webedit::page", "{}", payload);
                }
                Flow::Continue
            }
            ChannelName::HtmlPostContent => Flow::Complete(payload),
        },
    )
    .await
}

/// Teardown always precedes disposal
async fn shutdown(bus: &mut MessageBus, surface: &dyn ContentSurface) {
    bus.teardown().await;
    if let Err(e) = surface.dispose().await {
        warn!("Failed to dispose surface: {}", e);
    }
}

/// Host-side handle to a running session
pub struct SessionHandle {
    id: Uuid,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SessionState>,
    outcome: oneshot::Receiver<SessionOutcome>,
}

impl SessionHandle {
    /// Session id, as used in log spans
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Ask the page for its content
    ///
    /// Resolves once the extraction script has been evaluated; the content
    /// itself arrives later through the callback and [`finished`](Self::finished).
    /// A save issued while loading waits for the commit. A save issued while
    /// an extraction is being evaluated shares its result; once that settled
    /// without content, another save runs the script again. If evaluation
    /// fails the session returns to `Ready` and the save can be retried.
    pub async fn save(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Save(reply_tx))
            .map_err(|_| SessionError::Closed)?;
        reply_rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Close without saving. The callback will not run.
    pub fn cancel(&self) {
        if self.commands.send(Command::Cancel).is_err() {
            debug!(id = %self.id, "Cancel on closed session");
        }
    }

    /// Wait until the session reaches `target`
    ///
    /// Fails with [`SessionError::Closed`] if the session closes first.
    pub async fn wait_for(&mut self, target: SessionState) -> Result<()> {
        let state = *self
            .state
            .wait_for(|s| *s == target || s.is_closed())
            .await
            .map_err(|_| SessionError::Closed)?;
        if state == target {
            Ok(())
        } else {
            Err(SessionError::Closed.into())
        }
    }

    /// Wait for the session to end
    pub async fn finished(self) -> SessionOutcome {
        self.outcome
            .await
            .unwrap_or_else(|_| SessionOutcome::Failed(SessionError::Closed.into()))
    }
}

struct SessionActor {
    state: SessionState,
    state_tx: watch::Sender<SessionState>,
    bus: MessageBus,
    surface: Arc<dyn ContentSurface>,
    events: SurfaceEventReceiver,
    commands: mpsc::UnboundedReceiver<Command>,
    evaluations: JoinSet<Evaluation>,
    extraction: Option<AbortHandle>,
    pending_saves: Vec<oneshot::Sender<Result<()>>>,
    save_queued: bool,
    on_save: Option<OnSave>,
    inject_style: bool,
}

impl SessionActor {
    async fn run(mut self) -> SessionOutcome {
        loop {
            let step = tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Save(reply)) => self.on_save_requested(reply),
                    Some(Command::Cancel) => Some(SessionOutcome::Cancelled),
                    None => {
                        debug!("Session handle dropped");
                        Some(SessionOutcome::Cancelled)
                    }
                },
                event = self.events.recv() => match event {
                    Some(event) => self.on_surface_event(event),
                    None => Some(SessionOutcome::Failed(SurfaceError::Disposed.into())),
                },
                Some(joined) = self.evaluations.join_next() => self.on_evaluation(joined),
            };

            if let Some(outcome) = step {
                return self.close(outcome).await;
            }
        }
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "Session state");
            self.state = state;
            let _ = self.state_tx.send(state);
        }
    }

    fn on_save_requested(&mut self, reply: oneshot::Sender<Result<()>>) -> Option<SessionOutcome> {
        if self.extraction.is_some() {
            debug!("Save joins the extraction in flight");
            self.pending_saves.push(reply);
        } else if self.state.can_extract() {
            self.pending_saves.push(reply);
            self.start_extraction();
        } else if self.state == SessionState::Loading {
            debug!("Save queued until the page commits");
            self.pending_saves.push(reply);
            self.save_queued = true;
        } else {
            let _ = reply.send(Err(SessionError::InvalidState {
                operation: "save",
                state: self.state.to_string(),
            }
            .into()));
        }
        None
    }

    fn on_surface_event(&mut self, event: SurfaceEvent) -> Option<SessionOutcome> {
        match event {
            SurfaceEvent::NavigationCommitted { url } => {
                debug!(%url, "Navigation committed");
                if self.inject_style {
                    self.spawn_style_injection();
                }
                match self.state {
                    SessionState::Loading => {
                        self.set_state(SessionState::Ready);
                        if std::mem::take(&mut self.save_queued) {
                            self.start_extraction();
                        }
                    }
                    // A reload discards whatever the old document was extracting
                    SessionState::Extracting => self.set_state(SessionState::Ready),
                    _ => {}
                }
                None
            }
            SurfaceEvent::LoadFailed { reason } => {
                if self.state == SessionState::Loading {
                    Some(SessionOutcome::Failed(SessionError::LoadFailed(reason).into()))
                } else {
                    warn!(%reason, "Load failure after commit");
                    None
                }
            }
            SurfaceEvent::Message(message) => self.on_message(message),
        }
    }

    fn on_message(&mut self, message: InboundMessage) -> Option<SessionOutcome> {
        match self.bus.dispatch(message) {
            Flow::Continue => None,
            Flow::Complete(content) => {
                info!(bytes = content.len(), "Received post content");
                if let Some(callback) = self.on_save.take() {
                    callback(content.clone());
                }
                for reply in self.pending_saves.drain(..) {
                    let _ = reply.send(Ok(()));
                }
                Some(SessionOutcome::Saved(content))
            }
        }
    }

    fn on_evaluation(
        &mut self,
        joined: std::result::Result<Evaluation, JoinError>,
    ) -> Option<SessionOutcome> {
        match joined {
            Ok(Evaluation::Style(Ok(_))) => debug!("Style injected"),
            Ok(Evaluation::Style(Err(e))) => warn!("Style injection failed: {}", e),
            Ok(Evaluation::Extraction(Ok(_))) => {
                self.extraction = None;
                debug!("Extraction script evaluated, waiting for content");
                for reply in self.pending_saves.drain(..) {
                    let _ = reply.send(Ok(()));
                }
            }
            Ok(Evaluation::Extraction(Err(e))) => {
                warn!("Extraction failed: {}", e);
                match e {
                    Error::Bridge(BridgeError::ScriptEvaluationFailed { script, cause }) => {
                        self.extraction_failed(script, cause)
                    }
                    other => self.extraction_failed(
                        ScriptCatalog::html_post_content().name.to_string(),
                        other.to_string(),
                    ),
                }
            }
            Err(e) => {
                warn!("Evaluation task ended abnormally: {}", e);
                if self.extraction.as_ref().is_some_and(AbortHandle::is_finished) {
                    self.extraction_failed(
                        ScriptCatalog::html_post_content().name.to_string(),
                        e.to_string(),
                    );
                }
            }
        }
        None
    }

    /// Back to `Ready` so the save can be retried
    fn extraction_failed(&mut self, script: String, cause: String) {
        self.extraction = None;
        if self.state == SessionState::Extracting {
            self.set_state(SessionState::Ready);
        }
        for reply in self.pending_saves.drain(..) {
            let _ = reply.send(Err(BridgeError::ScriptEvaluationFailed {
                script: script.clone(),
                cause: cause.clone(),
            }
            .into()));
        }
    }

    fn start_extraction(&mut self) {
        self.set_state(SessionState::Extracting);
        let evaluator = self.bus.evaluator();
        self.extraction = Some(self.evaluations.spawn(async move {
            Evaluation::Extraction(
                evaluator
                    .evaluate(&ScriptCatalog::html_post_content())
                    .await,
            )
        }));
    }

    fn spawn_style_injection(&mut self) {
        let evaluator = self.bus.evaluator();
        self.evaluations.spawn(async move {
            Evaluation::Style(evaluator.evaluate(&ScriptCatalog::insert_css()).await)
        });
    }

    async fn close(mut self, outcome: SessionOutcome) -> SessionOutcome {
        self.evaluations.abort_all();
        shutdown(&mut self.bus, self.surface.as_ref()).await;
        self.set_state(SessionState::Closed);

        for reply in self.pending_saves.drain(..) {
            let _ = reply.send(Err(SessionError::Closed.into()));
        }

        match &outcome {
            SessionOutcome::Saved(_) => info!("Session closed after save"),
            SessionOutcome::Cancelled => info!("Session cancelled"),
            SessionOutcome::Failed(e) => warn!("Session failed: {}", e),
        }
        outcome
    }
}

//! Dialogue session
//!
//! Owns one [`DialogueMachine`] and runs it against a speech adapter and a
//! completion service. All inputs (adapter events, finished requests) arrive on
//! a single queue and are processed one at a time.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::completion::{CompletionService, OllamaClient};
use crate::config::Config;
use crate::dialogue::machine::{DialogueContext, DialogueMachine, DialogueState, Effect, Event};
use crate::speech::{self, EventSink, SpeechAdapter, SpeechBackend};
use crate::transcript::Turn;
use crate::{Error, Result};

/// Per-session settings
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Model the completion service is configured for; checked against the catalog
    pub model: Option<String>,
    /// Drop recognitions below this confidence
    pub min_confidence: Option<f32>,
}

/// Observable session state, published after every processed event
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    /// Active state
    pub state: DialogueState,
    /// Transcript so far
    pub turns: Vec<Turn>,
    /// Model catalog
    pub models: Vec<String>,
}

/// Stops a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    shutdown: mpsc::Sender<()>,
}

impl SessionHandle {
    /// Ask the session to stop after the event it is processing
    pub fn stop(&self) {
        // Full or closed both mean a stop is already underway
        let _ = self.shutdown.try_send(());
    }
}

/// A single conversation
pub struct Session {
    id: Uuid,
    machine: DialogueMachine,
    completion: Arc<dyn CompletionService>,
    speech: SpeechAdapter,
    options: SessionOptions,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
    shutdown_tx: mpsc::Sender<()>,
    shutdown_rx: mpsc::Receiver<()>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    pending: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.machine.state())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session; the speech backend is built on the adapter thread
    ///
    /// Nothing happens until [`Session::run`].
    ///
    /// # Errors
    ///
    /// Returns error if the speech adapter thread cannot be started
    pub fn new<F, B>(
        completion: Arc<dyn CompletionService>,
        backend: F,
        options: SessionOptions,
    ) -> Result<Self>
    where
        F: FnOnce() -> B + Send + 'static,
        B: SpeechBackend + 'static,
    {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let adapter_tx = events_tx.clone();
        let sink = EventSink::new(move |event| {
            // Receiver is gone once the session has stopped
            let _ = adapter_tx.send(Event::Speech(event));
        });
        let speech = SpeechAdapter::spawn(backend, sink)?;

        let machine = DialogueMachine::new(DialogueContext::new(options.min_confidence));
        let (snapshot_tx, _) = watch::channel(SessionSnapshot {
            state: machine.state(),
            turns: Vec::new(),
            models: Vec::new(),
        });

        Ok(Self {
            id: Uuid::new_v4(),
            machine,
            completion,
            speech,
            options,
            events_tx,
            events_rx,
            shutdown_tx,
            shutdown_rx,
            snapshot_tx,
            pending: None,
        })
    }

    /// Create a session from configuration, using the Ollama client and the
    /// configured speech backend
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client or adapter thread cannot be created
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = OllamaClient::new(
            config.completion.endpoint.clone(),
            config.completion.model.clone(),
            config.completion.options.clone(),
            config.completion.timeout,
        )?;
        let speech_config = config.speech.clone();

        Self::new(
            Arc::new(client),
            move || speech::open_backend(&speech_config),
            SessionOptions {
                model: Some(config.completion.model.clone()),
                min_confidence: config.speech.min_confidence,
            },
        )
    }

    /// Session identifier
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Handle for stopping the session from elsewhere
    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            shutdown: self.shutdown_tx.clone(),
        }
    }

    /// Watch the session state
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Run until stopped or a fatal error occurs
    ///
    /// # Errors
    ///
    /// Returns error on adapter preparation failure, discovery failure, or if
    /// the adapter thread dies
    pub async fn run(mut self) -> Result<()> {
        let span = tracing::info_span!("session", id = %self.id);

        async move {
            tracing::info!("session started");
            let result = self.event_loop().await;

            if let Some(pending) = self.pending.take() {
                pending.abort();
            }
            match &result {
                Ok(()) => tracing::info!("session stopped"),
                Err(e) => tracing::error!(error = %e, "session failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn event_loop(&mut self) -> Result<()> {
        let effects = self.machine.start();
        self.execute(effects)?;

        loop {
            let event = tokio::select! {
                biased;
                _ = self.shutdown_rx.recv() => return Ok(()),
                event = self.events_rx.recv() => event,
            };
            let Some(event) = event else {
                return Err(Error::Session("event queue closed".to_string()));
            };
            self.process(event)?;
        }
    }

    /// Run one event to completion
    fn process(&mut self, event: Event) -> Result<()> {
        if let Event::ModelsFetched(models) = &event {
            self.check_catalog(models);
        }
        if !matches!(event, Event::Speech(_)) {
            self.pending = None;
        }

        let effects = self.machine.handle(event);
        self.publish();
        self.execute(effects)
    }

    fn check_catalog(&self, models: &[String]) {
        tracing::info!(count = models.len(), ?models, "model catalog fetched");
        if let Some(model) = &self.options.model
            && !models.iter().any(|m| m == model)
        {
            tracing::warn!(%model, "configured model not in catalog");
        }
    }

    fn publish(&self) {
        let context = self.machine.context();
        self.snapshot_tx.send_replace(SessionSnapshot {
            state: self.machine.state(),
            turns: context.transcript().turns().to_vec(),
            models: context.models().to_vec(),
        });
    }

    fn execute(&mut self, effects: Vec<Effect>) -> Result<()> {
        for effect in effects {
            match effect {
                Effect::Speech(command) => self.speech.send(command)?,
                Effect::DiscoverModels => {
                    let service = Arc::clone(&self.completion);
                    self.spawn_request(async move {
                        match service.list_models().await {
                            Ok(models) => Event::ModelsFetched(models),
                            Err(e) => Event::DiscoveryFailed(reason(e)),
                        }
                    });
                }
                Effect::Complete(messages) => {
                    let service = Arc::clone(&self.completion);
                    self.spawn_request(async move {
                        match service.complete(messages).await {
                            Ok(reply) => Event::CompletionDone(reply),
                            Err(e) => Event::CompletionFailed(reason(e)),
                        }
                    });
                }
                Effect::Fatal(fatal) => return Err(fatal.into()),
            }
        }
        Ok(())
    }

    /// Start the single outstanding request; its result comes back as an event
    fn spawn_request<Fut>(&mut self, request: Fut)
    where
        Fut: Future<Output = Event> + Send + 'static,
    {
        if let Some(previous) = self.pending.take()
            && !previous.is_finished()
        {
            tracing::warn!("replacing an unfinished request");
            previous.abort();
        }

        let events = self.events_tx.clone();
        let task = tokio::spawn(
            async move {
                let event = request.await;
                // Receiver is gone once the session has stopped
                let _ = events.send(event);
            }
            .in_current_span(),
        );
        self.pending = Some(task);
    }
}

/// Failure text without the variant prefix the session adds back later
fn reason(error: Error) -> String {
    match error {
        Error::Discovery(msg) | Error::Completion(msg) => msg,
        other => other.to_string(),
    }
}

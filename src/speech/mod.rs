//! Speech I/O adapter
//!
//! Wraps a recognition/synthesis backend behind three commands (PREPARE,
//! LISTEN, SPEAK) and reports lifecycle events back to the dialogue session.
//!
//! Backends are blocking and run on a dedicated worker thread, since audio
//! streams are not `Send`. Commands are queued to the worker; events are
//! delivered through an [`EventSink`].

pub mod audio;
pub mod console;

use std::sync::Arc;
use std::sync::mpsc;

pub use audio::AudioBackend;
pub use console::ConsoleBackend;

use crate::config::{BackendKind, SpeechConfig};
use crate::{Error, Result};

/// Command sent to the speech adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechCommand {
    /// Initialize recognition and synthesis
    Prepare,
    /// Begin recognition
    Listen,
    /// Synthesize the given utterance
    Speak(String),
}

/// One recognition hypothesis
#[derive(Debug, Clone, PartialEq)]
pub struct Hypothesis {
    /// Recognised text
    pub utterance: String,
    /// Recognizer confidence in `[0.0, 1.0]`
    pub confidence: f32,
}

impl Hypothesis {
    /// Create a hypothesis
    #[must_use]
    pub fn new(utterance: impl Into<String>, confidence: f32) -> Self {
        Self {
            utterance: utterance.into(),
            confidence,
        }
    }
}

/// Lifecycle event emitted by the speech adapter
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechEvent {
    /// PREPARE finished
    Ready,
    /// Speech was recognised; best hypothesis first
    Recognised(Vec<Hypothesis>),
    /// Listening ended without speech
    NoInput,
    /// Listening has ended
    ListenComplete,
    /// SPEAK finished
    SpeakComplete,
    /// PREPARE failed
    Failed(String),
}

/// Callback target for adapter events
#[derive(Clone)]
pub struct EventSink(Arc<dyn Fn(SpeechEvent) + Send + Sync>);

impl EventSink {
    /// Wrap a callback
    pub fn new(f: impl Fn(SpeechEvent) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Deliver an event
    pub fn emit(&self, event: SpeechEvent) {
        tracing::debug!(?event, "speech event");
        (self.0)(event);
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EventSink")
    }
}

/// Blocking speech recognition/synthesis backend
pub trait SpeechBackend {
    /// Open devices and connections
    ///
    /// # Errors
    ///
    /// Returns error if the backend cannot be initialized
    fn prepare(&mut self) -> Result<()>;

    /// Listen for one reply
    ///
    /// Emits `Recognised` and/or `NoInput` through `sink` as they occur.
    /// The adapter emits `ListenComplete` once this returns.
    ///
    /// # Errors
    ///
    /// Returns error if capture or recognition fails
    fn listen(&mut self, sink: &EventSink) -> Result<()>;

    /// Speak an utterance, returning once playback has finished
    ///
    /// # Errors
    ///
    /// Returns error if synthesis or playback fails
    fn speak(&mut self, utterance: &str) -> Result<()>;
}

impl<B: SpeechBackend + ?Sized> SpeechBackend for Box<B> {
    fn prepare(&mut self) -> Result<()> {
        (**self).prepare()
    }

    fn listen(&mut self, sink: &EventSink) -> Result<()> {
        (**self).listen(sink)
    }

    fn speak(&mut self, utterance: &str) -> Result<()> {
        (**self).speak(utterance)
    }
}

/// Build the backend selected in the configuration
///
/// Devices are not opened until `prepare`.
#[must_use]
pub fn open_backend(config: &SpeechConfig) -> Box<dyn SpeechBackend> {
    match config.backend {
        BackendKind::Console => Box::new(ConsoleBackend::new(config)),
        BackendKind::Audio => Box::new(AudioBackend::new(config)),
    }
}

/// Handle to a speech backend running on its own worker thread
#[derive(Debug)]
pub struct SpeechAdapter {
    commands: mpsc::Sender<SpeechCommand>,
}

impl SpeechAdapter {
    /// Start a worker thread that builds a backend with `factory` and
    /// serves commands until the adapter is dropped
    ///
    /// The thread is detached; it exits once the command channel closes.
    ///
    /// # Errors
    ///
    /// Returns error if the worker thread cannot be spawned
    pub fn spawn<F, B>(factory: F, sink: EventSink) -> Result<Self>
    where
        F: FnOnce() -> B + Send + 'static,
        B: SpeechBackend + 'static,
    {
        let (commands, rx) = mpsc::channel();

        std::thread::Builder::new()
            .name("speech-adapter".to_string())
            .spawn(move || {
                let mut backend = factory();
                serve(&mut backend, &rx, &sink);
            })?;

        Ok(Self { commands })
    }

    /// Queue a command for the backend
    ///
    /// # Errors
    ///
    /// Returns error if the worker thread has exited
    pub fn send(&self, command: SpeechCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|e| Error::Speech(format!("adapter worker gone: {e}")))
    }
}

/// Worker loop: run each command to completion and report the outcome
///
/// Listen and speak failures are folded into the normal event flow so the
/// dialogue never stalls: a failed listen reads as no-input, a failed speak
/// still completes.
fn serve<B: SpeechBackend>(
    backend: &mut B,
    rx: &mpsc::Receiver<SpeechCommand>,
    sink: &EventSink,
) {
    while let Ok(command) = rx.recv() {
        tracing::debug!(?command, "speech command");

        match command {
            SpeechCommand::Prepare => match backend.prepare() {
                Ok(()) => sink.emit(SpeechEvent::Ready),
                Err(e) => {
                    tracing::error!(error = %e, "speech backend failed to prepare");
                    sink.emit(SpeechEvent::Failed(e.to_string()));
                }
            },
            SpeechCommand::Listen => {
                if let Err(e) = backend.listen(sink) {
                    tracing::warn!(error = %e, "listen failed, reporting no-input");
                    sink.emit(SpeechEvent::NoInput);
                }
                sink.emit(SpeechEvent::ListenComplete);
            }
            SpeechCommand::Speak(utterance) => {
                if let Err(e) = backend.speak(&utterance) {
                    tracing::warn!(error = %e, "speak failed");
                }
                sink.emit(SpeechEvent::SpeakComplete);
            }
        }
    }

    tracing::debug!("speech adapter stopped");
}

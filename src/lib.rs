//! Beacon Dialogue - Voice dialogue manager for AI assistants
//!
//! This library drives a spoken conversation between a person and a chat model:
//! - Speech adapter (PREPARE / LISTEN / SPEAK over console or audio devices)
//! - Dialogue state machine deciding when to listen, speak, or ask the model
//! - Append-only transcript folded into every completion request
//! - Ollama-style completion and model discovery client
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  Speech Adapter                      │
//! │   Console  │  Mic capture → STT  │  TTS → Speakers  │
//! └──────────────┬──────────────────────▲───────────────┘
//!        events  │                      │ commands
//! ┌──────────────▼──────────────────────┴───────────────┐
//! │                 Dialogue Session                     │
//! │   Event queue  │  State machine  │  Transcript      │
//! └──────────────┬──────────────────────▲───────────────┘
//!       requests │                      │ replies
//! ┌──────────────▼──────────────────────┴───────────────┐
//! │            Completion Service (Ollama)               │
//! │   /api/tags  │  /api/chat                            │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod completion;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod speech;
pub mod transcript;
pub mod voice;

pub use completion::{ChatOptions, ChatRequest, CompletionService, OllamaClient};
pub use config::{BackendKind, Config};
pub use dialogue::{
    DialogueContext, DialogueMachine, DialogueState, Effect, Event, LoopState, Session,
    SessionHandle, SessionOptions, SessionSnapshot,
};
pub use error::{Error, Result};
pub use speech::{EventSink, Hypothesis, SpeechAdapter, SpeechBackend, SpeechCommand, SpeechEvent};
pub use transcript::{Role, Transcript, Turn};

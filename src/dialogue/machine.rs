//! Dialogue state machine
//!
//! Decision logic only: [`transition`] maps the current state and an event to
//! the next state plus a list of [`Effect`]s. Executing effects (talking to the
//! speech adapter or the completion service) is the session's job.
//!
//! ```text
//! Prepare ──ready──▶ FetchModels ──models──▶ Loop.AwaitingFirstUtterance
//!                                                     │ reply
//!                                                     ▼
//!          ┌──────────────────────────────▶ Loop.SpeakingResponse
//!          │ reply                                    │ speak complete
//!  Loop.ChatCompletion ◀──listen complete── Loop.AwaitingUser
//!                                            (recognised / no-input fold in place)
//! ```

use crate::dialogue::prompts;
use crate::speech::{Hypothesis, SpeechCommand, SpeechEvent};
use crate::transcript::{Transcript, Turn};

/// Steady-state conversation sub-states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopState {
    /// Waiting for the warm-up completion
    AwaitingFirstUtterance,
    /// Speaking the most recent turn
    SpeakingResponse,
    /// Listening for the user
    AwaitingUser,
    /// Waiting for a completion over the whole transcript
    ChatCompletion,
}

/// Active node of the dialogue state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialogueState {
    /// Initializing the speech adapter
    Prepare,
    /// Discovering available models
    FetchModels,
    /// Conversation loop
    Loop(LoopState),
}

impl DialogueState {
    /// Whether the state is inside the conversation loop
    #[must_use]
    pub const fn in_loop(self) -> bool {
        matches!(self, Self::Loop(_))
    }
}

impl std::fmt::Display for DialogueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Prepare => f.write_str("Prepare"),
            Self::FetchModels => f.write_str("FetchModels"),
            Self::Loop(state) => write!(f, "Loop.{state:?}"),
        }
    }
}

/// Input to the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Event from the speech adapter
    Speech(SpeechEvent),
    /// Discovery returned the model catalog
    ModelsFetched(Vec<String>),
    /// Discovery failed
    DiscoveryFailed(String),
    /// Completion returned an assistant reply
    CompletionDone(String),
    /// Completion failed
    CompletionFailed(String),
}

/// Unrecoverable condition that ends the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fatal {
    /// The speech adapter could not be prepared
    Speech(String),
    /// The model catalog could not be fetched
    Discovery(String),
    /// SPEAK was entered with nothing to say
    EmptyTranscript,
}

impl From<Fatal> for crate::Error {
    fn from(fatal: Fatal) -> Self {
        match fatal {
            Fatal::Speech(e) => Self::Speech(e),
            Fatal::Discovery(e) => Self::Discovery(e),
            Fatal::EmptyTranscript => Self::Session("nothing to speak".to_string()),
        }
    }
}

/// Side effect requested by a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send a command to the speech adapter
    Speech(SpeechCommand),
    /// Start model discovery
    DiscoverModels,
    /// Start a completion over these messages
    Complete(Vec<Turn>),
    /// Stop the session
    Fatal(Fatal),
}

/// Data owned by the machine across transitions
#[derive(Debug, Clone, Default)]
pub struct DialogueContext {
    transcript: Transcript,
    models: Vec<String>,
    min_confidence: Option<f32>,
}

impl DialogueContext {
    /// Create an empty context
    ///
    /// With `min_confidence` set, recognitions scoring below it are dropped.
    #[must_use]
    pub fn new(min_confidence: Option<f32>) -> Self {
        Self {
            transcript: Transcript::new(),
            models: Vec::new(),
            min_confidence,
        }
    }

    /// Conversation so far
    #[must_use]
    pub const fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Model catalog (empty until discovery succeeds)
    #[must_use]
    pub fn models(&self) -> &[String] {
        &self.models
    }
}

/// Outcome of a transition
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// State after the event
    pub next: DialogueState,
    /// Effects to execute, in order
    pub effects: Vec<Effect>,
}

impl Transition {
    const fn stay(state: DialogueState) -> Self {
        Self {
            next: state,
            effects: Vec::new(),
        }
    }

    fn fatal(state: DialogueState, fatal: Fatal) -> Self {
        Self {
            next: state,
            effects: vec![Effect::Fatal(fatal)],
        }
    }
}

/// Entry actions of `state`
#[must_use]
pub fn enter(state: DialogueState, context: &DialogueContext) -> Vec<Effect> {
    use DialogueState::{FetchModels, Loop, Prepare};
    use LoopState::{AwaitingFirstUtterance, AwaitingUser, ChatCompletion, SpeakingResponse};

    let effect = match state {
        Prepare => Effect::Speech(SpeechCommand::Prepare),
        FetchModels => Effect::DiscoverModels,
        Loop(AwaitingFirstUtterance) => Effect::Complete(prompts::seed()),
        Loop(SpeakingResponse) => match context.transcript.last() {
            Some(turn) => Effect::Speech(SpeechCommand::Speak(turn.content.clone())),
            None => Effect::Fatal(Fatal::EmptyTranscript),
        },
        Loop(AwaitingUser) => Effect::Speech(SpeechCommand::Listen),
        Loop(ChatCompletion) => {
            let trailing = [prompts::trailing_instruction()];
            Effect::Complete(context.transcript.snapshot_with(trailing))
        }
    };

    vec![effect]
}

/// Move to `next`, running its entry actions
fn goto(next: DialogueState, context: &DialogueContext) -> Transition {
    Transition {
        next,
        effects: enter(next, context),
    }
}

/// Decide the next state for `event`
///
/// Context updates (transcript appends, catalog) happen here; everything
/// else is returned as effects. Events a state does not handle are ignored.
pub fn transition(
    state: DialogueState,
    event: Event,
    context: &mut DialogueContext,
) -> Transition {
    use DialogueState::{FetchModels, Loop, Prepare};
    use LoopState::{AwaitingFirstUtterance, AwaitingUser, ChatCompletion, SpeakingResponse};

    match (state, event) {
        (Prepare, Event::Speech(SpeechEvent::Ready)) => goto(FetchModels, context),
        (Prepare, Event::Speech(SpeechEvent::Failed(e))) => {
            Transition::fatal(state, Fatal::Speech(e))
        }

        (FetchModels, Event::ModelsFetched(models)) => {
            context.models = models;
            goto(Loop(AwaitingFirstUtterance), context)
        }
        (FetchModels, Event::DiscoveryFailed(e)) => Transition::fatal(state, Fatal::Discovery(e)),

        (Loop(AwaitingFirstUtterance | ChatCompletion), Event::CompletionDone(reply)) => {
            context.transcript.push(Turn::assistant(reply));
            goto(Loop(SpeakingResponse), context)
        }
        (Loop(AwaitingFirstUtterance | ChatCompletion), Event::CompletionFailed(reason)) => {
            tracing::warn!(%reason, "completion failed, speaking fallback");
            for turn in prompts::completion_fallback(&reason) {
                context.transcript.push(turn);
            }
            goto(Loop(SpeakingResponse), context)
        }

        (Loop(SpeakingResponse), Event::Speech(SpeechEvent::SpeakComplete)) => {
            goto(Loop(AwaitingUser), context)
        }

        (Loop(AwaitingUser), Event::Speech(SpeechEvent::Recognised(hypotheses))) => {
            fold_recognition(&hypotheses, context);
            Transition::stay(state)
        }
        (Loop(AwaitingUser), Event::Speech(SpeechEvent::NoInput)) => {
            for turn in prompts::no_input_remediation() {
                context.transcript.push(turn);
            }
            Transition::stay(state)
        }
        (Loop(AwaitingUser), Event::Speech(SpeechEvent::ListenComplete)) => {
            goto(Loop(ChatCompletion), context)
        }

        (state, event) => {
            tracing::debug!(%state, ?event, "event ignored");
            Transition::stay(state)
        }
    }
}

/// Append the best hypothesis as a user turn
fn fold_recognition(hypotheses: &[Hypothesis], context: &mut DialogueContext) {
    let Some(best) = hypotheses.first() else {
        tracing::warn!("recognition event without hypotheses");
        return;
    };

    if let Some(floor) = context.min_confidence
        && best.confidence < floor
    {
        tracing::debug!(
            utterance = %best.utterance,
            confidence = best.confidence,
            floor,
            "recognition below confidence floor, dropped"
        );
        return;
    }

    tracing::info!(utterance = %best.utterance, confidence = best.confidence, "user said");
    context.transcript.push(Turn::user(best.utterance.clone()));
}

/// State machine instance: current state plus context
#[derive(Debug, Clone)]
pub struct DialogueMachine {
    state: DialogueState,
    context: DialogueContext,
}

impl DialogueMachine {
    /// Create a machine in `Prepare`
    #[must_use]
    pub const fn new(context: DialogueContext) -> Self {
        Self {
            state: DialogueState::Prepare,
            context,
        }
    }

    /// Entry actions of the initial state
    #[must_use]
    pub fn start(&self) -> Vec<Effect> {
        enter(self.state, &self.context)
    }

    /// Process one event to completion
    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        let from = self.state;
        let Transition { next, effects } = transition(from, event, &mut self.context);

        if next != from {
            tracing::info!(%from, to = %next, "state transition");
        }
        self.state = next;
        effects
    }

    /// Active state
    #[must_use]
    pub const fn state(&self) -> DialogueState {
        self.state
    }

    /// Machine context
    #[must_use]
    pub const fn context(&self) -> &DialogueContext {
        &self.context
    }
}

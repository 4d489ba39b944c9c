//! Dialogue controller
//!
//! A hierarchical state machine that decides when to listen, speak, or ask
//! the model for the next reply, and the session that drives it.

pub mod machine;
pub mod prompts;
mod session;

pub use machine::{
    DialogueContext, DialogueMachine, DialogueState, Effect, Event, Fatal, LoopState, Transition,
    enter, transition,
};
pub use session::{Session, SessionHandle, SessionOptions, SessionSnapshot};

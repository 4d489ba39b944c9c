//! Fixed prompt texts injected by the dialogue controller

use crate::transcript::Turn;

/// Tone and voice constraint sent with every completion
pub const VOICE_INSTRUCTION: &str =
    "Provide brief chat-like messages throughout the conversation. You are a voice-based LLM.";

/// Assistant-authored cue that makes the model open the conversation
pub const GREETING_PROMPT: &str = "Say a quick 'hello', or 'hi'";

/// Instruction appended when listening ends without any speech
pub const NO_INPUT_INSTRUCTION: &str = "If the user does not respond, repeat the last utterance \
     uttered by the LLM and ask the user if their hardware is functioning properly";

/// Canned question spoken after a no-input
pub const NO_INPUT_PROMPT: &str = "Are your microphone and speakers and keyboard working properly?";

/// Canned reply spoken when a completion request fails
pub const FALLBACK_REPLY: &str = "Sorry, I lost my train of thought. Could you say that again?";

/// Warm-up messages for the first completion
#[must_use]
pub fn seed() -> Vec<Turn> {
    vec![
        Turn::system(VOICE_INSTRUCTION),
        Turn::assistant(GREETING_PROMPT),
    ]
}

/// Instruction re-asserted at the end of every steady-state request
#[must_use]
pub fn trailing_instruction() -> Turn {
    Turn::system(VOICE_INSTRUCTION)
}

/// Turns appended for a no-input, system first
#[must_use]
pub fn no_input_remediation() -> [Turn; 2] {
    [
        Turn::system(NO_INPUT_INSTRUCTION),
        Turn::assistant(NO_INPUT_PROMPT),
    ]
}

/// Turns appended when a completion fails, system first
#[must_use]
pub fn completion_fallback(reason: &str) -> [Turn; 2] {
    [
        Turn::system(format!(
            "The previous completion request failed ({reason}). \
             Apologise briefly and ask the user to repeat themselves."
        )),
        Turn::assistant(FALLBACK_REPLY),
    ]
}

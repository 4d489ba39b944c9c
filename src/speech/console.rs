//! Terminal speech backend
//!
//! Stands in for ASR/TTS when no audio hardware is wanted: SPEAK prints the
//! utterance, LISTEN reads typed lines from stdin.

use std::io::{BufRead, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use super::{EventSink, Hypothesis, SpeechBackend, SpeechEvent};
use crate::config::SpeechConfig;
use crate::{Error, Result};

/// Typed input is treated as certain
const TYPED_CONFIDENCE: f32 = 1.0;

/// Text-mode speech backend
#[derive(Debug)]
pub struct ConsoleBackend {
    no_input_timeout: Duration,
    complete_timeout: Duration,
    lines: Option<Receiver<String>>,
    input_closed: bool,
}

impl ConsoleBackend {
    /// Create a console backend from speech settings
    #[must_use]
    pub fn new(config: &SpeechConfig) -> Self {
        Self {
            no_input_timeout: config.no_input_timeout,
            complete_timeout: config.complete_timeout,
            lines: None,
            input_closed: false,
        }
    }

    /// Create a backend fed from an existing line source instead of stdin
    #[must_use]
    pub const fn with_lines(
        lines: Receiver<String>,
        no_input_timeout: Duration,
        complete_timeout: Duration,
    ) -> Self {
        Self {
            no_input_timeout,
            complete_timeout,
            lines: Some(lines),
            input_closed: false,
        }
    }
}

/// Forward stdin lines over a channel from a reader thread
fn spawn_stdin_reader() -> Result<Receiver<String>> {
    let (tx, rx) = mpsc::channel();

    std::thread::Builder::new()
        .name("console-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
            tracing::debug!("stdin closed");
        })?;

    Ok(rx)
}

impl SpeechBackend for ConsoleBackend {
    fn prepare(&mut self) -> Result<()> {
        if self.lines.is_none() {
            self.lines = Some(spawn_stdin_reader()?);
        }
        tracing::debug!("console backend ready");
        Ok(())
    }

    fn listen(&mut self, sink: &EventSink) -> Result<()> {
        let lines = self
            .lines
            .as_ref()
            .ok_or_else(|| Error::Speech("console backend not prepared".to_string()))?;

        print!("you> ");
        std::io::stdout().flush()?;

        let first = match lines.recv_timeout(self.no_input_timeout) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => {
                println!();
                sink.emit(SpeechEvent::NoInput);
                return Ok(());
            }
            Err(RecvTimeoutError::Disconnected) => {
                if !self.input_closed {
                    tracing::warn!("console input closed, every listen now reports no-input");
                    self.input_closed = true;
                }
                // Input is gone for good; pace the loop like a real timeout
                std::thread::sleep(self.no_input_timeout);
                sink.emit(SpeechEvent::NoInput);
                return Ok(());
            }
        };

        let mut recognised = 0usize;
        let mut emit = |line: &str| {
            let text = line.trim();
            if !text.is_empty() {
                let hypothesis = Hypothesis::new(text, TYPED_CONFIDENCE);
                sink.emit(SpeechEvent::Recognised(vec![hypothesis]));
                recognised += 1;
            }
        };

        emit(&first);

        // Lines typed within the completion window belong to the same reply
        if !self.complete_timeout.is_zero() {
            while let Ok(line) = lines.recv_timeout(self.complete_timeout) {
                emit(&line);
            }
        }

        if recognised == 0 {
            sink.emit(SpeechEvent::NoInput);
        }
        Ok(())
    }

    fn speak(&mut self, utterance: &str) -> Result<()> {
        println!("assistant> {utterance}");
        Ok(())
    }
}

//! Shared test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use beacon_dialogue::{
    CompletionService, Error, EventSink, Result, SessionSnapshot, SpeechBackend, SpeechEvent, Turn,
};
use tokio::sync::watch;

/// Speech backend that replays scripted events for each LISTEN
pub struct ScriptedSpeech {
    listens: VecDeque<Vec<SpeechEvent>>,
    spoken: Arc<Mutex<Vec<String>>>,
}

impl ScriptedSpeech {
    /// Create a backend; `spoken` collects every SPEAK utterance
    pub fn new(listens: Vec<Vec<SpeechEvent>>, spoken: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            listens: listens.into(),
            spoken,
        }
    }
}

impl SpeechBackend for ScriptedSpeech {
    fn prepare(&mut self) -> Result<()> {
        Ok(())
    }

    fn listen(&mut self, sink: &EventSink) -> Result<()> {
        match self.listens.pop_front() {
            Some(events) => events.into_iter().for_each(|e| sink.emit(e)),
            // Script exhausted: behave like a quiet room without flooding the loop
            None => std::thread::sleep(Duration::from_millis(20)),
        }
        Ok(())
    }

    fn speak(&mut self, utterance: &str) -> Result<()> {
        self.spoken.lock().unwrap().push(utterance.to_string());
        Ok(())
    }
}

/// Completion service with canned answers that records every request
#[derive(Default)]
pub struct FakeCompletion {
    models: Vec<String>,
    replies: Mutex<VecDeque<std::result::Result<String, String>>>,
    requests: Mutex<Vec<Vec<Turn>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeCompletion {
    /// Create a service offering `models` and answering with `replies` in order
    ///
    /// Once replies run out every completion answers "Mm-hm."
    pub fn new(models: &[&str], replies: Vec<std::result::Result<&str, &str>>) -> Self {
        Self {
            models: models.iter().map(ToString::to_string).collect(),
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|r| r.map(ToString::to_string).map_err(ToString::to_string))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    /// Message lists of all completion requests so far
    pub fn requests(&self) -> Vec<Vec<Turn>> {
        self.requests.lock().unwrap().clone()
    }

    /// Highest number of concurrent calls observed
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CompletionService for FakeCompletion {
    async fn list_models(&self) -> Result<Vec<String>> {
        self.enter();
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.leave();
        Ok(self.models.clone())
    }

    async fn complete(&self, messages: Vec<Turn>) -> Result<String> {
        self.enter();
        self.requests.lock().unwrap().push(messages);
        tokio::time::sleep(Duration::from_millis(5)).await;
        let reply = self.replies.lock().unwrap().pop_front();
        self.leave();

        match reply {
            Some(Ok(text)) => Ok(text),
            Some(Err(reason)) => Err(Error::Completion(reason)),
            None => Ok("Mm-hm.".to_string()),
        }
    }
}

/// Wait until the published snapshot satisfies `predicate`
pub async fn wait_for(
    rx: &mut watch::Receiver<SessionSnapshot>,
    predicate: impl FnMut(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(predicate))
        .await
        .expect("timed out waiting for session state")
        .expect("session dropped")
        .clone()
}

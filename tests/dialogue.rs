//! Dialogue session integration tests
//!
//! Drives full sessions against a scripted speech backend and an in-memory
//! completion service.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use beacon_dialogue::dialogue::prompts;
use beacon_dialogue::{
    CompletionService, Error, EventSink, Hypothesis, Result, Role, Session, SessionHandle,
    SessionOptions, SessionSnapshot, SpeechBackend, SpeechEvent, Turn,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

mod common;

use common::{FakeCompletion, ScriptedSpeech, wait_for};

struct Running {
    task: JoinHandle<Result<()>>,
    snapshots: watch::Receiver<SessionSnapshot>,
    handle: SessionHandle,
    spoken: Arc<Mutex<Vec<String>>>,
}

fn start(
    completion: &Arc<FakeCompletion>,
    listens: Vec<Vec<SpeechEvent>>,
    options: SessionOptions,
) -> Running {
    let spoken = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&spoken);

    let service: Arc<dyn CompletionService> = Arc::clone(completion) as _;
    let session = Session::new(
        service,
        move || ScriptedSpeech::new(listens, recorder),
        options,
    )
    .unwrap();

    let snapshots = session.subscribe();
    let handle = session.handle();
    let task = tokio::spawn(session.run());

    Running {
        task,
        snapshots,
        handle,
        spoken,
    }
}

async fn stop(running: Running) {
    running.handle.stop();
    let result = tokio::time::timeout(Duration::from_secs(5), running.task)
        .await
        .expect("session did not stop")
        .unwrap();
    assert!(result.is_ok(), "session ended with {result:?}");
}

fn recognised(utterance: &str) -> SpeechEvent {
    SpeechEvent::Recognised(vec![Hypothesis::new(utterance, 0.9)])
}

fn has_turn(snapshot: &SessionSnapshot, role: Role, content: &str) -> bool {
    snapshot
        .turns
        .iter()
        .any(|t| t.role == role && t.content == content)
}

fn has_reply(snapshot: &SessionSnapshot, content: &str) -> bool {
    has_turn(snapshot, Role::Assistant, content)
}

/// Wait until the assistant has said `content`
async fn wait_for_reply(running: &mut Running, content: &str) -> SessionSnapshot {
    wait_for(&mut running.snapshots, |s| has_reply(s, content)).await
}

#[tokio::test]
async fn test_greeting_then_user_reply() {
    let replies = vec![Ok("Hello!"), Ok("Nice to meet you.")];
    let completion = Arc::new(FakeCompletion::new(&["gemma2", "llama3"], replies));
    let listens = vec![vec![recognised("hi there")]];
    let mut running = start(&completion, listens, SessionOptions::default());

    let snapshot = wait_for_reply(&mut running, "Nice to meet you.").await;

    assert_eq!(snapshot.models, vec!["gemma2", "llama3"]);
    assert_eq!(
        &snapshot.turns[..3],
        &[
            Turn::assistant("Hello!"),
            Turn::user("hi there"),
            Turn::assistant("Nice to meet you."),
        ]
    );

    let requests = completion.requests();
    assert_eq!(requests[0], prompts::seed());
    assert_eq!(
        requests[1],
        vec![
            Turn::assistant("Hello!"),
            Turn::user("hi there"),
            prompts::trailing_instruction(),
        ]
    );

    wait_for(&mut running.snapshots, |s| s.turns.len() >= 4).await;
    {
        let spoken = running.spoken.lock().unwrap();
        assert_eq!(spoken[0], "Hello!");
        assert_eq!(spoken[1], "Nice to meet you.");
    }

    stop(running).await;
}

#[tokio::test]
async fn test_no_input_appends_remediation() {
    let replies = vec![Ok("Hello!"), Ok("Can you hear me?")];
    let completion = Arc::new(FakeCompletion::new(&["gemma2"], replies));
    let listens = vec![vec![SpeechEvent::NoInput]];
    let mut running = start(&completion, listens, SessionOptions::default());

    let snapshot = wait_for_reply(&mut running, "Can you hear me?").await;

    let [instruction, prompt] = prompts::no_input_remediation();
    assert_eq!(
        &snapshot.turns[..4],
        &[
            Turn::assistant("Hello!"),
            instruction.clone(),
            prompt.clone(),
            Turn::assistant("Can you hear me?"),
        ]
    );
    assert_eq!(
        completion.requests()[1],
        vec![
            Turn::assistant("Hello!"),
            instruction,
            prompt,
            prompts::trailing_instruction(),
        ]
    );

    stop(running).await;
}

#[tokio::test]
async fn test_several_recognitions_in_one_listen() {
    let replies = vec![Ok("Hello!"), Ok("Got it.")];
    let completion = Arc::new(FakeCompletion::new(&["gemma2"], replies));
    let listens = vec![vec![recognised("first part"), recognised("second part")]];
    let mut running = start(&completion, listens, SessionOptions::default());

    let snapshot = wait_for_reply(&mut running, "Got it.").await;

    assert_eq!(
        &snapshot.turns[..4],
        &[
            Turn::assistant("Hello!"),
            Turn::user("first part"),
            Turn::user("second part"),
            Turn::assistant("Got it."),
        ]
    );

    stop(running).await;
}

#[tokio::test]
async fn test_only_first_hypothesis_is_used() {
    let completion = Arc::new(FakeCompletion::new(&["gemma2"], vec![Ok("Hello!")]));
    let hypotheses = vec![
        Hypothesis::new("recognize speech", 0.8),
        Hypothesis::new("wreck a nice beach", 0.7),
    ];
    let listens = vec![vec![SpeechEvent::Recognised(hypotheses)]];
    let mut running = start(&completion, listens, SessionOptions::default());

    let snapshot = wait_for(&mut running.snapshots, |s| s.turns.len() >= 3).await;

    assert_eq!(snapshot.turns[1], Turn::user("recognize speech"));
    assert!(!has_turn(&snapshot, Role::User, "wreck a nice beach"));

    stop(running).await;
}

#[tokio::test]
async fn test_low_confidence_recognition_dropped() {
    let replies = vec![Ok("Hello!"), Ok("Hm?")];
    let completion = Arc::new(FakeCompletion::new(&["gemma2"], replies));
    let mumble = SpeechEvent::Recognised(vec![Hypothesis::new("mumble", 0.1)]);
    let listens = vec![vec![mumble, recognised("clear words")]];
    let options = SessionOptions {
        min_confidence: Some(0.5),
        ..SessionOptions::default()
    };
    let mut running = start(&completion, listens, options);

    let snapshot = wait_for_reply(&mut running, "Hm?").await;

    assert!(!has_turn(&snapshot, Role::User, "mumble"));
    assert_eq!(snapshot.turns[1], Turn::user("clear words"));

    stop(running).await;
}

#[tokio::test]
async fn test_completion_failure_speaks_fallback() {
    let completion = Arc::new(FakeCompletion::new(&["gemma2"], vec![Err("connection reset")]));
    let mut running = start(&completion, Vec::new(), SessionOptions::default());

    // Third turn only arrives after the fallback was spoken
    let snapshot = wait_for(&mut running.snapshots, |s| s.turns.len() >= 3).await;

    assert_eq!(snapshot.turns[0].role, Role::System);
    assert!(snapshot.turns[0].content.contains("connection reset"));
    assert_eq!(snapshot.turns[1], Turn::assistant(prompts::FALLBACK_REPLY));
    assert_eq!(running.spoken.lock().unwrap()[0], prompts::FALLBACK_REPLY);

    stop(running).await;
}

#[tokio::test]
async fn test_transcript_only_grows() {
    let replies = vec![Ok("Hello!"), Ok("Sure."), Ok("Okay.")];
    let completion = Arc::new(FakeCompletion::new(&["gemma2"], replies));
    let listens = vec![
        vec![recognised("tell me a joke")],
        vec![SpeechEvent::NoInput],
        vec![recognised("never mind")],
    ];
    let mut running = start(&completion, listens, SessionOptions::default());

    let mut previous: Vec<Turn> = Vec::new();
    while previous.len() < 8 {
        tokio::time::timeout(Duration::from_secs(5), running.snapshots.changed())
            .await
            .expect("session stalled")
            .unwrap();
        let turns = running.snapshots.borrow_and_update().turns.clone();

        assert!(turns.len() >= previous.len());
        assert_eq!(&turns[..previous.len()], previous.as_slice());
        previous = turns;
    }

    stop(running).await;
}

#[tokio::test]
async fn test_one_request_at_a_time() {
    let completion = Arc::new(FakeCompletion::new(&["gemma2"], Vec::new()));
    let listens = vec![
        vec![recognised("one")],
        vec![recognised("two")],
        vec![recognised("three")],
    ];
    let mut running = start(&completion, listens, SessionOptions::default());

    wait_for(&mut running.snapshots, |s| s.turns.len() >= 8).await;
    assert_eq!(completion.max_in_flight(), 1);

    stop(running).await;
}

#[tokio::test]
async fn test_empty_listen_goes_back_to_model() {
    let completion = Arc::new(FakeCompletion::new(&["gemma2"], vec![Ok("Hello!")]));
    let mut running = start(&completion, Vec::new(), SessionOptions::default());

    let snapshot = wait_for(&mut running.snapshots, |s| s.turns.len() >= 2).await;

    assert_eq!(snapshot.turns[1], Turn::assistant("Mm-hm."));
    assert_eq!(
        completion.requests()[1],
        vec![Turn::assistant("Hello!"), prompts::trailing_instruction()]
    );

    stop(running).await;
}

#[tokio::test]
async fn test_configured_model_missing_from_catalog_is_not_fatal() {
    let completion = Arc::new(FakeCompletion::new(&["llama3"], vec![Ok("Hello!")]));
    let options = SessionOptions {
        model: Some("gemma2".to_string()),
        ..SessionOptions::default()
    };
    let mut running = start(&completion, Vec::new(), options);

    let snapshot = wait_for(&mut running.snapshots, |s| s.state.in_loop()).await;
    assert_eq!(snapshot.models, vec!["llama3"]);

    stop(running).await;
}

struct Unplugged;

impl SpeechBackend for Unplugged {
    fn prepare(&mut self) -> Result<()> {
        Err(Error::Audio("no input device available".to_string()))
    }

    fn listen(&mut self, _sink: &EventSink) -> Result<()> {
        Ok(())
    }

    fn speak(&mut self, _utterance: &str) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_prepare_failure_ends_session() {
    let completion = Arc::new(FakeCompletion::new(&["gemma2"], Vec::new()));
    let service: Arc<dyn CompletionService> = Arc::clone(&completion) as _;
    let session = Session::new(service, || Unplugged, SessionOptions::default()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), session.run())
        .await
        .expect("session should fail fast");

    assert!(matches!(result, Err(Error::Speech(msg)) if msg.contains("no input device")));
    assert!(completion.requests().is_empty());
}

#[tokio::test]
async fn test_stop_while_waiting_for_model() {
    let completion = Arc::new(FakeCompletion::new(&["gemma2"], vec![Ok("Hello!")]));
    let mut running = start(&completion, Vec::new(), SessionOptions::default());

    wait_for(&mut running.snapshots, |s| s.state.in_loop()).await;
    stop(running).await;
}

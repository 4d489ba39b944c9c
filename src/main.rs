use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use beacon_dialogue::speech::{self, EventSink, SpeechAdapter, SpeechCommand, SpeechEvent};
use beacon_dialogue::voice::{AudioCapture, rms};
use beacon_dialogue::{BackendKind, CompletionService, Config, OllamaClient, Session};

/// Beacon Dialogue - spoken conversation with a chat model
#[derive(Parser)]
#[command(name = "beacon-dialogue", version, about)]
struct Cli {
    /// Path to config file (defaults to ~/.config/omni/beacon-dialogue/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Completion service URL (e.g. http://localhost:11434)
    #[arg(long)]
    endpoint: Option<String>,

    /// Model identifier
    #[arg(short, long)]
    model: Option<String>,

    /// Speech backend ("console" or "audio")
    #[arg(short, long)]
    backend: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List models offered by the completion service
    Models,
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Speak text through the configured speech backend
    Say {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the speech backend.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,beacon_dialogue=info",
        1 => "info,beacon_dialogue=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(endpoint) = cli.endpoint {
        config.completion.endpoint = endpoint;
    }
    if let Some(model) = cli.model {
        config.completion.model = model;
    }
    if let Some(backend) = cli.backend {
        config.speech.backend = backend.parse::<BackendKind>()?;
    }
    config.validate()?;

    match cli.command {
        Some(Command::Models) => list_models(&config).await,
        Some(Command::TestMic { duration }) => test_mic(duration).await,
        Some(Command::Say { text }) => say(&config, text).await,
        None => run_session(&config).await,
    }
}

/// Run a conversation until Ctrl-C
async fn run_session(config: &Config) -> anyhow::Result<()> {
    tracing::info!(
        endpoint = %config.completion.endpoint,
        model = %config.completion.model,
        backend = ?config.speech.backend,
        locale = %config.speech.locale,
        "starting dialogue session"
    );

    let session = Session::from_config(config)?;
    let handle = session.handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            handle.stop();
        }
    });

    session.run().await?;
    Ok(())
}

/// Print the model catalog
async fn list_models(config: &Config) -> anyhow::Result<()> {
    let client = OllamaClient::new(
        config.completion.endpoint.clone(),
        config.completion.model.clone(),
        config.completion.options.clone(),
        config.completion.timeout,
    )?;

    let models = client.list_models().await?;
    if models.is_empty() {
        println!("No models available at {}", config.completion.endpoint);
    }
    for model in models {
        let current = model == config.completion.model;
        let marker = if current { "*" } else { " " };
        println!("{marker} {model}");
    }
    Ok(())
}

/// Speak one utterance through the configured backend
async fn say(config: &Config, text: String) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let sink = EventSink::new(move |event| {
        let _ = tx.send(event);
    });
    let speech_config = config.speech.clone();
    let adapter = SpeechAdapter::spawn(move || speech::open_backend(&speech_config), sink)?;

    adapter.send(SpeechCommand::Prepare)?;
    match rx.recv().await {
        Some(SpeechEvent::Ready) => {}
        Some(SpeechEvent::Failed(e)) => anyhow::bail!("speech backend failed to prepare: {e}"),
        other => anyhow::bail!("unexpected speech event: {other:?}"),
    }

    adapter.send(SpeechCommand::Speak(text))?;
    while let Some(event) = rx.recv().await {
        if event == SpeechEvent::SpeakComplete {
            break;
        }
    }
    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;

    println!("Sample rate: {} Hz", capture.sample_rate());
    println!("---");

    for second in 1..=duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.take_buffer();
        let energy = rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{second:2}s] RMS: {energy:.4} | Peak: {peak:.4} | [{meter}]");
    }

    capture.stop();
    println!("---");
    println!("If the meter stayed empty, check your input device and levels.");
    Ok(())
}

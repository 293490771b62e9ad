use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use heddy::config::{SttBackend, TtsBackend};
use heddy::tools::ZapierWebhook;
use heddy::vision::WebcamCamera;
use heddy::voice::tts::{
    DEFAULT_ELEVENLABS_MODEL, DEFAULT_ELEVENLABS_VOICE, DEFAULT_OPENAI_MODEL,
    DEFAULT_OPENAI_VOICE,
};
use heddy::voice::{
    AudioCapture, AudioPlayback, AudioRecorder, KeywordListener, Player, SpeechToText,
    Synthesizer, TextToSpeech, Transcriber, samples_to_wav,
};
use heddy::{
    ApplicationEvent, Collaborators, Config, EventKind, MainController, OpenAiAssistant, Session,
    StreamingEngine,
};

/// Heddy - voice-activated assistant
#[derive(Parser)]
#[command(name = "heddy", version, about)]
struct Cli {
    /// Speech-to-text backend
    #[arg(long, value_enum)]
    transcriber: Option<SttBackend>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
    /// Take a snapshot, ask the assistant about it and keep listening
    Describe {
        /// Question about the picture
        #[arg(default_value = "Describe the image.")]
        prompt: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,heddy=info",
        1 => "info,heddy=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::TestTts { text } => test_tts(cli.transcriber, &text).await,
            Command::Describe { prompt } => {
                let config = Config::load(cli.transcriber)?;
                let start = ApplicationEvent::with_request(EventKind::GetSnapshot, prompt);
                interaction_loop(&config, start).await
            }
        };
    }

    let config = Config::load(cli.transcriber)?;
    interaction_loop(&config, ApplicationEvent::new(EventKind::Start)).await
}

/// Build every collaborator and run the controller until exit or Ctrl-C
#[allow(clippy::future_not_send)]
async fn interaction_loop(config: &Config, start: ApplicationEvent) -> anyhow::Result<()> {
    let assistant_id = config.require_assistant_id()?.to_string();

    let backend = OpenAiAssistant::new(config.api_keys.openai.clone().unwrap_or_default())?
        .with_base_url(config.assistant.base_url.clone())
        .with_vision_model(config.assistant.vision_model.clone());

    let (session, idle_rx) = Session::new(config.assistant.idle_timeout);
    let engine = StreamingEngine::new(Arc::new(backend), session, assistant_id);

    let transcriber = build_transcriber(config)?;
    let collaborators = Collaborators {
        transcriber: Arc::clone(&transcriber),
        synthesizer: build_synthesizer(config)?,
        player: Box::new(AudioPlayback::new(config.voice.sounds_dir.clone())?),
        words: Box::new(KeywordListener::new(config.voice.keywords.clone(), transcriber)),
        recorder: Box::new(AudioRecorder::new(config.voice.recording_path.clone())),
        camera: Arc::new(WebcamCamera::new(
            config.camera.device.clone(),
            config.camera.resolution.clone(),
        )),
        notifier: Arc::new(ZapierWebhook::new(config.zapier_webhook_url.clone())),
    };

    let mut controller = MainController::new(engine, idle_rx, collaborators, config.greeting.clone());

    tracing::info!(
        transcriber = ?config.voice.transcriber,
        tts = ?config.voice.tts_provider,
        keywords = ?config.voice.keywords,
        start = %start.kind,
        "heddy ready"
    );

    tokio::select! {
        result = controller.run(start) => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupted, shutting down"),
    }

    Ok(())
}

fn build_transcriber(config: &Config) -> heddy::Result<Arc<dyn Transcriber>> {
    let stt = match config.voice.transcriber {
        SttBackend::AssemblyAi => {
            SpeechToText::new_assemblyai(config.api_keys.assemblyai.clone().unwrap_or_default())?
        }
        SttBackend::Whisper => SpeechToText::new_whisper(
            config.api_keys.openai.clone().unwrap_or_default(),
            config.voice.stt_model.clone(),
        )?,
    };
    Ok(Arc::new(stt))
}

fn build_synthesizer(config: &Config) -> heddy::Result<Arc<dyn Synthesizer>> {
    let voice = &config.voice;
    let tts = match voice.tts_provider {
        TtsBackend::ElevenLabs => TextToSpeech::new_elevenlabs(
            config.api_keys.elevenlabs.clone().unwrap_or_default(),
            voice
                .tts_voice
                .clone()
                .unwrap_or_else(|| DEFAULT_ELEVENLABS_VOICE.to_string()),
            voice
                .tts_model
                .clone()
                .unwrap_or_else(|| DEFAULT_ELEVENLABS_MODEL.to_string()),
        )?,
        TtsBackend::OpenAi => TextToSpeech::new_openai(
            config.api_keys.openai.clone().unwrap_or_default(),
            voice
                .tts_voice
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_VOICE.to_string()),
            voice
                .tts_model
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
        )?,
    };
    Ok(Arc::new(tts))
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

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.take_buffer();
        let energy = calculate_rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{:2}s] RMS: {energy:.4} | Peak: {peak:.4} | [{meter}]", i + 1);
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Run: arecord -l (to list devices)");
    println!("  2. Try: pavucontrol (to check levels)");

    Ok(())
}

/// Calculate RMS energy
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let sample_rate = 24000_u32;
    let frequency = 440.0_f32;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..sample_rate * 2)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3
        })
        .collect();

    let mut playback = AudioPlayback::new("sounds")?;
    playback.play(&samples_to_wav(&samples, sample_rate)?).await?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl list sinks short");
    println!("  2. Try: pavucontrol (to check output levels)");

    Ok(())
}

/// Test TTS output with the configured provider
async fn test_tts(transcriber: Option<SttBackend>, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::load(transcriber)?;
    let synthesizer = build_synthesizer(&config)?;

    println!("Synthesizing speech with {:?}...", config.voice.tts_provider);
    let audio = synthesizer.synthesize(text).await?;
    println!("Got {} bytes of audio data", audio.len());

    println!("Playing audio...");
    let mut playback = AudioPlayback::new(config.voice.sounds_dir.clone())?;
    playback.play(&audio).await?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}

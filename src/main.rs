use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lyra_assistant::adapters::SpeechOutput;
use lyra_assistant::config::DEFAULT_EXIT_PHRASES;
use lyra_assistant::voice::{
    AudioCapture, AudioPlayback, GoogleSpeechInput, GoogleTranslateTts, rms,
};
use lyra_assistant::{Config, GeminiChat, Persona, Session};

/// Lyra - voice assistant with persona support
#[derive(Parser)]
#[command(name = "lyra", version, about)]
struct Cli {
    /// Language tag for recognition and synthesis (e.g. "en", "th")
    #[arg(short, long, env = "LYRA_LANGUAGE", default_value = "en")]
    language: String,

    /// Voice identifier passed to synthesis
    #[arg(long, env = "LYRA_VOICE", default_value = "default")]
    voice: String,

    /// Maximum number of cached synthesized responses
    #[arg(long, env = "LYRA_CACHE_SIZE", default_value = "20")]
    cache_size: usize,

    /// Exit phrase ending the session (repeatable; defaults to exit, quit, bye)
    #[arg(long = "exit-phrase")]
    exit_phrases: Vec<String>,

    /// Seconds to wait for speech before treating a turn as silent
    #[arg(long, default_value = "8")]
    listen_timeout: u64,

    /// Maximum seconds for a single captured phrase
    #[arg(long, default_value = "15")]
    phrase_limit: u64,

    /// Path to a persona TOML file; omit for the built-in persona
    #[arg(short, long, env = "LYRA_PERSONA")]
    persona: Option<PathBuf>,

    /// Google API key used for Gemini and speech recognition
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, default_value = "")]
    api_key: String,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
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
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,lyra_assistant=info",
        1 => "info,lyra_assistant=debug",
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

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::TestTts { text } => test_tts(&cli.language, &text).await,
        };
    }

    let exit_phrases = if cli.exit_phrases.is_empty() {
        DEFAULT_EXIT_PHRASES.iter().map(ToString::to_string).collect()
    } else {
        cli.exit_phrases.iter().map(|p| p.to_lowercase()).collect()
    };

    let config = Config {
        language: cli.language,
        voice: cli.voice,
        exit_phrases,
        cache_max_entries: cli.cache_size,
        listen_timeout: Duration::from_secs(cli.listen_timeout),
        phrase_limit: Duration::from_secs(cli.phrase_limit),
        gemini_api_key: cli.api_key,
        ..Config::default()
    };
    config.validate()?;

    let persona = match &cli.persona {
        Some(path) => Persona::load(path)?,
        None => Persona::default(),
    };

    tracing::info!(
        persona = %persona.name,
        language = %config.language,
        cache_size = config.cache_max_entries,
        "starting lyra"
    );

    let input = GoogleSpeechInput::new(config.gemini_api_key.clone(), config.language.clone())?;
    let chat = GeminiChat::new(
        config.gemini_api_key.clone(),
        config.chat_model.clone(),
        persona.system_prompt.clone(),
    )?;
    let synth = GoogleTranslateTts::new();
    let sink = AudioPlayback::new()?;

    let mut session = Session::new(
        config,
        persona,
        Box::new(input),
        Box::new(chat),
        Box::new(synth),
        Box::new(sink),
    )?;

    session.run().await?;
    tracing::info!(turns = session.turn_count(), "session ended");
    Ok(())
}

/// Test microphone input with a level meter
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let levels = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<f32>> {
        let mut capture = AudioCapture::new()?;
        capture.start()?;

        let mut levels = Vec::new();
        for i in 0..duration {
            std::thread::sleep(Duration::from_secs(1));
            let samples = capture.take_buffer();
            let energy = rms(&samples);
            levels.push(energy);

            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let meter_len = (energy * 100.0).min(50.0) as usize;
            println!("[{:2}s] RMS: {energy:.4} | [{}]", i + 1, "#".repeat(meter_len));
        }

        capture.stop();
        Ok(levels)
    })
    .await??;

    println!("\n---");
    if levels.iter().any(|&l| l > 0.001) {
        println!("Microphone is picking up audio.");
    } else {
        println!("No signal detected. Check your input device and levels.");
    }

    Ok(())
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let sample_rate = 24000u32;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..sample_rate * 2)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.3
        })
        .collect();

    let mut playback = AudioPlayback::new()?;
    playback.play_samples(samples, sample_rate).await?;

    println!("If you heard the tone, your speakers are working.");
    Ok(())
}

/// Test TTS synthesis and playback
async fn test_tts(language: &str, text: &str) -> anyhow::Result<()> {
    use lyra_assistant::adapters::AudioSink;

    println!("Synthesizing: \"{text}\"");

    let tts = GoogleTranslateTts::new();
    let audio = tts.synthesize(text, "default", language).await?;
    println!("Got {} bytes of audio", audio.len());

    let mut playback = AudioPlayback::new()?;
    playback.play(&audio).await?;

    println!("If you heard the speech, TTS is working.");
    Ok(())
}

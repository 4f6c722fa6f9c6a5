use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mico_assistant::daemon::build_tts;
use mico_assistant::db::{self, ReminderRepo, UserRepo};
use mico_assistant::voice::{AudioCapture, AudioPlayback, Speaker, VoiceSpeaker, mean_amplitude};
use mico_assistant::{Config, Daemon};

/// Mico - a voice assistant for household reminders and questions
#[derive(Parser)]
#[command(name = "mico", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Listen for the wake word and hold voice conversations (default)
    Run,
    /// Converse over the terminal instead of the microphone
    Chat,
    /// Create the configured users, optionally with demonstration reminders
    Seed {
        /// Also insert sample reminders when the reminder table is empty
        #[arg(long)]
        samples: bool,
    },
    /// List a user's pending reminders
    Tasks {
        #[arg(short, long)]
        user: String,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
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

    // RUST_LOG wins over -v
    let filter = match cli.verbose {
        0 => "info,mico_assistant=info",
        1 => "info,mico_assistant=debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load();
    tracing::debug!(?config, "loaded configuration");

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let daemon = Daemon::new(config)?;
            tracing::info!(
                wake_word = %daemon.config().voice.wake_word,
                "mico ready"
            );
            daemon.run().await?;
        }
        Command::Chat => Daemon::new(config)?.chat().await?,
        Command::Seed { samples } => seed(&config, samples)?,
        Command::Tasks { user } => list_tasks(&config, &user)?,
        Command::TestMic { duration } => test_mic(duration).await?,
        Command::TestTts { text } => test_tts(&config, &text).await?,
    }

    Ok(())
}

/// Create users and optional sample reminders
fn seed(config: &Config, samples: bool) -> anyhow::Result<()> {
    let pool = db::init(&config.db_path)?;
    let users = UserRepo::new(pool.clone());

    let created = users.seed(&config.users)?;
    println!("Users ready ({created} new): {}", users.list_names()?.join(", "));

    if samples {
        let inserted = ReminderRepo::new(pool).seed_samples(&users)?;
        if inserted == 0 {
            println!("Reminders already present; no samples added");
        } else {
            println!("Added {inserted} sample reminders");
        }
    }

    Ok(())
}

/// Print a user's pending reminders
fn list_tasks(config: &Config, user: &str) -> anyhow::Result<()> {
    let pool = db::init(&config.db_path)?;
    let users = UserRepo::new(pool.clone());

    let Some(user_id) = users.get_user_id(user)? else {
        anyhow::bail!("no user named {user}");
    };

    let reminders = ReminderRepo::new(pool).list_reminders(user_id)?;
    if reminders.is_empty() {
        println!("{user} has no pending reminders");
        return Ok(());
    }

    for reminder in reminders {
        println!(
            "{:>4}  {:<10}  {}",
            reminder.id,
            reminder.due_date.as_deref().unwrap_or("-"),
            reminder.task
        );
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

    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.take_buffer();
        let volume = mean_amplitude(&samples);

        // Visual meter, 50 cells up to an amplitude of 2500
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (volume / 50.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{:2}s] mean amplitude: {volume:7.1} | [{meter}]", i + 1);
    }

    capture.stop();

    println!("\n---");
    println!("Speech should read well above the silence threshold (default 200).");
    println!("If the amplitude stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Test TTS output
async fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let speaker = VoiceSpeaker::new(build_tts(&config.speech)?, AudioPlayback::new()?);
    speaker.speak(text).await?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}

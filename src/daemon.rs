//! Daemon - the assistant runtime
//!
//! Wires configuration into collaborators and drives the session state
//! machine, either from the microphone (wake word, record, transcribe,
//! process, speak) or from a terminal.

use std::sync::Arc;
use std::time::{Duration, Instant};

use secrecy::SecretString;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::{Config, OracleConfig, SpeechConfig};
use crate::db::{self, DbPool, ReminderRepo, UserRepo};
use crate::events::EventBus;
use crate::local::LocalTools;
use crate::nlu::OracleClassifier;
use crate::oracle::{OllamaClient, Oracle, UnavailableOracle};
use crate::orchestrator::{Orchestrator, TurnResult};
use crate::respond::ResponseGenerator;
use crate::search::WebSearch;
use crate::session::Session;
use crate::tasks::TaskExecutor;
use crate::voice::{
    AudioCapture, AudioPlayback, CommandRecorder, ConsoleSpeaker, RecordingStatus, SAMPLE_RATE,
    SpeechToText, TextToSpeech, Transcriber, VoiceSpeaker, WakeWordDetector, samples_to_wav,
};
use crate::{Error, Result};

/// Audio processing chunk size (100ms at 16kHz)
const CHUNK_SIZE: usize = 1600;

/// How often the voice loop drains the capture buffer
const TICK: Duration = Duration::from_millis(100);

/// The Mico daemon
pub struct Daemon {
    config: Config,
    db: DbPool,
    events: EventBus,
}

impl Daemon {
    /// Open the database and make sure the configured users exist
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened or seeded
    pub fn new(config: Config) -> Result<Self> {
        let db = db::init(&config.db_path)?;
        tracing::info!(path = %config.db_path.display(), "database initialized");

        UserRepo::new(db.clone()).seed(&config.users)?;

        Ok(Self {
            config,
            db,
            events: EventBus::default(),
        })
    }

    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Build the turn orchestrator from configuration
    ///
    /// # Errors
    ///
    /// Returns error if an exit phrase pattern or the search client is invalid
    pub fn orchestrator(&self) -> Result<Orchestrator> {
        let oracle = build_oracle(&self.config.oracle);
        tracing::info!(model = oracle.model(), "oracle ready");

        let users = UserRepo::new(self.db.clone());
        let executor = TaskExecutor::new(users.clone(), ReminderRepo::new(self.db.clone()));
        let responder = ResponseGenerator::new(Arc::clone(&oracle), &self.config.assistant_name)
            .with_stream_speech(self.config.oracle.stream_speech);

        let mut orchestrator = Orchestrator::new(
            LocalTools::new(self.config.exit_phrases.as_slice())?,
            Arc::new(OracleClassifier::new(oracle)),
            executor,
            responder,
            users,
        )
        .with_default_user(&self.config.default_user)
        .with_events(self.events.clone());

        match &self.config.search {
            Some(provider) => {
                tracing::info!(provider = provider.name(), "web search enabled");
                orchestrator = orchestrator.with_search(Arc::new(WebSearch::new(provider.clone())?));
            }
            None => tracing::info!("no search provider configured; search requests answered as chat"),
        }

        Ok(orchestrator)
    }

    /// Run the voice loop until Ctrl-C
    ///
    /// # Errors
    ///
    /// Returns error if required configuration is missing or the audio
    /// devices cannot be opened
    #[allow(clippy::future_not_send)]
    pub async fn run(self) -> Result<()> {
        self.config.check_environment()?;

        let orchestrator = self.orchestrator()?;
        let stt = build_transcriber(&self.config.speech)?;
        let speaker = VoiceSpeaker::new(build_tts(&self.config.speech)?, AudioPlayback::new()?);

        let voice = &self.config.voice;
        let detector = WakeWordDetector::new(vec![voice.wake_word.clone()], voice.wake_sensitivity)?;

        // cpal streams aren't Send, so the loop stays on this task
        let mut voice_loop = VoiceLoop {
            capture: AudioCapture::new()?,
            detector,
            recorder: CommandRecorder::new(voice.recorder, SAMPLE_RATE),
            session: Session::new(voice.follow_up_timeout),
            orchestrator,
            stt,
            speaker,
        };

        voice_loop.capture.start()?;
        tracing::info!(wake_word = %voice.wake_word, "listening for wake word");

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
                () = tokio::time::sleep(TICK) => {
                    if let Err(e) = voice_loop.tick().await {
                        tracing::error!(error = %e, "voice processing error");
                    }
                }
            }
        }

        voice_loop.capture.stop();
        Ok(())
    }

    /// Run the same session state machine over stdin and stdout
    ///
    /// Typing a line containing the wake word starts a session. Ends at EOF.
    ///
    /// # Errors
    ///
    /// Returns error if stdin cannot be read
    pub async fn chat(self) -> Result<()> {
        let orchestrator = self.orchestrator()?;
        let speaker = ConsoleSpeaker;
        let voice = &self.config.voice;
        let mut detector =
            WakeWordDetector::new(vec![voice.wake_word.clone()], voice.wake_sensitivity)?;
        let mut session = Session::new(voice.follow_up_timeout);

        println!("Say \"{}\" to start a conversation (Ctrl-D to quit).", voice.wake_word);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        while let Some(line) = lines.next_line().await? {
            let now = Instant::now();
            orchestrator.expire_if_idle(&mut session, now);

            let command = if session.is_active() {
                line.trim().to_string()
            } else {
                if !detector.check_wake_word(&line) {
                    continue;
                }
                let command = detector.command_after_wake_word(&line);
                detector.reset();
                orchestrator.activate(&mut session, now);
                command
            };

            if !command.is_empty() {
                let outcome = orchestrator
                    .process_command(&mut session, &command, &speaker)
                    .await;
                if outcome.result == TurnResult::Exit {
                    println!("(say \"{}\" to wake me again)", voice.wake_word);
                    continue;
                }
            }

            orchestrator.prompt_identity(&mut session, &speaker).await;
        }

        Ok(())
    }
}

/// Voice loop state, owned by the task running [`Daemon::run`]
struct VoiceLoop {
    capture: AudioCapture,
    detector: WakeWordDetector,
    recorder: CommandRecorder,
    session: Session,
    orchestrator: Orchestrator,
    stt: SpeechToText,
    speaker: VoiceSpeaker,
}

impl VoiceLoop {
    async fn tick(&mut self) -> Result<()> {
        if self.session.is_active() {
            self.converse().await
        } else {
            self.listen_for_wake_word().await
        }
    }

    async fn listen_for_wake_word(&mut self) -> Result<()> {
        let samples = self.capture.take_buffer();
        if samples.len() < CHUNK_SIZE {
            return Ok(());
        }

        if !self.detector.process(&samples) || self.detector.is_activated() {
            return Ok(());
        }

        let speech = self.detector.take_speech_buffer();
        self.capture.clear_buffer();

        if speech.len() <= SAMPLE_RATE as usize / 2 {
            self.detector.reset();
            return Ok(());
        }

        tracing::debug!(samples = speech.len(), "checking for wake word");
        let wav = samples_to_wav(&speech, SAMPLE_RATE)?;
        let transcript = self.stt.transcribe(&wav).await;

        if !self.detector.check_wake_word(&transcript) {
            return Ok(());
        }

        let command = self.detector.command_after_wake_word(&transcript);
        self.detector.reset();
        self.recorder.reset();
        self.orchestrator.activate(&mut self.session, Instant::now());

        if !command.is_empty() {
            self.handle(&command).await;
        }

        self.capture.clear_buffer();
        Ok(())
    }

    async fn converse(&mut self) -> Result<()> {
        if self
            .orchestrator
            .prompt_identity(&mut self.session, &self.speaker)
            .await
        {
            self.capture.clear_buffer();
            return Ok(());
        }

        let samples = self.capture.take_buffer();
        let step = listen_step(
            &self.orchestrator,
            &mut self.session,
            &mut self.recorder,
            &samples,
            Instant::now(),
        );

        match step {
            Listening::Expired => self.after_session(),
            Listening::Recorder(RecordingStatus::Waiting | RecordingStatus::Recording) => {}
            Listening::Recorder(RecordingStatus::NoSpeech) => {
                tracing::debug!(user = self.session.current_user(), "no command heard");
            }
            Listening::Recorder(RecordingStatus::Complete(command)) => {
                let wav = samples_to_wav(&command, SAMPLE_RATE)?;
                let transcript = self.stt.transcribe(&wav).await;

                if transcript.trim().is_empty() {
                    tracing::debug!("empty transcript, still listening");
                } else {
                    tracing::info!(command = %transcript, "command received");
                    self.handle(&transcript).await;
                }
                self.capture.clear_buffer();
            }
        }

        Ok(())
    }

    async fn handle(&mut self, command: &str) {
        let outcome = self
            .orchestrator
            .process_command(&mut self.session, command, &self.speaker)
            .await;

        // Drop our own voice from the capture buffer
        self.capture.clear_buffer();
        self.recorder.reset();

        if outcome.result == TurnResult::Exit {
            self.after_session();
        }
    }

    fn after_session(&mut self) {
        self.detector.reset();
        self.recorder.reset();
        self.capture.clear_buffer();
        tracing::info!("listening for wake word");
    }
}

/// What one pass over captured audio produced in an active session
#[derive(Debug, Clone, PartialEq)]
pub enum Listening {
    /// The session timed out between commands and has ended
    Expired,
    /// Progress on the current command
    Recorder(RecordingStatus),
}

/// Feed captured audio to the recorder, then check the inactivity timeout
///
/// The timeout only ends the session between commands: once speech has
/// started, the command is recorded to the end and handled.
#[must_use]
pub fn listen_step(
    orchestrator: &Orchestrator,
    session: &mut Session,
    recorder: &mut CommandRecorder,
    samples: &[f32],
    now: Instant,
) -> Listening {
    let status = recorder.push(samples);

    let mid_command = matches!(
        status,
        RecordingStatus::Recording | RecordingStatus::Complete(_)
    );
    if !mid_command && orchestrator.expire_if_idle(session, now) {
        recorder.reset();
        return Listening::Expired;
    }

    Listening::Recorder(status)
}

/// Ollama client, or an explicitly unavailable oracle when none is configured
#[must_use]
pub fn build_oracle(config: &OracleConfig) -> Arc<dyn Oracle> {
    let Some(url) = config.url.as_deref() else {
        tracing::warn!("OLLAMA_API_URL not set; oracle unavailable");
        return Arc::new(UnavailableOracle::new("OLLAMA_API_URL not set"));
    };

    match OllamaClient::new(url, config.model.clone(), config.timeout) {
        Ok(client) => {
            tracing::info!(url = client.base_url(), model = client.model(), "oracle client ready");
            Arc::new(client)
        }
        Err(e) => {
            tracing::error!(error = %e, url, "could not create oracle client");
            Arc::new(UnavailableOracle::new(e.to_string()))
        }
    }
}

/// Speech recognition: a local or hosted Whisper endpoint, else Deepgram
///
/// # Errors
///
/// Returns error if no usable speech recognition backend is configured
pub fn build_transcriber(config: &SpeechConfig) -> Result<SpeechToText> {
    if let (None, None, Some(key)) = (
        &config.stt_url,
        &config.openai_api_key,
        &config.deepgram_api_key,
    ) {
        return SpeechToText::new_deepgram(key.clone(), "nova-2".to_string());
    }

    SpeechToText::new_whisper(
        config
            .openai_api_key
            .clone()
            .unwrap_or_else(|| SecretString::from(String::new())),
        config.stt_model.clone(),
        config.stt_url.clone(),
    )
}

/// Speech synthesis: `OpenAI` when keyed, else ElevenLabs
///
/// # Errors
///
/// Returns error if no speech synthesis key is configured
pub fn build_tts(config: &SpeechConfig) -> Result<TextToSpeech> {
    if let Some(key) = config.openai_api_key.clone() {
        return TextToSpeech::new_openai(
            key,
            config.tts_voice.clone(),
            config.tts_speed,
            config.tts_model.clone(),
        );
    }

    if let Some(key) = config.elevenlabs_api_key.clone() {
        let model = if config.tts_model.starts_with("eleven") {
            config.tts_model.clone()
        } else {
            "eleven_monolingual_v1".to_string()
        };
        return TextToSpeech::new_elevenlabs(key, config.tts_voice.clone(), model);
    }

    Err(Error::Config(
        "OPENAI_API_KEY or ELEVENLABS_API_KEY required for speech synthesis".to_string(),
    ))
}

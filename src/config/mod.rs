//! Configuration management for the Mico assistant
//!
//! Values resolve env > TOML file > default. Assembly goes through a lookup
//! closure so it can be exercised without touching the process environment.

pub mod file;

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::local::DEFAULT_EXIT_PHRASES;
use crate::search::SearchProvider;
use crate::voice::RecorderSettings;
use crate::{Error, Result};

use file::MicoConfigFile;

/// Default Ollama model
pub const DEFAULT_MODEL: &str = "codestral:22b";

/// Household members known out of the box
pub const DEFAULT_USERS: &[&str] = &["Patrick", "Surya", "Mohamed"];

const DEFAULT_ASSISTANT_NAME: &str = "Mico";
const DEFAULT_WAKE_WORD: &str = "hey mico";
const DEFAULT_WAKE_SENSITIVITY: f32 = 0.7;
const DEFAULT_FOLLOW_UP_SECS: u64 = 8;
const DEFAULT_ORACLE_TIMEOUT_SECS: u64 = 30;

/// Mico assistant configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Name the assistant uses for itself
    pub assistant_name: String,

    pub oracle: OracleConfig,

    /// Web search provider; `None` answers search requests as chat
    pub search: Option<SearchProvider>,

    pub voice: VoiceConfig,

    pub speech: SpeechConfig,

    /// Users seeded into the store at startup
    pub users: Vec<String>,

    /// User that task commands apply to before anyone is identified
    pub default_user: String,

    pub exit_phrases: Vec<String>,

    /// Path to the reminder database
    pub db_path: PathBuf,
}

/// Language-model backend configuration
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Ollama base URL; without it the oracle is unavailable
    pub url: Option<String>,

    pub model: String,

    /// Per-request timeout for single-shot calls
    pub timeout: Duration,

    /// Speak chat answers sentence by sentence as they stream
    pub stream_speech: bool,
}

/// Wake word and recording configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    pub wake_word: String,

    /// 0.0 to 1.0, higher wakes on quieter speech
    pub wake_sensitivity: f32,

    /// Idle time before returning to wake word listening
    pub follow_up_timeout: Duration,

    pub recorder: RecorderSettings,
}

/// Speech recognition and synthesis configuration
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    pub openai_api_key: Option<SecretString>,
    pub deepgram_api_key: Option<SecretString>,
    pub elevenlabs_api_key: Option<SecretString>,

    /// Whisper-compatible base URL; `None` uses the hosted `OpenAI` API
    pub stt_url: Option<String>,

    pub stt_model: String,
    pub tts_model: String,
    pub tts_voice: String,
    pub tts_speed: f32,
}

impl Config {
    /// Load configuration from the process environment and the config file
    #[must_use]
    pub fn load() -> Self {
        Self::from_sources(
            |key| std::env::var(key).ok(),
            file::load_config_file(),
        )
    }

    /// Assemble configuration from an env lookup and a parsed config file
    #[must_use]
    pub fn from_sources<F>(env: F, fc: MicoConfigFile) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let secret = |key: &str, file: Option<String>| {
            var(key)
                .or_else(|| file.filter(|v| !v.trim().is_empty()))
                .map(SecretString::from)
        };

        let oracle = OracleConfig {
            url: var("OLLAMA_API_URL").or(fc.oracle.url),
            model: var("MICO_MODEL")
                .or(fc.oracle.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout: Duration::from_secs(
                parse_var(&var, "MICO_ORACLE_TIMEOUT")
                    .or(fc.oracle.timeout_secs)
                    .unwrap_or(DEFAULT_ORACLE_TIMEOUT_SECS),
            ),
            stream_speech: var("MICO_STREAM_SPEECH")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .or(fc.oracle.stream_speech)
                .unwrap_or(false),
        };

        // First configured provider wins
        let search = secret("TAVILY_API_KEY", fc.api_keys.tavily)
            .map(|api_key| SearchProvider::Tavily { api_key })
            .or_else(|| {
                secret("BRAVE_API_KEY", fc.api_keys.brave)
                    .map(|api_key| SearchProvider::Brave { api_key })
            })
            .or_else(|| {
                secret("SERPER_API_KEY", fc.api_keys.serper)
                    .map(|api_key| SearchProvider::Serper { api_key })
            });

        let defaults = RecorderSettings::default();
        let silence_duration = parse_var::<f32>(&var, "MICO_SILENCE_DURATION")
            .or(fc.voice.silence_duration_secs)
            .filter(|s| s.is_finite() && *s > 0.0)
            .map_or(defaults.silence_duration, Duration::from_secs_f32);

        let follow_up_timeout = Duration::from_secs(
            parse_var(&var, "MICO_FOLLOWUP_TIMEOUT")
                .or(fc.voice.follow_up_timeout_secs)
                .unwrap_or(DEFAULT_FOLLOW_UP_SECS),
        );

        let voice = VoiceConfig {
            wake_word: var("MICO_WAKE_WORD")
                .or(fc.voice.wake_word)
                .unwrap_or_else(|| DEFAULT_WAKE_WORD.to_string()),
            wake_sensitivity: parse_var::<f32>(&var, "MICO_WAKE_SENSITIVITY")
                .or(fc.voice.wake_sensitivity)
                .unwrap_or(DEFAULT_WAKE_SENSITIVITY)
                .clamp(0.0, 1.0),
            follow_up_timeout,
            // No-speech limit tracks the session timeout
            recorder: RecorderSettings {
                silence_threshold: parse_var(&var, "MICO_SILENCE_THRESHOLD")
                    .or(fc.voice.silence_threshold)
                    .unwrap_or(defaults.silence_threshold),
                silence_duration,
                no_speech_limit: follow_up_timeout,
                ..defaults
            },
        };

        let speech = SpeechConfig {
            openai_api_key: secret("OPENAI_API_KEY", fc.api_keys.openai),
            deepgram_api_key: secret("DEEPGRAM_API_KEY", fc.api_keys.deepgram),
            elevenlabs_api_key: secret("ELEVENLABS_API_KEY", fc.api_keys.elevenlabs),
            stt_url: var("MICO_STT_URL").or(fc.voice.stt_url),
            stt_model: var("MICO_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or_else(|| "whisper-1".to_string()),
            tts_model: var("MICO_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or_else(|| "tts-1".to_string()),
            tts_voice: var("MICO_TTS_VOICE")
                .or(fc.voice.tts_voice)
                .unwrap_or_else(|| "alloy".to_string()),
            tts_speed: fc.voice.tts_speed.unwrap_or(1.0),
        };

        let users = var("MICO_USERS")
            .map(|v| split_list(&v))
            .or(fc.users.known)
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_USERS.iter().map(ToString::to_string).collect());

        let default_user = var("MICO_DEFAULT_USER")
            .or(fc.users.default)
            .or_else(|| users.first().cloned())
            .unwrap_or_default();

        let exit_phrases = var("MICO_EXIT_PHRASES")
            .map(|v| split_list(&v))
            .or(fc.exit_phrases)
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_EXIT_PHRASES.iter().map(ToString::to_string).collect());

        let db_path = var("MICO_DB_PATH")
            .or(fc.db_path)
            .map_or_else(|| data_dir().join("mico.db"), PathBuf::from);

        Self {
            assistant_name: fc
                .assistant_name
                .unwrap_or_else(|| DEFAULT_ASSISTANT_NAME.to_string()),
            oracle,
            search,
            voice,
            speech,
            users,
            default_user,
            exit_phrases,
            db_path,
        }
    }

    /// Report every missing requirement for the voice loop at once
    ///
    /// # Errors
    ///
    /// Returns a configuration error listing what is missing
    pub fn check_environment(&self) -> Result<()> {
        let mut missing = Vec::new();

        if self.oracle.url.is_none() {
            missing.push("OLLAMA_API_URL (oracle endpoint)");
        }

        let has = |key: &Option<SecretString>| {
            key.as_ref().is_some_and(|k| !k.expose_secret().is_empty())
        };

        let stt_ready = self.speech.stt_url.is_some()
            || has(&self.speech.openai_api_key)
            || has(&self.speech.deepgram_api_key);
        if !stt_ready {
            missing.push("OPENAI_API_KEY, DEEPGRAM_API_KEY or MICO_STT_URL (speech recognition)");
        }

        if !has(&self.speech.openai_api_key) && !has(&self.speech.elevenlabs_api_key) {
            missing.push("OPENAI_API_KEY or ELEVENLABS_API_KEY (speech synthesis)");
        }

        if missing.is_empty() {
            return Ok(());
        }

        Err(Error::Config(format!(
            "missing configuration: {}",
            missing.join("; ")
        )))
    }
}

/// Data directory (`~/.local/share/mico` on Linux)
#[must_use]
pub fn data_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(|| PathBuf::from("."), |d| d.data_dir().join("mico"))
}

fn parse_var<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = var(key)?;
    raw.parse().map_or_else(
        |_| {
            tracing::warn!(key, value = %raw, "ignoring unparseable setting");
            None
        },
        Some,
    )
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

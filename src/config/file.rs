//! TOML configuration file loading
//!
//! Supports `~/.config/mico/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MicoConfigFile {
    /// Name the assistant answers to in prompts
    pub assistant_name: Option<String>,

    pub oracle: OracleFileConfig,

    pub voice: VoiceFileConfig,

    pub users: UsersFileConfig,

    /// API keys for external services
    pub api_keys: ApiKeysFileConfig,

    /// Database location override
    pub db_path: Option<String>,

    /// Phrases that end a conversation
    pub exit_phrases: Option<Vec<String>>,
}

/// Language-model backend configuration
#[derive(Debug, Default, Deserialize)]
pub struct OracleFileConfig {
    /// Ollama base URL (e.g. "http://localhost:11434")
    pub url: Option<String>,

    /// Model identifier (e.g. "codestral:22b")
    pub model: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,

    /// Speak chat answers sentence by sentence
    pub stream_speech: Option<bool>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    pub wake_word: Option<String>,

    /// 0.0 to 1.0, higher wakes on quieter speech
    pub wake_sensitivity: Option<f32>,

    /// Idle seconds before returning to wake word listening
    pub follow_up_timeout_secs: Option<u64>,

    /// Mean absolute 16-bit amplitude that counts as speech
    pub silence_threshold: Option<f32>,

    /// Seconds of quiet that end a command
    pub silence_duration_secs: Option<f32>,

    /// Whisper-compatible STT base URL
    pub stt_url: Option<String>,

    pub stt_model: Option<String>,

    pub tts_model: Option<String>,

    pub tts_voice: Option<String>,

    pub tts_speed: Option<f32>,
}

/// Household members
#[derive(Debug, Default, Deserialize)]
pub struct UsersFileConfig {
    pub known: Option<Vec<String>>,
    pub default: Option<String>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub deepgram: Option<String>,
    pub elevenlabs: Option<String>,
    pub tavily: Option<String>,
    pub brave: Option<String>,
    pub serper: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `MicoConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> MicoConfigFile {
    config_file_path().map_or_else(MicoConfigFile::default, |path| load_from(&path))
}

/// Load a TOML config file from `path`, falling back to defaults
pub fn load_from(path: &Path) -> MicoConfigFile {
    if !path.exists() {
        return MicoConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                MicoConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            MicoConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/mico/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("mico").join("config.toml"))
}

//! Mico - a voice assistant for household reminders and questions
//!
//! This library provides the dialogue core and its collaborators:
//! - Reminder store (users and reminders in SQLite)
//! - Oracle-backed intent classification and reply generation
//! - Per-turn orchestration with local fast paths
//! - Voice processing (wake word, recording, STT, TTS)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      Daemon                          │
//! │   Wake word  │  Recorder  │  STT/TTS  │  Terminal   │
//! └────────────────────┬────────────────────────────────┘
//!                      │ utterance
//! ┌────────────────────▼────────────────────────────────┐
//! │                   Orchestrator                       │
//! │  Exit/Clock → Identity → Task → Search/Chat          │
//! └──────┬──────────────┬───────────────────┬───────────┘
//!        │              │                   │
//! ┌──────▼─────┐ ┌──────▼──────┐ ┌──────────▼──────────┐
//! │  Reminder  │ │   Oracle    │ │     Web search      │
//! │   store    │ │  (Ollama)   │ │ Tavily/Brave/Serper │
//! └────────────┘ └─────────────┘ └─────────────────────┘
//! ```

pub mod config;
pub mod daemon;
pub mod db;
pub mod error;
pub mod events;
pub mod local;
pub mod nlu;
pub mod oracle;
pub mod orchestrator;
pub mod prompt;
pub mod respond;
pub mod search;
pub mod session;
pub mod tasks;
pub mod voice;

pub use config::Config;
pub use daemon::Daemon;
pub use db::{DbConn, DbPool};
pub use error::{Error, Result};
pub use orchestrator::{Orchestrator, TurnOutcome, TurnResult};
pub use session::Session;

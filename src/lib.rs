//! Buddy: a voice and text desktop assistant.
//!
//! Spoken or typed requests are classified into a small set of desktop
//! intents and carried out through a platform automation backend:
//! Microphone → phrase detection → STT → intent → confirmation → action
//!
//! # Architecture
//!
//! - **Audio capture**: records from the microphone via `cpal`
//! - **STT**: Whisper-compatible HTTP transcription of each phrase
//! - **Listener**: calibrates, recognises, and resets after repeated errors
//! - **Intent**: patterns first, then a remote LLM (Ollama), a rule-based
//!   parse, or keyword matching, chosen once at startup
//! - **Orchestrator**: speaks a confirmation and drives the desktop
//! - **TTS**: the platform speech command, fed by a FIFO queue

pub mod app;
pub mod audio;
pub mod chat;
pub mod config;
pub mod desktop;
pub mod error;
pub mod intent;
pub mod listener;
pub mod logging;
pub mod orchestrator;
pub mod stt;
pub mod transcript;
pub mod tts;

pub use app::{AppInput, BuddyApp};
pub use config::BuddyConfig;
pub use error::{BuddyError, Result};
pub use intent::{Intent, IntentEngine, Parameters, Resolution};
pub use listener::{AudioCaptureLoop, ListenerEvent};
pub use orchestrator::CommandOrchestrator;
pub use tts::SpeechQueue;

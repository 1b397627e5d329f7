//! Configuration types for the assistant.

use crate::error::{BuddyError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Smallest transcript capacity the chat surface accepts.
pub const MIN_HISTORY: usize = 50;

/// Top-level configuration for the assistant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuddyConfig {
    /// Screen reading settings (consumed by the OCR collaborator).
    pub screen_reader: ScreenReaderConfig,
    /// Mouse and keyboard automation settings.
    pub input_controller: InputControllerConfig,
    /// Chat surface settings.
    pub chat_interface: ChatInterfaceConfig,
    /// Remote language model settings.
    pub llm: LlmConfig,
    /// Canned responses that bypass the language model.
    pub llm_rules: LlmRulesConfig,
    /// Voice input settings.
    pub voice: VoiceConfig,
    /// Speech-to-text settings.
    pub stt: SttConfig,
    /// Text-to-speech settings.
    pub tts: TtsConfig,
    /// Intent strategy selection.
    pub intent: IntentConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Screen reader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenReaderConfig {
    /// OCR engine name.
    pub ocr_engine: String,
    /// Minimum OCR confidence for a text match.
    pub confidence_threshold: f32,
}

impl Default for ScreenReaderConfig {
    fn default() -> Self {
        Self {
            ocr_engine: "tesseract".to_owned(),
            confidence_threshold: 0.7,
        }
    }
}

/// Mouse and keyboard automation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputControllerConfig {
    /// Pointer travel time before a click, in seconds.
    pub move_duration_secs: f32,
    /// Delay between the clicks of a double click, in seconds.
    pub click_delay_secs: f32,
    /// Delay between typed characters, in seconds.
    pub type_interval_secs: f32,
    /// Key combination that opens the application launcher.
    pub launcher_keys: Vec<String>,
    /// Browser opened for website targets.
    pub browser: String,
    /// Time to wait for the browser to come up before typing the URL, in ms.
    pub app_launch_wait_ms: u64,
    /// Timeout for a single automation backend invocation, in seconds.
    pub command_timeout_secs: u64,
}

impl Default for InputControllerConfig {
    fn default() -> Self {
        Self {
            move_duration_secs: 0.5,
            click_delay_secs: 0.1,
            type_interval_secs: 0.01,
            launcher_keys: default_launcher_keys(),
            browser: default_browser().to_owned(),
            app_launch_wait_ms: 1000,
            command_timeout_secs: 10,
        }
    }
}

fn default_launcher_keys() -> Vec<String> {
    if cfg!(target_os = "macos") {
        vec!["command".to_owned(), "space".to_owned()]
    } else {
        vec!["alt".to_owned(), "f2".to_owned()]
    }
}

fn default_browser() -> &'static str {
    if cfg!(target_os = "macos") {
        "safari"
    } else {
        "firefox"
    }
}

/// Chat surface configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatInterfaceConfig {
    /// Name the assistant uses for itself.
    pub assistant_name: String,
    /// Number of transcript entries to retain (at least [`MIN_HISTORY`]).
    pub max_history: usize,
}

impl Default for ChatInterfaceConfig {
    fn default() -> Self {
        Self {
            assistant_name: "Buddy".to_owned(),
            max_history: 100,
        }
    }
}

/// Remote language model (Ollama) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Whether the remote resolver may be selected.
    pub enabled: bool,
    /// Base URL of the Ollama server.
    pub base_url: String,
    /// Preferred model name.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Context window in tokens.
    pub context_window: u32,
    /// Maximum tokens to generate per reply.
    pub max_tokens: u32,
    /// Seconds between liveness probes while the server is unavailable.
    pub probe_interval_secs: u64,
    /// Timeout for `/api/tags`, in seconds.
    pub probe_timeout_secs: u64,
    /// Timeout for intent classification calls, in seconds.
    pub request_timeout_secs: u64,
    /// Timeout for confirmation text generation, in seconds.
    pub response_timeout_secs: u64,
    /// Bounded wait when joining the probe task on shutdown, in ms.
    pub shutdown_timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:11434".to_owned(),
            model: "llama3".to_owned(),
            temperature: 0.7,
            context_window: 4096,
            max_tokens: 150,
            probe_interval_secs: 10,
            probe_timeout_secs: 5,
            request_timeout_secs: 30,
            response_timeout_secs: 10,
            shutdown_timeout_ms: 1000,
        }
    }
}

/// A canned response returned instead of asking the language model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRule {
    /// Rule identifier, e.g. `initial_greeting`.
    pub rule: String,
    /// Intent name the rule answers.
    pub intent: String,
    /// Text to speak.
    pub response: String,
}

/// Response rule table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmRulesConfig {
    /// Rules checked in order; the first one matching the intent wins.
    pub response_rules: Vec<ResponseRule>,
}

impl Default for LlmRulesConfig {
    fn default() -> Self {
        Self {
            response_rules: vec![ResponseRule {
                rule: "initial_greeting".to_owned(),
                intent: "greeting".to_owned(),
                response: "Yes, I am here.".to_owned(),
            }],
        }
    }
}

impl LlmRulesConfig {
    /// Returns the response of the first rule answering `intent`.
    pub fn response_for(&self, intent: &str) -> Option<&str> {
        self.response_rules
            .iter()
            .find(|r| r.intent == intent)
            .map(|r| r.response.as_str())
    }
}

/// Voice input configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Whether the microphone listener starts with the app.
    pub enabled: bool,
    /// Wake phrase.
    pub wake_word: String,
    /// Forward only utterances addressed with the wake word.
    pub require_wake_word: bool,
    /// After a bare wake word, the next utterance within this window is
    /// forwarded without it, in seconds.
    pub follow_up_window_secs: u64,
    /// Maximum wait for speech to begin per attempt, in ms.
    pub listen_timeout_ms: u64,
    /// Maximum length of one phrase, in ms.
    pub phrase_time_limit_ms: u64,
    /// Ambient noise calibration duration, in ms.
    pub calibration_ms: u64,
    /// Consecutive recognition errors before a recognizer reset.
    pub max_consecutive_errors: u32,
    /// Bounded wait when joining the capture task on stop, in ms.
    pub stop_timeout_ms: u64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            wake_word: "hey buddy".to_owned(),
            require_wake_word: false,
            follow_up_window_secs: 8,
            listen_timeout_ms: 1000,
            phrase_time_limit_ms: 5000,
            calibration_ms: 1000,
            max_consecutive_errors: 5,
            stop_timeout_ms: 2000,
        }
    }
}

/// Speech-to-text configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// Whisper-compatible transcription endpoint.
    pub endpoint: String,
    /// Model size passed to the endpoint.
    pub model: String,
    /// Optional bearer token.
    pub api_key: Option<String>,
    /// Optional language hint.
    pub language: Option<String>,
    /// Input device name (None = system default).
    pub input_device: Option<String>,
    /// Speech energy is this multiple of the calibrated ambient level.
    pub energy_ratio: f32,
    /// Lower bound for the speech energy threshold.
    pub min_energy_threshold: f32,
    /// Trailing silence that ends a phrase, in ms.
    pub pause_ms: u64,
    /// Transcription request timeout, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/v1/audio/transcriptions".to_owned(),
            model: "base".to_owned(),
            api_key: None,
            language: Some("en".to_owned()),
            input_device: None,
            energy_ratio: 1.5,
            min_energy_threshold: 0.005,
            pause_ms: 800,
            request_timeout_secs: 30,
        }
    }
}

/// Text-to-speech configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// Speech command (None = detect `say`, `espeak-ng`, `espeak`, `spd-say`).
    pub command: Option<String>,
    /// Voice name passed to the command.
    pub voice: Option<String>,
    /// Speaking rate in words per minute.
    pub rate: u32,
    /// Bounded wait when joining the speaker task on shutdown, in ms.
    pub shutdown_timeout_ms: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            command: None,
            voice: if cfg!(target_os = "macos") {
                Some("Alex".to_owned())
            } else {
                None
            },
            rate: 225,
            shutdown_timeout_ms: 2000,
        }
    }
}

/// Which intent resolution strategy to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentStrategy {
    /// Remote if it can be constructed, then local parse, then keywords.
    #[default]
    Auto,
    /// Remote language model only.
    Remote,
    /// Patterns followed by the local parse.
    Local,
    /// Patterns followed by keyword matching.
    Keyword,
}

impl std::str::FromStr for IntentStrategy {
    type Err = BuddyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "remote" => Ok(Self::Remote),
            "local" => Ok(Self::Local),
            "keyword" => Ok(Self::Keyword),
            other => Err(BuddyError::Config(format!(
                "unknown intent strategy '{other}' (expected auto, remote, local or keyword)"
            ))),
        }
    }
}

/// Intent resolution configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentConfig {
    /// Strategy selection.
    pub strategy: IntentStrategy,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Directory for the daily log file (None = stderr only).
    pub directory: Option<PathBuf>,
    /// Log file name prefix.
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            directory: dirs::data_local_dir().map(|d| d.join("buddy").join("logs")),
            file_prefix: "buddy.log".to_owned(),
        }
    }
}

impl BuddyConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self =
            toml::from_str(&content).map_err(|e| BuddyError::Config(e.to_string()))?;
        config.normalize();
        Ok(config)
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| BuddyError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load `path`, or write the defaults there when it does not exist yet.
    ///
    /// A failure to write the defaults is logged and the defaults are used.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let config = Self::from_file(path)?;
            info!(path = %path.display(), "loaded configuration");
            return Ok(config);
        }

        let config = Self::default();
        match config.save_to_file(path) {
            Ok(()) => info!(path = %path.display(), "wrote default configuration"),
            Err(e) => warn!(path = %path.display(), "could not save default configuration: {e}"),
        }
        Ok(config)
    }

    /// Returns the default config file path: `~/.config/buddy/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("buddy").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("buddy")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/buddy-config/config.toml")
        }
    }

    /// Clamp values the rest of the crate relies on.
    fn normalize(&mut self) {
        if self.chat_interface.max_history < MIN_HISTORY {
            warn!(
                "chat_interface.max_history {} below minimum, using {MIN_HISTORY}",
                self.chat_interface.max_history
            );
            self.chat_interface.max_history = MIN_HISTORY;
        }
        if self.voice.max_consecutive_errors == 0 {
            self.voice.max_consecutive_errors = 1;
        }
        if self.llm.probe_interval_secs == 0 {
            self.llm.probe_interval_secs = 1;
        }
    }
}

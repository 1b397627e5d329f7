//! Intent classification through an Ollama server.
//!
//! [`RemoteIntentResolver`] asks the server's `/api/generate` endpoint to
//! classify each utterance as a desktop command or a conversational question,
//! and to write spoken confirmations.
//!
//! # Connection state
//!
//! The resolver starts `Unchecked`, probes `/api/tags` once on connect and
//! keeps a background monitor that re-probes every `probe_interval_secs`
//! while the server is unavailable. Connection-level failures of generate
//! calls also mark the server unavailable; a successful confirmation call
//! marks it available again. Nothing here ever returns an error to the
//! caller: any failure becomes [`Intent::Unknown`] or canned text.

use super::vocabulary::describe_commands;
use super::{
    Intent, IntentResolver, Parameters, Resolution, ResponseGenerator, ScrollDirection,
    ScrollParams,
};
use crate::config::{LlmConfig, LlmRulesConfig};
use crate::error::{BuddyError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

// ── Types ──────────────────────────────────────────────────────

/// A model advertised by `/api/tags`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub modified_at: Option<String>,
}

/// Liveness of the Ollama server as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Unchecked = 0,
    Available = 1,
    Unavailable = 2,
}

impl ConnectionState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Available,
            2 => Self::Unavailable,
            _ => Self::Unchecked,
        }
    }
}

/// Why a generate call failed.
#[derive(Debug, Clone, thiserror::Error)]
enum GenerateError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request timed out")]
    Timeout,
    #[error("server returned HTTP {0}")]
    Status(u16),
    #[error("malformed reply: {0}")]
    Malformed(String),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Failure class used to pick fallback confirmation text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Connection,
    Timeout,
    Other,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_ctx: u32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateReply {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsReply {
    models: Vec<ModelInfo>,
}

// ── Model selection ────────────────────────────────────────────

/// Pick the model to use from the advertised list.
///
/// Exact name first, then the first model sharing the configured base name
/// (the part before `:`), then the first model listed. `None` when the list
/// is empty.
pub fn select_model(configured: &str, models: &[ModelInfo]) -> Option<String> {
    if models.iter().any(|m| m.name == configured) {
        return Some(configured.to_owned());
    }
    let base = configured.split(':').next().unwrap_or(configured);
    if let Some(m) = models.iter().find(|m| m.name.starts_with(base)) {
        return Some(m.name.clone());
    }
    models.first().map(|m| m.name.clone())
}

// ── Shared state ───────────────────────────────────────────────

struct Shared {
    config: LlmConfig,
    rules: LlmRulesConfig,
    client: reqwest::Client,
    base_url: String,
    state: AtomicU8,
    model: Mutex<String>,
    registry: Mutex<Vec<ModelInfo>>,
    last_checked: Mutex<Option<DateTime<Utc>>>,
}

impl Shared {
    fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Relaxed))
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }

    fn is_available(&self) -> bool {
        self.state() == ConnectionState::Available
    }

    fn model(&self) -> String {
        self.model.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Check `/api/tags`, refresh the registry and pick a model.
    async fn probe(&self) -> ConnectionState {
        let url = format!("{}/api/tags", self.base_url);
        *self.last_checked.lock().unwrap_or_else(|e| e.into_inner()) = Some(Utc::now());

        let result = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(self.config.probe_timeout_secs))
            .send()
            .await;

        let state = match result {
            Ok(resp) if resp.status().is_success() => match resp.json::<TagsReply>().await {
                Ok(tags) => {
                    self.adopt_models(tags.models);
                    ConnectionState::Available
                }
                Err(e) => {
                    warn!("could not read Ollama model list: {e}");
                    ConnectionState::Unavailable
                }
            },
            Ok(resp) => {
                warn!(
                    status = resp.status().as_u16(),
                    "Ollama model list request failed, will retry later"
                );
                ConnectionState::Unavailable
            }
            Err(e) if e.is_timeout() => {
                warn!("Ollama server timed out, will retry later");
                ConnectionState::Unavailable
            }
            Err(e) if e.is_connect() => {
                warn!("connection to Ollama server failed, will retry later");
                ConnectionState::Unavailable
            }
            Err(e) => {
                error!("error checking Ollama availability: {e}");
                ConnectionState::Unavailable
            }
        };
        self.set_state(state);
        state
    }

    fn adopt_models(&self, models: Vec<ModelInfo>) {
        let configured = self.config.model.as_str();
        match select_model(configured, &models) {
            Some(name) => {
                if name != configured {
                    info!(configured, selected = %name, "configured model not found, using another");
                } else {
                    debug!(model = %name, "using configured Ollama model");
                }
                *self.model.lock().unwrap_or_else(|e| e.into_inner()) = name;
            }
            None => warn!(configured, "Ollama server lists no models"),
        }
        *self.registry.lock().unwrap_or_else(|e| e.into_inner()) = models;
    }

    /// Probe once more when the server is not known to be up.
    async fn ensure_available(&self) -> bool {
        if self.is_available() {
            return true;
        }
        info!("Ollama server not available, attempting to reconnect");
        self.probe().await == ConnectionState::Available
    }

    async fn generate(
        &self,
        prompt: String,
        format: Option<&'static str>,
        timeout: Duration,
    ) -> std::result::Result<String, GenerateError> {
        let model = self.model();
        let request = GenerateRequest {
            model: &model,
            prompt,
            stream: false,
            format,
            options: GenerateOptions {
                temperature: self.config.temperature,
                num_ctx: self.config.context_window,
                num_predict: self.config.max_tokens,
            },
        };
        let url = format!("{}/api/generate", self.base_url);

        let resp = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GenerateError::Status(status.as_u16()));
        }
        let reply: GenerateReply = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                GenerateError::Timeout
            } else {
                GenerateError::Malformed(e.to_string())
            }
        })?;
        debug!(model = %model, reply = %reply.response, "Ollama reply");
        Ok(reply.response)
    }
}

// ── Resolver ───────────────────────────────────────────────────

/// Remote intent resolver backed by Ollama.
pub struct RemoteIntentResolver {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl RemoteIntentResolver {
    /// Validate the configuration, probe the server once and start the
    /// liveness monitor. An unreachable server is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote resolver is disabled or the base URL
    /// is not an http(s) URL.
    pub async fn connect(config: &LlmConfig, rules: &LlmRulesConfig) -> Result<Self> {
        if !config.enabled {
            return Err(BuddyError::Intent("remote resolver disabled".into()));
        }
        let url = Url::parse(&config.base_url)
            .map_err(|e| BuddyError::Intent(format!("invalid LLM base URL: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(BuddyError::Intent(format!(
                "unsupported LLM URL scheme '{}'",
                url.scheme()
            )));
        }

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| BuddyError::Llm(format!("cannot build HTTP client: {e}")))?;

        let shared = Arc::new(Shared {
            config: config.clone(),
            rules: rules.clone(),
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            state: AtomicU8::new(ConnectionState::Unchecked as u8),
            model: Mutex::new(config.model.clone()),
            registry: Mutex::new(Vec::new()),
            last_checked: Mutex::new(None),
        });

        shared.probe().await;

        let cancel = CancellationToken::new();
        let monitor = tokio::spawn(run_monitor(Arc::clone(&shared), cancel.clone()));

        info!(
            base_url = %shared.base_url,
            model = %shared.model(),
            state = ?shared.state(),
            "remote intent resolver ready"
        );
        Ok(Self {
            shared,
            cancel,
            monitor: Mutex::new(Some(monitor)),
        })
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Model currently used for generate calls.
    pub fn model(&self) -> String {
        self.shared.model()
    }

    /// Models seen on the last successful probe.
    pub fn models(&self) -> Vec<ModelInfo> {
        self.shared
            .registry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// When the server was last probed.
    pub fn last_checked(&self) -> Option<DateTime<Utc>> {
        *self
            .shared
            .last_checked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for RemoteIntentResolver {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_monitor(shared: Arc<Shared>, cancel: CancellationToken) {
    let interval = Duration::from_secs(shared.config.probe_interval_secs);
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }
        if shared.is_available() {
            continue;
        }
        tokio::select! {
            () = cancel.cancelled() => break,
            state = shared.probe() => {
                if state == ConnectionState::Available {
                    info!("Ollama server is reachable again");
                }
            }
        }
    }
    debug!("Ollama monitor stopped");
}

#[async_trait]
impl IntentResolver for RemoteIntentResolver {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn process_text(&self, text: &str) -> Resolution {
        if !self.shared.ensure_available().await {
            warn!("cannot classify text: Ollama server is not available");
            return Resolution::unknown();
        }

        let prompt = classification_prompt(text);
        let timeout = Duration::from_secs(self.shared.config.request_timeout_secs);
        match self.shared.generate(prompt, Some("json"), timeout).await {
            Ok(content) => {
                let resolution = parse_classification(&content);
                debug!(%resolution, "resolved by Ollama");
                resolution
            }
            Err(GenerateError::Connect(e)) => {
                self.shared.set_state(ConnectionState::Unavailable);
                error!("Ollama connection lost: {e}");
                Resolution::unknown()
            }
            Err(e) => {
                error!("Ollama classification failed: {e}");
                Resolution::unknown()
            }
        }
    }

    fn responder(&self) -> Option<&dyn ResponseGenerator> {
        Some(self)
    }

    async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self
            .monitor
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(mut handle) = handle else {
            return;
        };
        let wait = Duration::from_millis(self.shared.config.shutdown_timeout_ms);
        if tokio::time::timeout(wait, &mut handle).await.is_err() {
            warn!("Ollama monitor did not stop in time, aborting");
            handle.abort();
        } else {
            info!("Ollama connection monitor stopped");
        }
    }
}

#[async_trait]
impl ResponseGenerator for RemoteIntentResolver {
    async fn generate_response(&self, intent: &str, parameters: Option<&Parameters>) -> String {
        if let Some(canned) = self.shared.rules.response_for(intent) {
            return canned.to_owned();
        }

        if !self.shared.ensure_available().await {
            warn!("cannot generate response: Ollama server is not available");
            return fallback_response(intent, FailureKind::Connection);
        }

        let prompt = confirmation_prompt(intent, parameters);
        let timeout = Duration::from_secs(self.shared.config.response_timeout_secs);
        match self.shared.generate(prompt, None, timeout).await {
            Ok(content) => {
                self.shared.set_state(ConnectionState::Available);
                let content = content.trim();
                if content.is_empty() {
                    fallback_response(intent, FailureKind::Other)
                } else {
                    content.to_owned()
                }
            }
            Err(GenerateError::Connect(e)) => {
                self.shared.set_state(ConnectionState::Unavailable);
                error!("connection to Ollama failed during response generation: {e}");
                fallback_response(intent, FailureKind::Connection)
            }
            Err(GenerateError::Timeout) => {
                error!("Ollama response generation timed out");
                fallback_response(intent, FailureKind::Timeout)
            }
            Err(e) => {
                error!("error generating response with Ollama: {e}");
                fallback_response(intent, FailureKind::Other)
            }
        }
    }
}

// ── Helpers ────────────────────────────────────────────────────

fn classify_reqwest_error(err: &reqwest::Error) -> GenerateError {
    if err.is_timeout() {
        GenerateError::Timeout
    } else if err.is_connect() {
        GenerateError::Connect(err.to_string())
    } else {
        GenerateError::Transport(err.to_string())
    }
}

/// Canned confirmation text when the language model cannot help.
pub fn fallback_response(intent: &str, kind: FailureKind) -> String {
    let unknown = intent == Intent::Unknown.as_str();
    match (kind, unknown) {
        (FailureKind::Connection, true) => "I'm not sure what you want me to do. Also, I'm having \
             trouble connecting to my language model. Please check if Ollama is running."
            .to_owned(),
        (FailureKind::Connection, false) => format!(
            "I'll {intent} for you now. Note that I'm having trouble connecting to my language \
             model for more detailed responses."
        ),
        (FailureKind::Timeout, true) => {
            "I'm not sure what you want me to do. The request to my language model timed out."
                .to_owned()
        }
        (FailureKind::Timeout, false) => format!(
            "I'll {intent} for you now. Note that the request to my language model timed out."
        ),
        (FailureKind::Other, true) => {
            "I'm not sure what you want me to do. Could you try phrasing that differently?"
                .to_owned()
        }
        (FailureKind::Other, false) => format!("I'll {intent} for you now."),
    }
}

fn classification_prompt(text: &str) -> String {
    format!(
        "You are Buddy, an assistant that controls the computer and answers questions.\n\
         For computer control commands, extract the intent and parameters from the user input.\n\
         Command intents and the verbs that usually signal them:\n{commands}\n\n\
         Parameters:\n\
         - click: {{\"target\": \"<element to click>\"}}\n\
         - type: {{\"text\": \"<text to type>\"}}\n\
         - scroll: {{\"direction\": \"up\" or \"down\", \"amount\": <positive integer>}}\n\
         - open: {{\"target\": \"<website or application>\"}}\n\
         - help, exit: {{}}\n\n\
         For questions and conversation give a direct answer of at most 50 words, friendly but \
         efficient.\n\n\
         Reply with JSON only.\n\
         For commands: {{\"intent\": \"<intent>\", \"parameters\": {{...}}, \"response\": \
         \"<short confirmation>\"}}\n\
         For questions: {{\"intent\": \"conversation\", \"response\": \"<your answer>\"}}\n\n\
         User: {text}\n\nAssistant:",
        commands = describe_commands(),
    )
}

fn confirmation_prompt(intent: &str, parameters: Option<&Parameters>) -> String {
    let params = parameters.map_or_else(|| "none".to_owned(), ToString::to_string);
    format!(
        "You are Buddy, a friendly computer control assistant with a distinct personality.\n\
         Write a short, natural spoken reply confirming what you are about to do, based on the \
         recognised intent and parameters. Vary your phrasing and avoid sounding robotic.\n\
         For an unknown intent, suggest what the user might want to do.\n\n\
         Intent: {intent}\nParameters: {params}\n\nResponse:"
    )
}

/// Turn the model's JSON reply into a resolution.
fn parse_classification(content: &str) -> Resolution {
    let value: Value = match serde_json::from_str(content) {
        Ok(v) => v,
        Err(e) => {
            error!("failed to parse Ollama reply as JSON: {e}");
            return Resolution::unknown();
        }
    };
    let intent_name = value.get("intent").and_then(Value::as_str).unwrap_or("unknown");
    let response = value.get("response").and_then(Value::as_str).unwrap_or("");
    let params = value.get("parameters").unwrap_or(&Value::Null);

    let Some(intent) = Intent::from_name(intent_name) else {
        debug!(intent = intent_name, "Ollama returned an unsupported intent");
        return Resolution::unknown();
    };

    let resolution = match intent {
        Intent::Conversation => Some(Resolution::conversation(response)),
        Intent::Click | Intent::Type | Intent::Open => {
            target_param(params).and_then(|t| Resolution::targeted(intent, &t))
        }
        Intent::Scroll => Some(Resolution::scroll(scroll_param(params))),
        Intent::Help | Intent::Exit | Intent::Unknown => Resolution::bare(intent),
    };
    resolution.unwrap_or_else(|| {
        debug!(intent = intent_name, "Ollama command reply had no usable parameters");
        Resolution::unknown()
    })
}

/// Keys the model uses for a free-text target, in preference order.
const TARGET_KEYS: &[&str] = &[
    "target", "text", "content", "element", "app", "application", "url", "website", "name",
];

fn target_param(params: &Value) -> Option<String> {
    match params {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => TARGET_KEYS
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_str))
            .or_else(|| {
                // A single string value under an unexpected key.
                let mut strings = map.values().filter_map(Value::as_str);
                match (strings.next(), strings.next()) {
                    (Some(s), None) => Some(s),
                    _ => None,
                }
            })
            .map(str::to_owned),
        _ => None,
    }
}

fn scroll_param(params: &Value) -> ScrollParams {
    match params {
        Value::Object(map) => {
            let direction = map
                .get("direction")
                .and_then(Value::as_str)
                .and_then(ScrollDirection::from_word)
                .unwrap_or(ScrollDirection::Down);
            let amount = match map.get("amount") {
                Some(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
                Some(Value::String(s)) => s.trim().parse().ok(),
                _ => None,
            };
            ScrollParams::new(direction, amount.unwrap_or(super::DEFAULT_SCROLL_AMOUNT))
        }
        Value::String(s) => {
            let mut direction = ScrollDirection::Down;
            let mut amount = None;
            for word in s.split_whitespace() {
                if let Some(d) = ScrollDirection::from_word(word) {
                    direction = d;
                } else if let Ok(n) = word.parse::<u32>() {
                    amount = Some(n);
                }
            }
            ScrollParams::new(direction, amount.unwrap_or(super::DEFAULT_SCROLL_AMOUNT))
        }
        _ => ScrollParams::default(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    fn models(names: &[&str]) -> Vec<ModelInfo> {
        names
            .iter()
            .map(|n| ModelInfo {
                name: (*n).to_owned(),
                size: 0,
                modified_at: None,
            })
            .collect()
    }

    // ── Model selection ────────────────────────────────────────

    #[test]
    fn exact_model_wins() {
        let list = models(&["mistral:7b", "llama3:8b", "llama3"]);
        assert_eq!(select_model("llama3", &list).as_deref(), Some("llama3"));
    }

    #[test]
    fn prefix_model_beats_first_listed() {
        let list = models(&["mistral:7b", "llama3:8b"]);
        assert_eq!(select_model("llama3", &list).as_deref(), Some("llama3:8b"));
        assert_eq!(
            select_model("llama3:70b", &list).as_deref(),
            Some("llama3:8b")
        );
    }

    #[test]
    fn first_listed_is_last_resort() {
        let list = models(&["mistral:7b", "phi3"]);
        assert_eq!(select_model("llama3", &list).as_deref(), Some("mistral:7b"));
        assert_eq!(select_model("llama3", &[]), None);
    }

    // ── Reply parsing ──────────────────────────────────────────

    #[test]
    fn command_reply_with_target_object() {
        let r = parse_classification(
            r#"{"intent":"click","parameters":{"target":"submit button"},"response":"ok"}"#,
        );
        assert_eq!(r.intent(), Intent::Click);
        assert_eq!(r.target(), Some("submit button"));
    }

    #[test]
    fn command_reply_with_string_parameter() {
        let r = parse_classification(r#"{"intent":"open","parameters":"youtube.com"}"#);
        assert_eq!(r.target(), Some("youtube.com"));
    }

    #[test]
    fn command_reply_with_unexpected_single_key() {
        let r = parse_classification(r#"{"intent":"type","parameters":{"words":"hi there"}}"#);
        assert_eq!(r.target(), Some("hi there"));
    }

    #[test]
    fn command_without_target_is_unknown() {
        let r = parse_classification(r#"{"intent":"click","parameters":{}}"#);
        assert_eq!(r, Resolution::unknown());
    }

    #[test]
    fn scroll_reply_variants() {
        let r = parse_classification(
            r#"{"intent":"scroll","parameters":{"direction":"UP","amount":3}}"#,
        );
        assert_eq!(
            r.scroll_params(),
            Some(ScrollParams::new(ScrollDirection::Up, 3))
        );
        let r = parse_classification(r#"{"intent":"scroll","parameters":{"amount":"abc"}}"#);
        assert_eq!(r.scroll_params(), Some(ScrollParams::default()));
        let r = parse_classification(r#"{"intent":"scroll","parameters":"up 7"}"#);
        assert_eq!(
            r.scroll_params(),
            Some(ScrollParams::new(ScrollDirection::Up, 7))
        );
    }

    #[test]
    fn conversation_reply() {
        let r = parse_classification(
            r#"{"intent":"conversation","response":"Paris is the capital of France."}"#,
        );
        assert_eq!(r.intent(), Intent::Conversation);
        assert_eq!(r.response(), Some("Paris is the capital of France."));
    }

    #[test]
    fn malformed_or_unsupported_reply_is_unknown() {
        assert_eq!(parse_classification("not json"), Resolution::unknown());
        assert_eq!(
            parse_classification(r#"{"intent":"dance"}"#),
            Resolution::unknown()
        );
        assert_eq!(parse_classification("{}"), Resolution::unknown());
    }

    // ── Fallback text ──────────────────────────────────────────

    #[test]
    fn fallback_text_depends_on_intent_and_failure() {
        assert!(
            fallback_response("unknown", FailureKind::Connection)
                .contains("Please check if Ollama is running")
        );
        assert!(fallback_response("click", FailureKind::Connection).starts_with("I'll click"));
        assert!(fallback_response("open", FailureKind::Timeout).contains("timed out"));
        assert_eq!(
            fallback_response("scroll", FailureKind::Other),
            "I'll scroll for you now."
        );
    }

    #[test]
    fn classification_prompt_embeds_vocabulary_and_text() {
        let prompt = classification_prompt("open mail");
        assert!(prompt.contains("- open: open, launch, start, go, navigate"));
        assert!(prompt.ends_with("User: open mail\n\nAssistant:"));
    }
}

//! Command orchestration: utterance → intent → confirmation → desktop action.

use crate::chat::{CHAT_HELP, ChatCommand};
use crate::config::{BuddyConfig, InputControllerConfig};
use crate::desktop::{InputDriver, MouseButton};
use crate::error::{BuddyError, Result};
use crate::intent::{Intent, IntentEngine, Resolution, ScrollParams};
use crate::transcript::{Speaker, Transcript};
use crate::tts::SpeechQueue;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info};

/// Spoken when a command is not understood and no confirmation generator exists.
pub const UNKNOWN_MESSAGE: &str = "I'm not sure what you want me to do. You can ask for help \
     or use commands like: click something, type text, scroll up or down, or open a website or app.";

/// Spoken when a conversational reply carries no text.
pub const DEFAULT_CONVERSATION_REPLY: &str = "I'm not sure how to answer that.";

/// Spoken when a desktop action fails.
pub const APOLOGY: &str = "Sorry, I encountered an error executing that command.";

pub const FAREWELL: &str = "Goodbye!";

/// Spoken for the help intent.
pub const HELP_TEXT: &str = "I can help you with the following: \
     click on elements, like click the submit button. \
     Type text, like type hello world. \
     Press keys, like press enter. \
     Scroll the page, like scroll down 5 lines. \
     Open websites or apps, like open YouTube. \
     And exit the application, just say quit.";

const FALLBACK_GREETING: &str = "Yes, I am here.";

/// Domains that make an `open` target a website rather than an application.
const WEB_SUFFIXES: &[&str] = &[".com", ".org", ".net", ".io"];

/// Whether an `open` target should go to the browser.
pub fn is_website(target: &str) -> bool {
    let lower = target.to_lowercase();
    WEB_SUFFIXES.iter().any(|s| lower.contains(s))
}

/// What a chat command asks of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Handled,
    /// Voice input should be switched on or off.
    ToggleListening,
}

/// Turns resolved utterances into speech and desktop actions.
pub struct CommandOrchestrator {
    engine: IntentEngine,
    driver: Arc<dyn InputDriver>,
    speech: Arc<SpeechQueue>,
    transcript: Arc<Transcript>,
    input: InputControllerConfig,
    greeting: String,
    running: AtomicBool,
}

impl CommandOrchestrator {
    pub fn new(
        engine: IntentEngine,
        driver: Arc<dyn InputDriver>,
        speech: Arc<SpeechQueue>,
        transcript: Arc<Transcript>,
        config: &BuddyConfig,
    ) -> Self {
        let greeting = config
            .llm_rules
            .response_for("greeting")
            .unwrap_or(FALLBACK_GREETING)
            .to_owned();
        Self {
            engine,
            driver,
            speech,
            transcript,
            input: config.input_controller.clone(),
            greeting,
            running: AtomicBool::new(true),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Ask the main loop to finish.
    pub fn request_exit(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn transcript(&self) -> &Arc<Transcript> {
        &self.transcript
    }

    pub fn strategy_name(&self) -> &'static str {
        self.engine.strategy_name()
    }

    /// Speak and record an assistant line.
    pub fn say(&self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        info!("{text}");
        self.transcript.record(Speaker::Assistant, text);
        self.speech.speak(text);
    }

    /// Record a status line without speaking it.
    pub fn notify(&self, text: &str) {
        self.transcript.record(Speaker::System, text);
    }

    /// Answer the wake word, preferring the configured greeting rule.
    pub async fn greet(&self) {
        let reply = match self.engine.responder() {
            Some(responder) => responder.generate_response("greeting", None).await,
            None => self.greeting.clone(),
        };
        self.say(&reply);
    }

    /// Handle one natural-language utterance. Returns how it was resolved.
    pub async fn handle_text(&self, text: &str) -> Resolution {
        self.transcript.record(Speaker::User, text);
        let resolution = self.engine.process_text(text).await;
        info!(%resolution, "resolved");

        if resolution.intent() == Intent::Conversation {
            self.say(resolution.response().unwrap_or(DEFAULT_CONVERSATION_REPLY));
            return resolution;
        }

        let confirmation = match self.engine.responder() {
            Some(responder) => {
                responder
                    .generate_response(resolution.intent().as_str(), resolution.parameters())
                    .await
            }
            None if resolution.intent() == Intent::Unknown => {
                self.say(UNKNOWN_MESSAGE);
                return resolution;
            }
            None => format!("I'll {} for you now.", resolution.intent()),
        };
        self.say(&confirmation);

        if let Err(e) = self.execute(&resolution).await {
            error!("error executing command: {e}");
            self.say(APOLOGY);
        }
        resolution
    }

    async fn execute(&self, resolution: &Resolution) -> Result<()> {
        match resolution.intent() {
            Intent::Click => self.click_centre().await,
            Intent::Type => {
                let text = required_target(resolution)?.to_owned();
                self.perform("type", move |d| d.type_text(&text)).await
            }
            Intent::Scroll => {
                self.scroll(resolution.scroll_params().unwrap_or_default())
                    .await
            }
            Intent::Open => self.open(required_target(resolution)?).await,
            Intent::Help => {
                self.say(HELP_TEXT);
                Ok(())
            }
            Intent::Exit => {
                self.say(FAREWELL);
                self.request_exit();
                Ok(())
            }
            Intent::Conversation | Intent::Unknown => Ok(()),
        }
    }

    /// Handle a `/command` from the chat prompt.
    pub async fn handle_command(&self, command: &ChatCommand) -> CommandOutcome {
        debug!(?command, "chat command");
        let result = match command {
            ChatCommand::Help => {
                self.notify(CHAT_HELP);
                Ok(())
            }
            ChatCommand::Click(target) => {
                if !target.is_empty() {
                    self.notify(&format!("Clicking the screen centre for '{target}'."));
                }
                self.click_centre().await
            }
            ChatCommand::Type(text) if text.is_empty() => {
                self.notify("Usage: /type [text]");
                Ok(())
            }
            ChatCommand::Type(text) => {
                let text = text.clone();
                self.perform("type", move |d| d.type_text(&text)).await
            }
            ChatCommand::Key(key) if key.is_empty() => {
                self.notify("Usage: /key [keyname]");
                Ok(())
            }
            ChatCommand::Key(key) => self.press(key).await,
            ChatCommand::Find(element) => {
                self.notify(&format!(
                    "Screen reading is not configured, so I can't find '{element}'."
                ));
                Ok(())
            }
            ChatCommand::Scroll(params) => self.scroll(*params).await,
            ChatCommand::Screenshot => self.screenshot().await,
            ChatCommand::Listen => return CommandOutcome::ToggleListening,
            ChatCommand::Exit => {
                self.say(FAREWELL);
                self.request_exit();
                Ok(())
            }
            ChatCommand::Unknown { name, .. } => {
                self.notify(&format!(
                    "Unknown command: /{name}. Type /help for the list of commands."
                ));
                Ok(())
            }
        };
        if let Err(e) = result {
            error!("error executing command: {e}");
            self.say(APOLOGY);
        }
        CommandOutcome::Handled
    }

    /// Stop background work owned by the intent strategy.
    pub async fn shutdown(&self) {
        self.engine.shutdown().await;
    }

    // ── Actions ─────────────────────────────────────────────────

    /// Run one blocking driver call off the async runtime.
    async fn perform<F>(&self, action: &'static str, f: F) -> Result<()>
    where
        F: FnOnce(&dyn InputDriver) -> bool + Send + 'static,
    {
        let driver = Arc::clone(&self.driver);
        let ok = tokio::task::spawn_blocking(move || f(driver.as_ref()))
            .await
            .map_err(|e| BuddyError::Automation(format!("{action} task failed: {e}")))?;
        if ok {
            Ok(())
        } else {
            Err(BuddyError::Automation(format!("{action} failed")))
        }
    }

    async fn click_centre(&self) -> Result<()> {
        // Without a screen reader the best we can do is the middle of the screen.
        self.perform("click", |d| {
            let (x, y) = match d.screen_size() {
                Some((w, h)) => (Some((w / 2) as i32), Some((h / 2) as i32)),
                None => (None, None),
            };
            d.click(x, y, MouseButton::Left, false)
        })
        .await
    }

    async fn scroll(&self, params: ScrollParams) -> Result<()> {
        self.perform("scroll", move |d| d.scroll(params.amount, params.direction))
            .await
    }

    /// `a+b` presses a combination, anything else a single key.
    async fn press(&self, key: &str) -> Result<()> {
        let keys: Vec<String> = key
            .split('+')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_owned)
            .collect();
        if keys.len() > 1 {
            self.perform("key combination", move |d| d.key_combination(&keys))
                .await
        } else {
            let key = key.trim().to_owned();
            self.perform("key", move |d| d.press_key(&key)).await
        }
    }

    async fn type_and_enter(&self, text: &str) -> Result<()> {
        let text = text.to_owned();
        self.perform("type", move |d| d.type_text(&text)).await?;
        self.perform("key", |d| d.press_key("enter")).await
    }

    async fn open(&self, target: &str) -> Result<()> {
        let launcher = self.input.launcher_keys.clone();
        self.perform("open launcher", move |d| d.key_combination(&launcher))
            .await?;
        if is_website(target) {
            info!(target, browser = %self.input.browser, "opening website");
            self.type_and_enter(&self.input.browser).await?;
            tokio::time::sleep(Duration::from_millis(self.input.app_launch_wait_ms)).await;
        } else {
            info!(target, "opening application");
        }
        self.type_and_enter(target).await
    }

    async fn screenshot(&self) -> Result<()> {
        let driver = Arc::clone(&self.driver);
        let path = tokio::task::spawn_blocking(move || driver.screenshot())
            .await
            .map_err(|e| BuddyError::Automation(format!("screenshot task failed: {e}")))?
            .ok_or_else(|| BuddyError::Automation("screenshot failed".into()))?;
        self.notify(&format!("Screenshot saved to {}", path.display()));
        Ok(())
    }
}

fn required_target(resolution: &Resolution) -> Result<&str> {
    resolution.target().ok_or_else(|| {
        BuddyError::Automation(format!("{} needs a target", resolution.intent()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn website_heuristic() {
        assert!(is_website("youtube.com"));
        assert!(is_website("Docs.Rust-Lang.ORG"));
        assert!(is_website("github.io page"));
        assert!(!is_website("calculator"));
        assert!(!is_website("notes"));
    }
}

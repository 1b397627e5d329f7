//! Recording fakes shared by the integration tests.

use buddy::config::BuddyConfig;
use buddy::desktop::{InputDriver, MouseButton};
use buddy::intent::ScrollDirection;
use buddy::intent::local::{KeywordResolver, LocalParseResolver};
use buddy::stt::{RecognitionError, SpeechRecognizer};
use buddy::transcript::Transcript;
use buddy::tts::SpeechSynthesizer;
use buddy::{CommandOrchestrator, IntentEngine, SpeechQueue};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One desktop action seen by [`RecordingDriver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Click(Option<i32>, Option<i32>),
    Type(String),
    Key(String),
    Combo(Vec<String>),
    Scroll(u32, ScrollDirection),
    Screenshot,
}

/// Driver that records every call; can be told to fail.
#[derive(Default)]
pub struct RecordingDriver {
    actions: Mutex<Vec<Action>>,
    fail: AtomicBool,
}

impl RecordingDriver {
    pub fn failing() -> Self {
        let driver = Self::default();
        driver.fail.store(true, Ordering::SeqCst);
        driver
    }

    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().unwrap().clone()
    }

    fn record(&self, action: Action) -> bool {
        self.actions.lock().unwrap().push(action);
        !self.fail.load(Ordering::SeqCst)
    }
}

impl InputDriver for RecordingDriver {
    fn name(&self) -> &str {
        "recording"
    }

    fn click(&self, x: Option<i32>, y: Option<i32>, _: MouseButton, _: bool) -> bool {
        self.record(Action::Click(x, y))
    }

    fn type_text(&self, text: &str) -> bool {
        self.record(Action::Type(text.to_owned()))
    }

    fn press_key(&self, key: &str) -> bool {
        self.record(Action::Key(key.to_owned()))
    }

    fn key_combination(&self, keys: &[String]) -> bool {
        self.record(Action::Combo(keys.to_vec()))
    }

    fn scroll(&self, amount: u32, direction: ScrollDirection) -> bool {
        self.record(Action::Scroll(amount, direction))
    }

    fn screen_size(&self) -> Option<(u32, u32)> {
        Some((1920, 1080))
    }

    fn screenshot(&self) -> Option<PathBuf> {
        self.record(Action::Screenshot)
            .then(|| PathBuf::from("/tmp/buddy_screenshot.png"))
    }
}

/// Synthesizer that records what it was asked to say.
#[derive(Default)]
pub struct RecordingVoice {
    spoken: Mutex<Vec<String>>,
}

impl RecordingVoice {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

impl SpeechSynthesizer for RecordingVoice {
    fn speak(&self, text: &str) -> buddy::Result<()> {
        self.spoken.lock().unwrap().push(text.to_owned());
        Ok(())
    }

    fn stop(&self) {}
}

/// Recognizer that replays a script and then reports silence.
pub struct ScriptedRecognizer {
    script: VecDeque<Result<String, RecognitionError>>,
}

impl ScriptedRecognizer {
    pub fn new(lines: &[&str]) -> Self {
        Self {
            script: lines.iter().map(|l| Ok((*l).to_owned())).collect(),
        }
    }
}

#[async_trait::async_trait]
impl SpeechRecognizer for ScriptedRecognizer {
    async fn calibrate(&mut self, _: Duration) -> Result<(), RecognitionError> {
        Ok(())
    }

    async fn recognize(
        &mut self,
        listen_timeout: Duration,
        _: Duration,
    ) -> Result<String, RecognitionError> {
        match self.script.pop_front() {
            Some(r) => r,
            None => {
                tokio::time::sleep(listen_timeout).await;
                Err(RecognitionError::WaitTimeout)
            }
        }
    }

    async fn reset(&mut self, _: Duration) -> Result<(), RecognitionError> {
        Ok(())
    }
}

/// Everything an orchestrator test needs to inspect.
pub struct Harness {
    pub orchestrator: CommandOrchestrator,
    pub driver: Arc<RecordingDriver>,
    pub voice: Arc<RecordingVoice>,
    pub speech: Arc<SpeechQueue>,
    pub transcript: Arc<Transcript>,
}

impl Harness {
    /// Wait for queued speech, then return everything spoken.
    pub async fn spoken(&self) -> Vec<String> {
        assert!(self.speech.flush(Duration::from_secs(2)).await);
        self.voice.spoken()
    }
}

pub fn test_config() -> BuddyConfig {
    let mut config = BuddyConfig::default();
    config.input_controller.app_launch_wait_ms = 10;
    config.input_controller.launcher_keys = vec!["command".into(), "space".into()];
    config.input_controller.browser = "safari".into();
    config
}

pub fn harness_with(engine: IntentEngine, driver: RecordingDriver, config: &BuddyConfig) -> Harness {
    let driver = Arc::new(driver);
    let voice = Arc::new(RecordingVoice::default());
    let speech = Arc::new(SpeechQueue::new(voice.clone(), &config.tts));
    let transcript = Arc::new(Transcript::new(config.chat_interface.max_history));
    let orchestrator = CommandOrchestrator::new(
        engine,
        driver.clone(),
        Arc::clone(&speech),
        Arc::clone(&transcript),
        config,
    );
    Harness {
        orchestrator,
        driver,
        voice,
        speech,
        transcript,
    }
}

pub fn local_harness() -> Harness {
    let engine = IntentEngine::with_resolver(Box::new(LocalParseResolver::new().unwrap()));
    harness_with(engine, RecordingDriver::default(), &test_config())
}

pub fn keyword_harness(driver: RecordingDriver) -> Harness {
    let engine = IntentEngine::with_resolver(Box::new(KeywordResolver::new().unwrap()));
    harness_with(engine, driver, &test_config())
}

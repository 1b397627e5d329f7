//! Continuous voice capture loop.
//!
//! [`AudioCaptureLoop`] owns a [`SpeechRecognizer`] and, while started, runs
//! a background task that calibrates once and then keeps recognising
//! bounded phrases, handing each transcript to a callback. Consecutive
//! recognition failures are counted; at the configured ceiling the
//! recognizer is reset and the callback hears about it.
//!
//! ```text
//! Idle ─start→ Calibrating ─ok→ Listening ⇄ HandlingError → Resetting → Listening
//!                   └─fail→ Idle                 stop → Stopped
//! ```

use crate::config::VoiceConfig;
use crate::error::{BuddyError, Result};
use crate::stt::{RecognitionError, SpeechRecognizer};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Spoken after the recognizer has been reset.
pub const RESET_MESSAGE: &str = "Recognition reset complete. Please try speaking again.";

// ── State ──────────────────────────────────────────────────────

/// Capture loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ListenerState {
    Idle = 0,
    Calibrating = 1,
    Listening = 2,
    HandlingError = 3,
    Resetting = 4,
    Stopped = 5,
}

impl ListenerState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Calibrating,
            2 => Self::Listening,
            3 => Self::HandlingError,
            4 => Self::Resetting,
            5 => Self::Stopped,
            _ => Self::Idle,
        }
    }

    /// Whether a capture task is running in this state.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Calibrating | Self::Listening | Self::HandlingError | Self::Resetting
        )
    }
}

#[derive(Debug, Clone)]
struct SharedState(Arc<AtomicU8>);

impl SharedState {
    fn get(&self) -> ListenerState {
        ListenerState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: ListenerState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

// ── Events ─────────────────────────────────────────────────────

/// What the capture loop reports to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerEvent {
    /// Recognised, lower-cased text.
    Transcript(String),
    /// The wake word was heard on its own; the next utterance is addressed.
    WakeWord,
    /// The recognizer was reset after repeated errors.
    RecognitionReset { message: String },
}

/// Receives listener events on the capture task; must not block.
pub type ListenerCallback = Arc<dyn Fn(ListenerEvent) + Send + Sync>;

// ── Error budget ───────────────────────────────────────────────

/// Consecutive-error counter with a reset ceiling.
#[derive(Debug, Clone)]
pub struct ErrorBudget {
    count: u32,
    ceiling: u32,
}

impl ErrorBudget {
    pub fn new(ceiling: u32) -> Self {
        Self {
            count: 0,
            ceiling: ceiling.max(1),
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Any successful recognition clears the count.
    pub fn record_success(&mut self) {
        self.count = 0;
    }

    /// Count one failure; returns `true` (and clears the count) at the ceiling.
    pub fn record_failure(&mut self) -> bool {
        self.count += 1;
        if self.count >= self.ceiling {
            self.count = 0;
            true
        } else {
            false
        }
    }
}

// ── Wake word ──────────────────────────────────────────────────

/// Filters transcripts down to the ones addressed to the assistant.
#[derive(Debug, Clone)]
pub struct WakeWordGate {
    wake_word: String,
    enabled: bool,
    follow_up: Duration,
    armed_until: Option<Instant>,
}

/// Result of gating one transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Forward this text.
    Forward(String),
    /// A bare wake word; wait for the command.
    Armed,
    /// Not addressed to us.
    Ignore,
}

impl WakeWordGate {
    pub fn new(config: &VoiceConfig) -> Self {
        Self {
            wake_word: config.wake_word.trim().to_lowercase(),
            enabled: config.require_wake_word && !config.wake_word.trim().is_empty(),
            follow_up: Duration::from_secs(config.follow_up_window_secs),
            armed_until: None,
        }
    }

    pub fn filter(&mut self, text: &str, now: Instant) -> GateOutcome {
        if !self.enabled {
            return GateOutcome::Forward(text.to_owned());
        }
        if let Some(idx) = text.find(&self.wake_word) {
            let rest = text[idx + self.wake_word.len()..]
                .trim_start_matches(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
                .trim();
            if rest.is_empty() {
                self.armed_until = Some(now + self.follow_up);
                return GateOutcome::Armed;
            }
            self.armed_until = None;
            return GateOutcome::Forward(rest.to_owned());
        }
        match self.armed_until.take() {
            Some(until) if now <= until => GateOutcome::Forward(text.to_owned()),
            _ => GateOutcome::Ignore,
        }
    }
}

// ── Capture loop ───────────────────────────────────────────────

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Background voice capture.
pub struct AudioCaptureLoop {
    config: VoiceConfig,
    recognizer: Arc<AsyncMutex<Box<dyn SpeechRecognizer>>>,
    state: SharedState,
    running: Mutex<Option<Running>>,
}

impl AudioCaptureLoop {
    pub fn new(recognizer: Box<dyn SpeechRecognizer>, config: VoiceConfig) -> Self {
        Self {
            config,
            recognizer: Arc::new(AsyncMutex::new(recognizer)),
            state: SharedState(Arc::new(AtomicU8::new(ListenerState::Idle as u8))),
            running: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ListenerState {
        self.state.get()
    }

    pub fn is_listening(&self) -> bool {
        self.state().is_active()
    }

    /// Calibrate and start listening in the background.
    ///
    /// Returns once calibration has finished.
    ///
    /// # Errors
    ///
    /// Returns an error if already listening, if a previous capture task is
    /// still winding down, or if calibration fails.
    pub async fn start(&self, callback: ListenerCallback) -> Result<()> {
        if self.is_listening() {
            return Err(BuddyError::Audio("already listening".into()));
        }
        let recognizer = Arc::clone(&self.recognizer)
            .try_lock_owned()
            .map_err(|_| BuddyError::Audio("previous capture still stopping".into()))?;

        self.state.set(ListenerState::Calibrating);
        let cancel = CancellationToken::new();
        let (ready_tx, ready_rx) = oneshot::channel();
        let handle = tokio::spawn(run_capture(
            recognizer,
            self.config.clone(),
            self.state.clone(),
            cancel.clone(),
            callback,
            ready_tx,
        ));

        match ready_rx.await {
            Ok(Ok(())) => {
                *self.running.lock().unwrap_or_else(|e| e.into_inner()) =
                    Some(Running { cancel, handle });
                info!("voice recognition started");
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.await;
                self.state.set(ListenerState::Idle);
                Err(BuddyError::Audio(format!("calibration failed: {e}")))
            }
            Err(_) => {
                let _ = handle.await;
                self.state.set(ListenerState::Idle);
                Err(BuddyError::Channel("capture task ended during start".into()))
            }
        }
    }

    /// Stop listening and join the capture task with a bounded wait.
    /// A no-op when not listening.
    pub async fn stop(&self) {
        let running = self.running.lock().unwrap_or_else(|e| e.into_inner()).take();
        let Some(Running { cancel, mut handle }) = running else {
            return;
        };
        cancel.cancel();
        let wait = Duration::from_millis(self.config.stop_timeout_ms);
        if tokio::time::timeout(wait, &mut handle).await.is_err() {
            warn!("capture task did not stop within {wait:?}, aborting");
            handle.abort();
        }
        self.state.set(ListenerState::Stopped);
        info!("voice recognition stopped");
    }
}

async fn run_capture(
    mut recognizer: OwnedMutexGuard<Box<dyn SpeechRecognizer>>,
    config: VoiceConfig,
    state: SharedState,
    cancel: CancellationToken,
    callback: ListenerCallback,
    ready: oneshot::Sender<std::result::Result<(), RecognitionError>>,
) {
    let calibration = Duration::from_millis(config.calibration_ms);
    let listen_timeout = Duration::from_millis(config.listen_timeout_ms);
    let phrase_limit = Duration::from_millis(config.phrase_time_limit_ms);

    info!("calibrating for ambient noise");
    let calibrated = tokio::select! {
        () = cancel.cancelled() => Err(RecognitionError::Backend("cancelled".into())),
        r = recognizer.calibrate(calibration) => r,
    };
    if let Err(e) = calibrated {
        error!("calibration failed: {e}");
        let _ = ready.send(Err(e));
        return;
    }
    state.set(ListenerState::Listening);
    let _ = ready.send(Ok(()));

    let mut budget = ErrorBudget::new(config.max_consecutive_errors);
    let mut gate = WakeWordGate::new(&config);

    loop {
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            r = recognizer.recognize(listen_timeout, phrase_limit) => r,
        };

        match outcome {
            Ok(text) => {
                budget.record_success();
                let text = text.trim().to_lowercase();
                if text.is_empty() {
                    continue;
                }
                info!(%text, "recognized");
                match gate.filter(&text, Instant::now()) {
                    GateOutcome::Forward(t) => callback(ListenerEvent::Transcript(t)),
                    GateOutcome::Armed => callback(ListenerEvent::WakeWord),
                    GateOutcome::Ignore => debug!(%text, "ignored: no wake word"),
                }
            }
            Err(RecognitionError::WaitTimeout) => {}
            Err(RecognitionError::NoSpeech) => {
                budget.record_success();
                debug!("could not understand audio");
            }
            Err(e) => {
                state.set(ListenerState::HandlingError);
                warn!(errors = budget.count() + 1, "recognition error: {e}");
                if budget.record_failure() {
                    state.set(ListenerState::Resetting);
                    warn!("too many consecutive errors, resetting recognizer");
                    let reset = tokio::select! {
                        () = cancel.cancelled() => break,
                        r = recognizer.reset(calibration) => r,
                    };
                    if let Err(e) = reset {
                        error!("recognizer reset failed: {e}");
                    }
                    callback(ListenerEvent::RecognitionReset {
                        message: RESET_MESSAGE.to_owned(),
                    });
                }
                state.set(ListenerState::Listening);
            }
        }
    }

    state.set(ListenerState::Stopped);
    debug!("capture loop exited");
}

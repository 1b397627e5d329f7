//! Application wiring and the main input loop.
//!
//! Typed lines (from stdin or [`BuddyApp::input`]) and voice events from the
//! capture loop are funnelled into one channel and handled in arrival order.

use crate::chat::ChatInput;
use crate::config::BuddyConfig;
use crate::desktop;
use crate::error::Result;
use crate::intent::IntentEngine;
use crate::listener::{AudioCaptureLoop, ListenerCallback, ListenerEvent};
use crate::orchestrator::{CommandOrchestrator, CommandOutcome};
use crate::stt::MicrophoneRecognizer;
use crate::transcript::{Speaker, Transcript};
use crate::tts::{SpeechQueue, SystemVoice};
use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

const INPUT_CAPACITY: usize = 32;

/// Something for the main loop to handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppInput {
    /// A typed chat line.
    Line(String),
    Voice(ListenerEvent),
    /// The typed input source is exhausted.
    EndOfInput,
}

/// The assembled assistant.
pub struct BuddyApp {
    config: BuddyConfig,
    orchestrator: CommandOrchestrator,
    speech: Arc<SpeechQueue>,
    listener: Option<AudioCaptureLoop>,
    tx: mpsc::Sender<AppInput>,
    rx: mpsc::Receiver<AppInput>,
    read_stdin: bool,
    handle_ctrl_c: bool,
}

impl BuddyApp {
    /// Build every component from configuration.
    ///
    /// # Errors
    ///
    /// Fails if no speech command is installed, the microphone cannot be
    /// opened (unless `text_only`), or the intent strategy cannot be built.
    pub async fn build(config: BuddyConfig, text_only: bool) -> Result<Self> {
        info!("initializing {}", config.chat_interface.assistant_name);

        let synth = Arc::new(SystemVoice::new(&config.tts)?);
        let speech = Arc::new(SpeechQueue::new(synth, &config.tts));
        let transcript = Arc::new(Transcript::new(config.chat_interface.max_history));
        let engine = IntentEngine::from_config(&config).await?;
        let driver = desktop::detect_driver(&config.input_controller);
        info!(driver = driver.name(), "input controller initialized");

        let listener = if text_only || !config.voice.enabled {
            info!("voice input disabled");
            None
        } else {
            let recognizer = MicrophoneRecognizer::open(&config.stt)?;
            Some(AudioCaptureLoop::new(
                Box::new(recognizer),
                config.voice.clone(),
            ))
        };

        let orchestrator = CommandOrchestrator::new(
            engine,
            driver,
            Arc::clone(&speech),
            transcript,
            &config,
        );
        let mut app = Self::from_parts(config, orchestrator, speech, listener);
        app.read_stdin = true;
        app.handle_ctrl_c = true;
        Ok(app)
    }

    /// Assemble from prebuilt parts. Input comes only from [`Self::input`].
    pub fn from_parts(
        config: BuddyConfig,
        orchestrator: CommandOrchestrator,
        speech: Arc<SpeechQueue>,
        listener: Option<AudioCaptureLoop>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(INPUT_CAPACITY);
        Self {
            config,
            orchestrator,
            speech,
            listener,
            tx,
            rx,
            read_stdin: false,
            handle_ctrl_c: false,
        }
    }

    /// Sender for feeding input to the main loop.
    pub fn input(&self) -> mpsc::Sender<AppInput> {
        self.tx.clone()
    }

    pub fn orchestrator(&self) -> &CommandOrchestrator {
        &self.orchestrator
    }

    /// Run until exit is requested, input ends, or Ctrl+C.
    ///
    /// # Errors
    ///
    /// Returns an error if voice input was requested but could not start.
    pub async fn run(mut self) -> Result<()> {
        let display = spawn_display(
            self.orchestrator.transcript().subscribe(),
            self.config.chat_interface.assistant_name.clone(),
        );
        if self.read_stdin {
            spawn_stdin_reader(self.tx.clone());
        }

        let started = self.startup().await;
        if let Err(e) = started {
            self.cleanup().await;
            display.abort();
            return Err(e);
        }

        let handle_ctrl_c = self.handle_ctrl_c;
        let ctrl_c = async move {
            if handle_ctrl_c {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("cannot listen for Ctrl+C: {e}");
                    std::future::pending::<()>().await;
                }
            } else {
                std::future::pending::<()>().await;
            }
        };
        tokio::pin!(ctrl_c);

        while self.orchestrator.is_running() {
            let input = tokio::select! {
                () = &mut ctrl_c => {
                    info!("received shutdown signal");
                    break;
                }
                input = self.rx.recv() => match input {
                    Some(input) => input,
                    None => break,
                },
            };
            if !self.handle(input).await {
                break;
            }
        }

        self.cleanup().await;
        display.abort();
        Ok(())
    }

    async fn startup(&self) -> Result<()> {
        info!(strategy = self.orchestrator.strategy_name(), "starting");
        let name = &self.config.chat_interface.assistant_name;
        match &self.listener {
            Some(listener) => {
                if let Err(e) = listener.start(self.voice_callback()).await {
                    error!("failed to start voice recognition: {e}");
                    println!("Error: Could not start voice recognition. Please check your microphone.");
                    return Err(e);
                }
                info!("voice recognition activated and listening");
                println!(
                    "Hello! I'm {name}, your intelligent assistant. I'm listening and ready to help!"
                );
            }
            None => {
                println!(
                    "Hello! I'm {name}, your intelligent assistant. Type a request, or /help for commands."
                );
            }
        }
        Ok(())
    }

    /// Returns `false` when the loop should end.
    async fn handle(&self, input: AppInput) -> bool {
        match input {
            AppInput::Line(line) => match ChatInput::parse(&line) {
                ChatInput::Empty => {}
                ChatInput::Text(text) => {
                    self.orchestrator.handle_text(&text).await;
                }
                ChatInput::Command(command) => {
                    if self.orchestrator.handle_command(&command).await
                        == CommandOutcome::ToggleListening
                    {
                        self.toggle_listening().await;
                    }
                }
            },
            AppInput::Voice(ListenerEvent::Transcript(text)) => {
                println!("You said: {text}");
                self.orchestrator.handle_text(&text).await;
            }
            AppInput::Voice(ListenerEvent::WakeWord) => self.orchestrator.greet().await,
            AppInput::Voice(ListenerEvent::RecognitionReset { message }) => {
                self.orchestrator.say(&message);
            }
            AppInput::EndOfInput => {
                let listening = self.listener.as_ref().is_some_and(|l| l.is_listening());
                if !listening {
                    debug!("input closed");
                    return false;
                }
            }
        }
        true
    }

    async fn toggle_listening(&self) {
        let Some(listener) = &self.listener else {
            self.orchestrator.notify("Voice input is not available.");
            return;
        };
        if listener.is_listening() {
            listener.stop().await;
            self.orchestrator.notify("Voice input deactivated");
            return;
        }
        match listener.start(self.voice_callback()).await {
            Ok(()) => {
                let mut message = "Voice input activated.".to_owned();
                if self.config.voice.require_wake_word {
                    message.push_str(&format!(
                        " Say '{}' to start active listening.",
                        self.config.voice.wake_word
                    ));
                }
                self.orchestrator.notify(&message);
            }
            Err(e) => {
                warn!("cannot start voice input: {e}");
                self.orchestrator
                    .notify(&format!("Could not start voice input: {e}"));
            }
        }
    }

    fn voice_callback(&self) -> ListenerCallback {
        let tx = self.tx.clone();
        Arc::new(move |event| {
            if let Err(e) = tx.try_send(AppInput::Voice(event)) {
                warn!("dropping voice event: {e}");
            }
        })
    }

    async fn cleanup(&self) {
        info!("cleaning up resources");
        if let Some(listener) = &self.listener {
            listener.stop().await;
        }
        self.orchestrator.shutdown().await;
        let grace = Duration::from_millis(self.config.tts.shutdown_timeout_ms);
        if !self.speech.flush(grace).await {
            debug!("speech still playing at shutdown");
        }
        self.speech.shutdown().await;
        info!("cleanup complete");
    }
}

/// Read stdin lines on a plain thread so a pending read never holds up
/// runtime shutdown.
fn spawn_stdin_reader(tx: mpsc::Sender<AppInput>) {
    let spawned = std::thread::Builder::new()
        .name("buddy-stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(AppInput::Line(line)).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        warn!("stdin read failed: {e}");
                        break;
                    }
                }
            }
            let _ = tx.blocking_send(AppInput::EndOfInput);
        });
    if let Err(e) = spawned {
        error!("cannot read stdin: {e}");
    }
}

fn spawn_display(
    mut updates: broadcast::Receiver<crate::transcript::Entry>,
    assistant_name: String,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(entry) => match entry.speaker {
                    Speaker::Assistant => println!("{assistant_name}: {}", entry.text),
                    Speaker::System => println!("{}", entry.text),
                    Speaker::User => {}
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "display lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

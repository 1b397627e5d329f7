//! Speech-to-text.
//!
//! [`SpeechRecognizer`] is the contract the capture loop drives: calibrate
//! once, then repeatedly wait for one bounded phrase and transcribe it.
//! [`MicrophoneRecognizer`](microphone::MicrophoneRecognizer) implements it
//! with cpal capture and a Whisper-compatible HTTP endpoint.

pub mod microphone;
pub mod whisper;

use async_trait::async_trait;
use std::time::Duration;

pub use microphone::MicrophoneRecognizer;
pub use whisper::WhisperClient;

/// Why one recognition attempt produced no text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecognitionError {
    /// Nobody started speaking within the listen timeout. Not a failure.
    #[error("no speech before timeout")]
    WaitTimeout,
    /// Audio was captured but no words were recognised.
    #[error("speech not understood")]
    NoSpeech,
    /// The transcription service could not be reached or answered badly.
    #[error("recognition request failed: {0}")]
    Request(String),
    /// Local audio failure.
    #[error("audio backend failed: {0}")]
    Backend(String),
}

/// Source of recognised utterances.
#[async_trait]
pub trait SpeechRecognizer: Send {
    /// Measure ambient noise for `duration` and adapt the speech threshold.
    ///
    /// # Errors
    ///
    /// Returns an error if no audio can be read.
    async fn calibrate(&mut self, duration: Duration) -> Result<(), RecognitionError>;

    /// Wait up to `listen_timeout` for speech to start, capture at most
    /// `phrase_limit` of it and transcribe it.
    async fn recognize(
        &mut self,
        listen_timeout: Duration,
        phrase_limit: Duration,
    ) -> Result<String, RecognitionError>;

    /// Throw away buffered audio and calibration, then calibrate again.
    ///
    /// # Errors
    ///
    /// Returns an error if recalibration fails.
    async fn reset(&mut self, calibration: Duration) -> Result<(), RecognitionError>;
}

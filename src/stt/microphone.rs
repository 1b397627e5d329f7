//! Microphone-backed recognizer: cpal capture, energy phrase detection,
//! HTTP transcription.

use super::{RecognitionError, SpeechRecognizer, WhisperClient};
use crate::audio::{EnergyCalibrator, MicrophoneStream, PhraseDetector, PhraseEvent};
use crate::config::SttConfig;
use crate::error::Result;
use async_trait::async_trait;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};
use tracing::{debug, info};

const SAMPLE_RATE: u32 = 16_000;

/// Poll interval for the blocking chunk reader.
const POLL: Duration = Duration::from_millis(50);

/// Recognizer reading the system microphone.
pub struct MicrophoneRecognizer {
    stream: MicrophoneStream,
    transcriber: WhisperClient,
    energy_ratio: f32,
    min_threshold: f32,
    pause: Duration,
    threshold: Option<f32>,
}

impl MicrophoneRecognizer {
    /// Open the microphone and prepare the transcription client.
    ///
    /// # Errors
    ///
    /// Returns an error if the microphone cannot be opened.
    pub fn open(config: &SttConfig) -> Result<Self> {
        let stream = MicrophoneStream::open(config.input_device.as_deref(), SAMPLE_RATE)?;
        let transcriber = WhisperClient::new(config)?;
        Ok(Self {
            stream,
            transcriber,
            energy_ratio: config.energy_ratio,
            min_threshold: config.min_energy_threshold,
            pause: Duration::from_millis(config.pause_ms),
            threshold: None,
        })
    }
}

#[async_trait]
impl SpeechRecognizer for MicrophoneRecognizer {
    async fn calibrate(&mut self, duration: Duration) -> std::result::Result<(), RecognitionError> {
        self.stream.drain();
        let rx = self.stream.receiver();
        let calibrator = tokio::task::spawn_blocking(move || measure_ambient(&rx, duration))
            .await
            .map_err(|e| RecognitionError::Backend(format!("calibration task failed: {e}")))?;

        let threshold = calibrator
            .threshold(self.energy_ratio, self.min_threshold)
            .ok_or_else(|| RecognitionError::Backend("no audio from microphone".into()))?;
        info!(
            ambient = calibrator.ambient_level().unwrap_or_default(),
            threshold, "microphone calibrated"
        );
        self.threshold = Some(threshold);
        Ok(())
    }

    async fn recognize(
        &mut self,
        listen_timeout: Duration,
        phrase_limit: Duration,
    ) -> std::result::Result<String, RecognitionError> {
        let threshold = self.threshold.unwrap_or(self.min_threshold);
        let rx = self.stream.receiver();
        let pause_samples = duration_to_samples(self.pause);
        let max_samples = duration_to_samples(phrase_limit);

        let samples = tokio::task::spawn_blocking(move || {
            let mut detector = PhraseDetector::new(threshold, pause_samples, max_samples);
            capture_phrase(&rx, &mut detector, listen_timeout, phrase_limit)
        })
        .await
        .map_err(|e| RecognitionError::Backend(format!("capture task failed: {e}")))??;

        debug!(samples = samples.len(), "phrase captured");
        self.transcriber.transcribe(&samples, SAMPLE_RATE).await
    }

    async fn reset(&mut self, calibration: Duration) -> std::result::Result<(), RecognitionError> {
        self.threshold = None;
        self.calibrate(calibration).await
    }
}

fn duration_to_samples(d: Duration) -> usize {
    (d.as_secs_f64() * f64::from(SAMPLE_RATE)) as usize
}

fn measure_ambient(rx: &Receiver<Vec<f32>>, duration: Duration) -> EnergyCalibrator {
    let mut calibrator = EnergyCalibrator::default();
    let deadline = Instant::now() + duration;
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        match rx.recv_timeout(remaining.min(POLL)) {
            Ok(chunk) => calibrator.add(&chunk),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    calibrator
}

/// Block until one phrase is captured.
///
/// Speech must start within `listen_timeout`; once started, the phrase is
/// cut at `phrase_limit` even if the speaker keeps going.
fn capture_phrase(
    rx: &Receiver<Vec<f32>>,
    detector: &mut PhraseDetector,
    listen_timeout: Duration,
    phrase_limit: Duration,
) -> std::result::Result<Vec<f32>, RecognitionError> {
    let wait_deadline = Instant::now() + listen_timeout;
    let mut phrase_deadline: Option<Instant> = None;

    loop {
        let now = Instant::now();
        match phrase_deadline {
            None if now >= wait_deadline => return Err(RecognitionError::WaitTimeout),
            Some(deadline) if now >= deadline => return Ok(detector.finish()),
            _ => {}
        }

        let chunk = match rx.recv_timeout(POLL) {
            Ok(chunk) => chunk,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                return Err(RecognitionError::Backend("microphone stream closed".into()));
            }
        };

        match detector.push(&chunk) {
            PhraseEvent::Waiting => {}
            PhraseEvent::InPhrase => {
                phrase_deadline.get_or_insert_with(|| Instant::now() + phrase_limit);
            }
            PhraseEvent::Complete(samples) => return Ok(samples),
        }
    }
}

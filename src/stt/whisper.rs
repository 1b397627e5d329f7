//! Client for Whisper-compatible `/v1/audio/transcriptions` endpoints
//! (whisper.cpp server, faster-whisper-server, OpenAI).

use super::RecognitionError;
use crate::config::SttConfig;
use crate::error::{BuddyError, Result};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::io::Cursor;
use std::time::Duration;
use tracing::debug;

/// Markers Whisper emits for silence or noise instead of words.
const NON_SPEECH_MARKERS: &[&str] = &[
    "[blank_audio]",
    "[silence]",
    "[no speech]",
    "(silence)",
    "[music]",
    "[noise]",
];

#[derive(Debug, Deserialize)]
struct TranscriptionReply {
    #[serde(default)]
    text: String,
}

/// HTTP transcription client.
pub struct WhisperClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    language: Option<String>,
}

impl WhisperClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &SttConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| BuddyError::Stt(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            language: config.language.clone(),
        })
    }

    /// Transcribe mono samples, returning lower-cased trimmed text.
    ///
    /// # Errors
    ///
    /// [`RecognitionError::NoSpeech`] when nothing intelligible was said,
    /// [`RecognitionError::Request`] when the service fails.
    pub async fn transcribe(
        &self,
        samples: &[f32],
        sample_rate: u32,
    ) -> std::result::Result<String, RecognitionError> {
        let wav = encode_wav(samples, sample_rate)?;
        let file = Part::bytes(wav)
            .file_name("speech.wav")
            .mime_str("audio/wav")
            .map_err(|e| RecognitionError::Request(e.to_string()))?;
        let mut form = Form::new()
            .part("file", file)
            .text("model", self.model.clone())
            .text("response_format", "json");
        if let Some(lang) = &self.language {
            form = form.text("language", lang.clone());
        }

        let mut request = self.client.post(&self.endpoint).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| RecognitionError::Request(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RecognitionError::Request(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body.chars().take(200).collect::<String>()
            )));
        }
        let reply: TranscriptionReply = resp
            .json()
            .await
            .map_err(|e| RecognitionError::Request(format!("bad transcription reply: {e}")))?;

        let text = normalize_transcript(&reply.text);
        debug!(%text, "transcribed");
        if text.is_empty() {
            Err(RecognitionError::NoSpeech)
        } else {
            Ok(text)
        }
    }
}

/// Lower-case, trim, and drop non-speech markers.
pub fn normalize_transcript(raw: &str) -> String {
    let mut text = raw.trim().to_lowercase();
    for marker in NON_SPEECH_MARKERS {
        text = text.replace(marker, "");
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Encode mono f32 samples as 16-bit PCM WAV.
fn encode_wav(
    samples: &[f32],
    sample_rate: u32,
) -> std::result::Result<Vec<u8>, RecognitionError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut buf = Vec::new();
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut buf), spec)
            .map_err(|e| RecognitionError::Backend(format!("wav encode: {e}")))?;
        for s in samples {
            let v = (s.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
            writer
                .write_sample(v)
                .map_err(|e| RecognitionError::Backend(format!("wav encode: {e}")))?;
        }
        writer
            .finalize()
            .map_err(|e| RecognitionError::Backend(format!("wav encode: {e}")))?;
    }
    Ok(buf)
}

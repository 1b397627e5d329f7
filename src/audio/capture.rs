//! Microphone audio capture using cpal.
//!
//! The cpal stream lives on a dedicated thread because it is not `Send`.
//! Samples are converted to mono, resampled to the target rate and handed
//! out through a bounded crossbeam channel.

use crate::error::{BuddyError, Result};
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender, bounded};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info};

/// Chunks buffered between the audio thread and the reader (about 10 s at 32 ms).
const CHANNEL_CAPACITY: usize = 320;

/// A running microphone stream.
pub struct MicrophoneStream {
    rx: Receiver<Vec<f32>>,
    stop_tx: Sender<()>,
    thread: Option<JoinHandle<()>>,
    sample_rate: u32,
}

impl MicrophoneStream {
    /// Open the named input device (or the system default) and start capturing.
    ///
    /// # Errors
    ///
    /// Returns an error if no input device is available or the stream cannot start.
    pub fn open(device_name: Option<&str>, target_rate: u32) -> Result<Self> {
        let (tx, rx) = bounded::<Vec<f32>>(CHANNEL_CAPACITY);
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);
        let device_name = device_name.map(str::to_owned);

        let thread = std::thread::Builder::new()
            .name("buddy-mic".into())
            .spawn(move || {
                let stream = match build_stream(device_name.as_deref(), target_rate, tx) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                // Hold the stream alive until asked to stop or the owner goes away.
                let _ = stop_rx.recv();
                drop(stream);
                info!("audio capture stopped");
            })
            .map_err(|e| BuddyError::Audio(format!("cannot spawn capture thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                rx,
                stop_tx,
                thread: Some(thread),
                sample_rate: target_rate,
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(BuddyError::Audio("capture thread exited during start".into()))
            }
        }
    }

    /// Sample rate of the delivered chunks.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// A handle for reading chunks from another thread.
    pub fn receiver(&self) -> Receiver<Vec<f32>> {
        self.rx.clone()
    }

    /// Discard everything buffered so far.
    pub fn drain(&self) {
        let dropped = self.rx.try_iter().count();
        if dropped > 0 {
            debug!(dropped, "discarded buffered audio");
        }
    }

    /// List available input devices.
    ///
    /// # Errors
    ///
    /// Returns an error if devices cannot be enumerated.
    pub fn list_input_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| BuddyError::Audio(format!("cannot enumerate devices: {e}")))?;

        let mut names = Vec::new();
        for device in devices {
            if let Ok(desc) = device.description() {
                names.push(desc.name().to_owned());
            }
        }
        Ok(names)
    }
}

impl Drop for MicrophoneStream {
    fn drop(&mut self) {
        let _ = self.stop_tx.send_timeout((), Duration::from_millis(100));
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn build_stream(
    device_name: Option<&str>,
    target_rate: u32,
    tx: Sender<Vec<f32>>,
) -> Result<cpal::Stream> {
    let host = cpal::default_host();

    let device = if let Some(name) = device_name {
        host.input_devices()
            .map_err(|e| BuddyError::Audio(format!("cannot enumerate devices: {e}")))?
            .find(|d| {
                d.description()
                    .ok()
                    .map(|desc| desc.name() == name)
                    .unwrap_or(false)
            })
            .ok_or_else(|| BuddyError::Audio(format!("input device '{name}' not found")))?
    } else {
        host.default_input_device()
            .ok_or_else(|| BuddyError::Audio("no default input device".into()))?
    };

    let device_label = device
        .description()
        .map(|d| d.name().to_owned())
        .unwrap_or_else(|_| "<unknown>".into());
    info!("using input device: {device_label}");

    let default_config = device
        .default_input_config()
        .map_err(|e| BuddyError::Audio(format!("no default input config: {e}")))?;
    let native_rate = default_config.sample_rate();
    let native_channels = default_config.channels();

    let stream_config = StreamConfig {
        channels: native_channels,
        sample_rate: native_rate,
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = device
        .build_input_stream(
            &stream_config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                let mono = if native_channels > 1 {
                    to_mono(data, native_channels)
                } else {
                    data.to_vec()
                };
                let samples = resample(&mono, native_rate, target_rate);
                // Never block the audio thread.
                if tx.try_send(samples).is_err() {
                    debug!("audio channel full, dropping chunk");
                }
            },
            move |err| {
                error!("audio input stream error: {err}");
            },
            None,
        )
        .map_err(|e| BuddyError::Audio(format!("failed to build input stream: {e}")))?;

    stream
        .play()
        .map_err(|e| BuddyError::Audio(format!("failed to start input stream: {e}")))?;

    info!(
        "audio capture started: native {}Hz/{}ch -> {}Hz mono",
        native_rate, native_channels, target_rate
    );
    Ok(stream)
}

/// Convert interleaved multi-channel audio to mono by averaging channels.
fn to_mono(data: &[f32], channels: u16) -> Vec<f32> {
    let ch = channels as usize;
    data.chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

/// Linear-interpolation resampler; adequate for speech bandwidth.
fn resample(samples: &[f32], src_rate: u32, dst_rate: u32) -> Vec<f32> {
    if src_rate == dst_rate || samples.is_empty() || dst_rate == 0 {
        return samples.to_vec();
    }

    let ratio = src_rate as f64 / dst_rate as f64;
    let out_len = (samples.len() as f64 / ratio) as usize;
    let mut output = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let src_pos = i as f64 * ratio;
        let idx = src_pos as usize;
        let frac = src_pos - idx as f64;

        let sample = if idx + 1 < samples.len() {
            samples[idx] as f64 * (1.0 - frac) + samples[idx + 1] as f64 * frac
        } else {
            samples[idx.min(samples.len() - 1)] as f64
        };
        output.push(sample as f32);
    }
    output
}

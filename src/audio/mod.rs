//! Microphone capture and energy-based phrase detection.

pub mod capture;
pub mod phrase;

pub use capture::MicrophoneStream;
pub use phrase::{EnergyCalibrator, PhraseDetector, PhraseEvent};

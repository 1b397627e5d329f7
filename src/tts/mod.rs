//! Text-to-speech.
//!
//! A [`SpeechSynthesizer`] speaks one utterance at a time and blocks until it
//! finishes or is stopped. [`SpeechQueue`] puts a single background speaker
//! in front of it so callers never wait on audio.

pub mod queue;
pub mod system_voice;

use crate::error::Result;

pub use queue::SpeechQueue;
pub use system_voice::SystemVoice;

/// Blocking, interruptible speech output.
pub trait SpeechSynthesizer: Send + Sync {
    /// Speak `text`, returning when playback ends or is stopped. Anything
    /// still playing is cut off first.
    ///
    /// # Errors
    ///
    /// Returns an error if the speech backend fails to start or exits with
    /// a failure status.
    fn speak(&self, text: &str) -> Result<()>;

    /// Terminate the utterance currently playing, if any.
    fn stop(&self);
}

//! Speech through the platform's command-line synthesizer.

use super::SpeechSynthesizer;
use crate::config::TtsConfig;
use crate::error::{BuddyError, Result};
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Commands tried in order when none is configured.
const CANDIDATES: &[&str] = &["say", "espeak-ng", "espeak", "spd-say"];

const POLL: Duration = Duration::from_millis(25);

/// Speaks by running `say`, `espeak-ng`, `espeak` or `spd-say` as a child
/// process. Stopping kills the child.
pub struct SystemVoice {
    program: String,
    voice: Option<String>,
    rate: u32,
    current: Mutex<Option<Child>>,
}

impl SystemVoice {
    /// # Errors
    ///
    /// Returns an error if no speech command is installed.
    pub fn new(config: &TtsConfig) -> Result<Self> {
        let program = match &config.command {
            Some(cmd) => which::which(cmd)
                .map(|_| cmd.clone())
                .map_err(|_| BuddyError::Tts(format!("speech command `{cmd}` not found")))?,
            None => detect_command().ok_or_else(|| {
                BuddyError::Tts(format!(
                    "no speech command found (tried {})",
                    CANDIDATES.join(", ")
                ))
            })?,
        };
        debug!(%program, "using system voice");
        Ok(Self {
            program,
            voice: config.voice.clone(),
            rate: config.rate,
            current: Mutex::new(None),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl SpeechSynthesizer for SystemVoice {
    fn speak(&self, text: &str) -> Result<()> {
        let args = build_args(&self.program, self.voice.as_deref(), self.rate, text);
        {
            let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(mut previous) = current.take() {
                let _ = previous.kill();
                let _ = previous.wait();
            }
            let child = Command::new(&self.program)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .map_err(|e| BuddyError::Tts(format!("failed to run {}: {e}", self.program)))?;
            *current = Some(child);
        }

        // Poll so `stop` can take the lock and kill the child meanwhile.
        loop {
            {
                let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
                let Some(child) = current.as_mut() else {
                    return Ok(());
                };
                match child.try_wait() {
                    Ok(Some(status)) => {
                        *current = None;
                        return if status.success() {
                            Ok(())
                        } else {
                            Err(BuddyError::Tts(format!(
                                "{} exited with {status}",
                                self.program
                            )))
                        };
                    }
                    Ok(None) => {}
                    Err(e) => {
                        *current = None;
                        return Err(BuddyError::Tts(format!("wait failed: {e}")));
                    }
                }
            }
            std::thread::sleep(POLL);
        }
    }

    fn stop(&self) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(mut child) = current.take() {
            if let Err(e) = child.kill() {
                warn!("failed to stop speech: {e}");
            }
            let _ = child.wait();
        }
    }
}

impl Drop for SystemVoice {
    fn drop(&mut self) {
        self.stop();
    }
}

fn detect_command() -> Option<String> {
    CANDIDATES
        .iter()
        .find(|c| which::which(c).is_ok())
        .map(|c| (*c).to_owned())
}

/// Arguments for `program` to speak `text`.
pub fn build_args(program: &str, voice: Option<&str>, rate: u32, text: &str) -> Vec<String> {
    let name = std::path::Path::new(program)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(program);
    let mut args = Vec::new();
    match name {
        "say" => {
            args.extend(["-r".to_owned(), rate.to_string()]);
            if let Some(v) = voice {
                args.extend(["-v".to_owned(), v.to_owned()]);
            }
        }
        "spd-say" => {
            // spd-say takes a relative rate in -100..=100 and returns at once
            // unless told to wait.
            let relative = (i64::from(rate) - 175).clamp(-100, 100);
            args.extend(["-w".to_owned(), "-r".to_owned(), relative.to_string()]);
            if let Some(v) = voice {
                args.extend(["-y".to_owned(), v.to_owned()]);
            }
        }
        _ => {
            args.extend(["-s".to_owned(), rate.to_string()]);
            if let Some(v) = voice {
                args.extend(["-v".to_owned(), v.to_owned()]);
            }
        }
    }
    args.push("--".to_owned());
    args.push(text.to_owned());
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn say_args() {
        assert_eq!(
            build_args("say", Some("Alex"), 225, "hello"),
            ["-r", "225", "-v", "Alex", "--", "hello"]
        );
    }

    #[test]
    fn espeak_args_without_voice() {
        assert_eq!(
            build_args("/usr/bin/espeak-ng", None, 180, "-dash first"),
            ["-s", "180", "--", "-dash first"]
        );
    }

    #[test]
    fn spd_say_rate_is_relative() {
        assert_eq!(
            build_args("spd-say", None, 400, "hi"),
            ["-w", "-r", "100", "--", "hi"]
        );
        assert_eq!(
            build_args("spd-say", None, 175, "hi"),
            ["-w", "-r", "0", "--", "hi"]
        );
    }

    #[test]
    fn missing_configured_command_is_an_error() {
        let config = TtsConfig {
            command: Some("definitely-not-a-speech-command".into()),
            ..TtsConfig::default()
        };
        assert!(SystemVoice::new(&config).is_err());
    }
}

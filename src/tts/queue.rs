//! Background speaker fed by a FIFO queue.

use super::SpeechSynthesizer;
use crate::config::TtsConfig;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const STOP_RETRY: Duration = Duration::from_millis(20);

enum SpeechItem {
    Say(String),
    Stop,
}

/// Queue of utterances spoken one at a time, in order.
pub struct SpeechQueue {
    tx: mpsc::UnboundedSender<SpeechItem>,
    synth: Arc<dyn SpeechSynthesizer>,
    pending: Arc<AtomicUsize>,
    closed: AtomicBool,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
    shutdown_timeout: Duration,
}

impl SpeechQueue {
    /// Start the speaker task. Must be called inside a tokio runtime.
    pub fn new(synth: Arc<dyn SpeechSynthesizer>, config: &TtsConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let pending = Arc::new(AtomicUsize::new(0));
        let shutdown_timeout = Duration::from_millis(config.shutdown_timeout_ms);
        let worker = tokio::spawn(run_speaker(
            rx,
            Arc::clone(&synth),
            Arc::clone(&pending),
            cancel.clone(),
            shutdown_timeout,
        ));
        Self {
            tx,
            synth,
            pending,
            closed: AtomicBool::new(false),
            cancel,
            worker: Mutex::new(Some(worker)),
            shutdown_timeout,
        }
    }

    /// Queue `text` for speaking. Returns `false` for blank text or once the
    /// queue has shut down.
    pub fn speak(&self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() || self.closed.load(Ordering::Acquire) {
            return false;
        }
        self.pending.fetch_add(1, Ordering::AcqRel);
        if self.tx.send(SpeechItem::Say(text.to_owned())).is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            debug!("speaker gone, dropping: {text}");
            return false;
        }
        true
    }

    /// Utterances queued or playing.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Wait up to `timeout` for everything queued to finish playing.
    /// Returns `true` if the queue went idle in time.
    pub async fn flush(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.pending() > 0 {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        true
    }

    /// Cut off the current utterance; queued ones still play.
    pub fn interrupt(&self) {
        self.synth.stop();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Reject new items, stop playback and join the speaker with a bounded
    /// wait. Items still queued are discarded. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cancel.cancel();
        let _ = self.tx.send(SpeechItem::Stop);
        self.synth.stop();

        let worker = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(mut handle) = worker {
            if tokio::time::timeout(self.shutdown_timeout, &mut handle)
                .await
                .is_err()
            {
                warn!(
                    "speaker did not stop within {:?}, aborting",
                    self.shutdown_timeout
                );
                handle.abort();
            }
        }
        info!("speech queue shut down");
    }
}

impl Drop for SpeechQueue {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_speaker(
    mut rx: mpsc::UnboundedReceiver<SpeechItem>,
    synth: Arc<dyn SpeechSynthesizer>,
    pending: Arc<AtomicUsize>,
    cancel: CancellationToken,
    stop_wait: Duration,
) {
    loop {
        let item = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            item = rx.recv() => item,
        };
        let text = match item {
            Some(SpeechItem::Say(text)) => text,
            Some(SpeechItem::Stop) | None => break,
        };

        debug!(%text, "speaking");
        let speaker = Arc::clone(&synth);
        let skip = cancel.clone();
        let mut playback = tokio::task::spawn_blocking(move || {
            if skip.is_cancelled() {
                return Ok(());
            }
            speaker.speak(&text)
        });
        tokio::select! {
            () = cancel.cancelled() => {
                stop_playback(synth.as_ref(), &mut playback, stop_wait).await;
                pending.fetch_sub(1, Ordering::AcqRel);
                break;
            }
            result = &mut playback => match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("speech failed: {e}"),
                Err(e) => warn!("speech task failed: {e}"),
            },
        }
        pending.fetch_sub(1, Ordering::AcqRel);
    }

    rx.close();
    let mut discarded = 0_usize;
    while let Ok(item) = rx.try_recv() {
        if matches!(item, SpeechItem::Say(_)) {
            pending.fetch_sub(1, Ordering::AcqRel);
            discarded += 1;
        }
    }
    if discarded > 0 {
        debug!(discarded, "dropped queued speech on shutdown");
    }
}

/// Keep stopping the synthesizer until the in-flight `speak` returns.
///
/// The blocking call may not have started its process yet when shutdown
/// begins, so a single `stop` can land before there is anything to stop.
async fn stop_playback(
    synth: &dyn SpeechSynthesizer,
    playback: &mut JoinHandle<crate::error::Result<()>>,
    wait: Duration,
) {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        synth.stop();
        tokio::select! {
            _ = &mut *playback => return,
            () = tokio::time::sleep(STOP_RETRY) => {}
        }
        if tokio::time::Instant::now() >= deadline {
            warn!("speech still playing after {wait:?}");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::error::{BuddyError, Result};
    use std::time::Instant;

    #[derive(Default)]
    struct Recorder {
        spoken: Mutex<Vec<String>>,
        stopped: AtomicBool,
        slow: bool,
    }

    impl SpeechSynthesizer for Recorder {
        fn speak(&self, text: &str) -> Result<()> {
            self.spoken.lock().unwrap().push(text.to_owned());
            if self.slow {
                let deadline = Instant::now() + Duration::from_secs(2);
                while !self.stopped.load(Ordering::SeqCst) && Instant::now() < deadline {
                    std::thread::sleep(Duration::from_millis(5));
                }
            }
            if text == "b" {
                return Err(BuddyError::Tts("boom".into()));
            }
            Ok(())
        }

        fn stop(&self) {
            self.stopped.store(true, Ordering::SeqCst);
        }
    }

    async fn wait_for(recorder: &Recorder, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while recorder.spoken.lock().unwrap().len() < count && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn speaks_in_order_despite_failure() {
        let recorder = Arc::new(Recorder::default());
        let queue = SpeechQueue::new(recorder.clone(), &TtsConfig::default());

        assert!(queue.speak("a"));
        assert!(queue.speak("b"));
        assert!(queue.speak("c"));
        assert!(queue.flush(Duration::from_secs(2)).await);
        assert_eq!(queue.pending(), 0);
        queue.shutdown().await;

        assert_eq!(*recorder.spoken.lock().unwrap(), ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn blank_and_post_shutdown_items_are_rejected() {
        let recorder = Arc::new(Recorder::default());
        let queue = SpeechQueue::new(recorder.clone(), &TtsConfig::default());

        assert!(!queue.speak("   "));
        queue.shutdown().await;
        queue.shutdown().await;
        assert!(queue.is_closed());
        assert!(!queue.speak("too late"));
        assert!(recorder.spoken.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn shutdown_stops_playback_and_discards_backlog() {
        let recorder = Arc::new(Recorder {
            slow: true,
            ..Recorder::default()
        });
        let queue = SpeechQueue::new(recorder.clone(), &TtsConfig::default());

        queue.speak("a");
        queue.speak("c");
        queue.speak("d");
        wait_for(&recorder, 1).await;

        let started = Instant::now();
        queue.shutdown().await;
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(recorder.stopped.load(Ordering::SeqCst));
        assert_eq!(*recorder.spoken.lock().unwrap(), ["a"]);
        assert_eq!(queue.pending(), 0);
    }

    /// Speaks only after a delay, and `stop` can only kill what has started.
    #[derive(Default)]
    struct LateStarter {
        playing: AtomicBool,
        finished: AtomicBool,
        kills: AtomicUsize,
    }

    impl SpeechSynthesizer for LateStarter {
        fn speak(&self, _: &str) -> Result<()> {
            std::thread::sleep(Duration::from_millis(100));
            self.playing.store(true, Ordering::SeqCst);
            let deadline = Instant::now() + Duration::from_secs(3);
            while self.playing.load(Ordering::SeqCst) && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(5));
            }
            self.finished.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self) {
            if self.playing.swap(false, Ordering::SeqCst) {
                self.kills.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[tokio::test]
    async fn shutdown_stops_playback_that_starts_late() {
        let voice = Arc::new(LateStarter::default());
        let queue = SpeechQueue::new(voice.clone(), &TtsConfig::default());

        assert!(queue.speak("a"));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!voice.playing.load(Ordering::SeqCst));

        let started = Instant::now();
        queue.shutdown().await;
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(voice.finished.load(Ordering::SeqCst));
        assert!(!voice.playing.load(Ordering::SeqCst));
        assert_eq!(voice.kills.load(Ordering::SeqCst), 1);
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn long_backlog_is_spoken_in_full() {
        let recorder = Arc::new(Recorder::default());
        let queue = SpeechQueue::new(recorder.clone(), &TtsConfig::default());

        let lines: Vec<String> = (0..200).map(|i| format!("line {i}")).collect();
        for line in &lines {
            assert!(queue.speak(line));
        }
        assert!(queue.flush(Duration::from_secs(5)).await);
        queue.shutdown().await;

        assert_eq!(*recorder.spoken.lock().unwrap(), lines);
    }
}

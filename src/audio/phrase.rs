//! Energy-based phrase segmentation.
//!
//! [`EnergyCalibrator`] measures the ambient level during calibration and
//! derives a speech threshold from it. [`PhraseDetector`] then cuts the
//! incoming chunks into phrases: a phrase starts with the first loud chunk
//! and ends after a run of quiet audio or when it reaches the phrase limit.

/// Compute RMS energy of audio samples.
pub fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Accumulates ambient energy during calibration.
#[derive(Debug, Default)]
pub struct EnergyCalibrator {
    total: f64,
    samples: usize,
}

impl EnergyCalibrator {
    pub fn add(&mut self, chunk: &[f32]) {
        let sum_sq: f64 = chunk.iter().map(|s| f64::from(*s) * f64::from(*s)).sum();
        self.total += sum_sq;
        self.samples += chunk.len();
    }

    /// Number of samples seen.
    pub fn sample_count(&self) -> usize {
        self.samples
    }

    /// Ambient RMS level, or `None` if no audio was seen.
    pub fn ambient_level(&self) -> Option<f32> {
        (self.samples > 0).then(|| (self.total / self.samples as f64).sqrt() as f32)
    }

    /// Speech threshold: `ratio` times the ambient level, at least `floor`.
    pub fn threshold(&self, ratio: f32, floor: f32) -> Option<f32> {
        self.ambient_level().map(|level| (level * ratio).max(floor))
    }
}

/// Outcome of feeding one chunk to a [`PhraseDetector`].
#[derive(Debug, PartialEq)]
pub enum PhraseEvent {
    /// Nothing heard yet.
    Waiting,
    /// Inside a phrase.
    InPhrase,
    /// A phrase ended; these are its samples.
    Complete(Vec<f32>),
}

/// Splits a chunk stream into phrases.
#[derive(Debug)]
pub struct PhraseDetector {
    threshold: f32,
    pause_samples: usize,
    max_samples: usize,
    buffer: Vec<f32>,
    in_phrase: bool,
    trailing_silence: usize,
}

impl PhraseDetector {
    /// `pause_samples` of quiet audio end a phrase; `max_samples` caps its length.
    pub fn new(threshold: f32, pause_samples: usize, max_samples: usize) -> Self {
        Self {
            threshold,
            pause_samples: pause_samples.max(1),
            max_samples: max_samples.max(1),
            buffer: Vec::new(),
            in_phrase: false,
            trailing_silence: 0,
        }
    }

    pub fn in_phrase(&self) -> bool {
        self.in_phrase
    }

    pub fn push(&mut self, chunk: &[f32]) -> PhraseEvent {
        let loud = rms_energy(chunk) > self.threshold;

        if !self.in_phrase {
            if !loud {
                return PhraseEvent::Waiting;
            }
            self.in_phrase = true;
            self.buffer.clear();
            self.trailing_silence = 0;
        }

        self.buffer.extend_from_slice(chunk);
        if loud {
            self.trailing_silence = 0;
        } else {
            self.trailing_silence += chunk.len();
        }

        if self.trailing_silence >= self.pause_samples || self.buffer.len() >= self.max_samples {
            return PhraseEvent::Complete(self.finish());
        }
        PhraseEvent::InPhrase
    }

    /// End the current phrase early (e.g. at a deadline) and return what was heard.
    pub fn finish(&mut self) -> Vec<f32> {
        self.in_phrase = false;
        self.trailing_silence = 0;
        let mut samples = std::mem::take(&mut self.buffer);
        samples.truncate(self.max_samples);
        samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loud(n: usize) -> Vec<f32> {
        vec![0.5; n]
    }

    fn quiet(n: usize) -> Vec<f32> {
        vec![0.0; n]
    }

    #[test]
    fn rms_of_constant_signal() {
        assert!((rms_energy(&[0.5, -0.5, 0.5]) - 0.5).abs() < 1e-6);
        assert_eq!(rms_energy(&[]), 0.0);
    }

    #[test]
    fn calibrator_threshold_respects_floor() {
        let mut cal = EnergyCalibrator::default();
        assert_eq!(cal.threshold(1.5, 0.01), None);
        cal.add(&[0.001; 100]);
        let t = cal.threshold(1.5, 0.01).unwrap_or(0.0);
        assert!((t - 0.01).abs() < 1e-6);

        let mut cal = EnergyCalibrator::default();
        cal.add(&[0.1; 100]);
        let t = cal.threshold(2.0, 0.01).unwrap_or(0.0);
        assert!((t - 0.2).abs() < 1e-5);
    }

    #[test]
    fn phrase_ends_after_pause() {
        let mut det = PhraseDetector::new(0.1, 200, 10_000);
        assert_eq!(det.push(&quiet(100)), PhraseEvent::Waiting);
        assert_eq!(det.push(&loud(100)), PhraseEvent::InPhrase);
        assert_eq!(det.push(&quiet(100)), PhraseEvent::InPhrase);
        match det.push(&quiet(100)) {
            PhraseEvent::Complete(samples) => assert_eq!(samples.len(), 300),
            other => panic!("expected complete phrase, got {other:?}"),
        }
        assert!(!det.in_phrase());
    }

    #[test]
    fn phrase_is_capped_at_limit() {
        let mut det = PhraseDetector::new(0.1, 1_000, 250);
        assert_eq!(det.push(&loud(100)), PhraseEvent::InPhrase);
        assert_eq!(det.push(&loud(100)), PhraseEvent::InPhrase);
        match det.push(&loud(100)) {
            PhraseEvent::Complete(samples) => assert_eq!(samples.len(), 250),
            other => panic!("expected complete phrase, got {other:?}"),
        }
    }
}

// Pitch sampling - Monophonic fundamental estimation for the frame loop
// Normalized autocorrelation (MPM-style) over a preallocated ring buffer

use super::frame::AnalysisFrame;

/// Pitch sampler failures
///
/// Any error from the sampler is fatal for the session: the engine logs it,
/// halts the frame loop and does not restart automatically.
#[derive(Debug, thiserror::Error)]
pub enum PitchError {
    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("pitch backend failed: {0}")]
    Backend(String),
}

/// External collaborator seam: anything that can turn an audio frame into
/// an `AnalysisFrame`
pub trait PitchSampler {
    fn analyze(&mut self, samples: &[f32], time: f64) -> Result<AnalysisFrame, PitchError>;
}

/// Time-domain pitch detector via normalized autocorrelation
///
/// Incoming blocks are pushed into a mono ring buffer; each `analyze` call
/// correlates the most recent window against itself over the lag range
/// derived from [min_freq, max_freq]. Clarity is `r_max / r0`. A continuity
/// heuristic pulls low-confidence estimates toward the previous octave.
/// No heap allocation after construction.
pub struct AutocorrelationSampler {
    ring: Vec<f32>,
    ring_pos: usize,
    filled: usize,

    sample_rate: u32,
    window: usize,
    min_tau: usize,
    max_tau: usize,

    last_f0: Option<f32>,
    min_freq: f32,
    max_freq: f32,

    // Reused analysis window, kept to avoid per-call allocation
    scratch: Vec<f32>,
}

impl AutocorrelationSampler {
    /// Create a sampler for the given sample rate
    ///
    /// Defaults suit vocal-range input (80-1000 Hz).
    pub fn new(sample_rate: u32) -> Result<Self, PitchError> {
        if !(8_000..=192_000).contains(&sample_rate) {
            return Err(PitchError::InvalidSampleRate(sample_rate));
        }

        let min_freq = 80.0f32;
        let max_freq = 1000.0f32;

        // Window: tradeoff between latency and stability
        let window: usize = if sample_rate >= 44_100 { 1024 } else { 512 };

        // Lag range from frequency range: tau = sample_rate / f0
        let min_tau = ((sample_rate as f32) / max_freq).floor().max(2.0) as usize;
        let max_tau = (((sample_rate as f32) / min_freq).ceil() as usize)
            .min(window.saturating_sub(2))
            .max(min_tau + 1);

        let ring_len = (window * 2).max(window + max_tau + 4);

        Ok(Self {
            ring: vec![0.0; ring_len],
            ring_pos: 0,
            filled: 0,
            sample_rate,
            window,
            min_tau,
            max_tau,
            last_f0: None,
            min_freq,
            max_freq,
            scratch: vec![0.0; window],
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples needed before estimates become available
    pub fn window_len(&self) -> usize {
        self.window
    }

    #[inline]
    fn push_sample(&mut self, s: f32) {
        self.ring[self.ring_pos] = s;
        self.ring_pos = (self.ring_pos + 1) % self.ring.len();
        self.filled = self.filled.saturating_add(1).min(self.ring.len());
    }

    // Copy the last `window` samples (ending at ring_pos) into scratch
    fn read_window(&mut self) {
        let n = self.scratch.len();
        let len = self.ring.len();
        let mut idx = if self.ring_pos >= n {
            self.ring_pos - n
        } else {
            len + self.ring_pos - n
        };

        for d in self.scratch.iter_mut() {
            *d = self.ring[idx];
            idx += 1;
            if idx == len {
                idx = 0;
            }
        }
    }

    // Normalized autocorrelation estimate over the scratch window:
    // pick the lag with maximal r[tau], clarity = r_max / r0
    fn estimate_f0(&self) -> Option<(f32, f32)> {
        let w = &self.scratch;

        // Remove DC for better correlation
        let mean = w.iter().sum::<f32>() / w.len() as f32;

        let mut r0 = 0.0f32;
        for &v in w.iter() {
            let x = v - mean;
            r0 += x * x;
        }
        if r0 <= 1e-8 {
            return None;
        }

        let mut best_tau = 0usize;
        let mut best_r = -1.0f32;

        for tau in self.min_tau..=self.max_tau {
            let limit = w.len().saturating_sub(tau);
            if limit < 4 {
                break;
            }

            let mut r = 0.0f32;
            for i in 0..limit {
                r += (w[i] - mean) * (w[i + tau] - mean);
            }

            if r > best_r {
                best_r = r;
                best_tau = tau;
            }
        }

        if best_tau == 0 {
            return None;
        }

        let clarity = (best_r / r0).clamp(0.0, 1.0);
        let f0 = self.sample_rate as f32 / best_tau as f32;

        if !(f0.is_finite() && f0 >= self.min_freq * 0.8 && f0 <= self.max_freq * 1.2) {
            return None;
        }

        Some((f0, clarity))
    }

    // Prefer continuity over raw estimates when confidence is low: if f0 is
    // close to double or half the previous value, pull it toward the octave
    // we were already tracking
    fn octave_correct(&self, f0: f32, clarity: f32) -> f32 {
        let Some(prev) = self.last_f0 else { return f0 };
        if clarity >= 0.65 {
            return f0;
        }

        let dist = |a: f32| (a - prev).abs();

        let mut best = f0;
        let mut best_dist = dist(f0);

        if dist(f0 * 2.0) < best_dist {
            best = f0 * 2.0;
            best_dist = dist(f0 * 2.0);
        }
        if dist(f0 * 0.5) < best_dist {
            best = f0 * 0.5;
        }
        best
    }
}

impl PitchSampler for AutocorrelationSampler {
    fn analyze(&mut self, samples: &[f32], time: f64) -> Result<AnalysisFrame, PitchError> {
        // Frame energy comes from the incoming block, not the ring, so a
        // silent block reads as silent even while old audio sits buffered
        let rms = if samples.is_empty() {
            0.0
        } else {
            (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
        };

        for &s in samples {
            self.push_sample(s);
        }

        if self.filled < self.window {
            return Ok(AnalysisFrame {
                time,
                frequency: None,
                clarity: 0.0,
                rms,
            });
        }

        self.read_window();
        let Some((raw_f0, clarity)) = self.estimate_f0() else {
            return Ok(AnalysisFrame {
                time,
                frequency: None,
                clarity: 0.0,
                rms,
            });
        };

        let f0 = self.octave_correct(raw_f0, clarity);
        self.last_f0 = Some(f0);

        Ok(AnalysisFrame {
            time,
            frequency: Some(f0),
            clarity,
            rms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 48_000;

    fn sine_block(freq: f32, start_sample: usize, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = (start_sample + i) as f32 / SAMPLE_RATE as f32;
                (2.0 * std::f32::consts::PI * freq * t).sin() * 0.5
            })
            .collect()
    }

    #[test]
    fn test_rejects_bad_sample_rate() {
        assert!(matches!(
            AutocorrelationSampler::new(100),
            Err(PitchError::InvalidSampleRate(100))
        ));
        assert!(AutocorrelationSampler::new(SAMPLE_RATE).is_ok());
    }

    #[test]
    fn test_no_estimate_before_window_fills() {
        let mut sampler = AutocorrelationSampler::new(SAMPLE_RATE).unwrap();
        let block = sine_block(440.0, 0, 256);

        let frame = sampler.analyze(&block, 0.0).unwrap();
        assert!(frame.frequency.is_none());
        assert!(frame.rms > 0.0);
    }

    #[test]
    fn test_detects_a440() {
        let mut sampler = AutocorrelationSampler::new(SAMPLE_RATE).unwrap();

        let mut frame = AnalysisFrame::silent(0.0);
        for i in 0..4 {
            let block = sine_block(440.0, i * 1024, 1024);
            frame = sampler.analyze(&block, i as f64 * 0.02).unwrap();
        }

        let f0 = frame.frequency.expect("expected a pitch estimate");
        // Lag quantization at 48kHz: 109 samples -> 440.4 Hz
        assert!((f0 - 440.0).abs() < 5.0, "estimated {} Hz", f0);
        assert!(frame.clarity > 0.7);
    }

    #[test]
    fn test_silence_has_no_pitch() {
        let mut sampler = AutocorrelationSampler::new(SAMPLE_RATE).unwrap();

        let silence = vec![0.0f32; 1024];
        let mut frame = AnalysisFrame::silent(0.0);
        for i in 0..3 {
            frame = sampler.analyze(&silence, i as f64 * 0.02).unwrap();
        }

        assert!(frame.frequency.is_none());
        assert_eq!(frame.rms, 0.0);
    }

    #[test]
    fn test_tracks_a_pitch_change() {
        let mut sampler = AutocorrelationSampler::new(SAMPLE_RATE).unwrap();

        for i in 0..4 {
            sampler.analyze(&sine_block(220.0, i * 1024, 1024), 0.0).unwrap();
        }
        // Feed enough of the new pitch to flush the window
        let mut frame = AnalysisFrame::silent(0.0);
        for i in 4..8 {
            frame = sampler.analyze(&sine_block(330.0, i * 1024, 1024), 0.0).unwrap();
        }

        let f0 = frame.frequency.expect("expected a pitch estimate");
        assert!((f0 - 330.0).abs() < 5.0, "estimated {} Hz", f0);
    }
}

// Analysis frame - One pitch-sampler output per processed audio frame

/// Result of analyzing one audio frame
///
/// `frequency` is `None` when the sampler found no usable periodicity.
/// `clarity` is the detector's confidence in [0, 1]; `rms` is the frame's
/// energy. Gating against thresholds is the segmenter's job, not the
/// sampler's.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisFrame {
    /// Session-relative time of the frame in seconds
    pub time: f64,
    /// Detected fundamental in Hz, if any
    pub frequency: Option<f32>,
    /// Detection confidence, 0..=1
    pub clarity: f32,
    /// Frame energy (root mean square)
    pub rms: f32,
}

impl AnalysisFrame {
    /// Frame with no detectable signal
    pub fn silent(time: f64) -> Self {
        Self {
            time,
            frequency: None,
            clarity: 0.0,
            rms: 0.0,
        }
    }

    /// Whether this frame qualifies as a sounding, confidently pitched note
    pub fn is_voiced(&self, volume_threshold: f32, clarity_threshold: f32) -> bool {
        self.frequency.is_some() && self.rms > volume_threshold && self.clarity > clarity_threshold
    }
}

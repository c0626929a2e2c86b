// Engine configuration - Session settings with validation and JSON support

use crate::sequencer::grid::GridClock;
use crate::sequencer::segmenter::SegmenterConfig;
use crate::sequencer::store::WriteMode;
use crate::sequencer::timeline::{Tempo, TimeSignature};

/// Grid divisions that divide the MIDI tick resolution evenly
pub const SUPPORTED_GRID_DIVISIONS: [u32; 6] = [1, 2, 4, 8, 16, 32];

/// Configuration errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("BPM {0} outside supported range 20-999")]
    BpmOutOfRange(f64),

    #[error("loop must span at least one bar")]
    ZeroBars,

    #[error("unsupported grid division: {0}")]
    UnsupportedDivision(u32),

    #[error("silence duration must be positive, got {0}")]
    InvalidSilenceDuration(f64),

    #[error("max note length must be at least one grid cell")]
    ZeroMaxNoteCells,
}

/// Full session configuration
///
/// Grid-affecting fields (`bpm`, `bars`, `grid_division`) take effect at
/// the next cycle start; thresholds and the write mode apply immediately.
/// Committed notes are never requantized by a configuration change.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EngineConfig {
    pub bpm: f64,
    pub bars: u32,
    pub grid_division: u32,

    /// Minimum frame RMS for a note to sound
    pub volume_threshold: f32,
    /// Minimum pitch-detection confidence
    pub clarity_threshold: f32,
    /// Continuous silence (seconds) that closes the active note
    pub silence_duration: f64,
    /// Maximum note length in grid cells before it splits
    pub max_note_cells: u32,

    /// How closed notes are written into the store
    pub write_mode: WriteMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            bars: 2,
            grid_division: 4,
            volume_threshold: 0.01,
            clarity_threshold: 0.7,
            silence_duration: 0.1,
            max_note_cells: 8,
            write_mode: WriteMode::Add,
        }
    }
}

impl EngineConfig {
    /// Check every field; the engine rejects invalid configurations
    /// without touching its state
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(20.0..=999.0).contains(&self.bpm) {
            return Err(ConfigError::BpmOutOfRange(self.bpm));
        }
        if self.bars == 0 {
            return Err(ConfigError::ZeroBars);
        }
        if !SUPPORTED_GRID_DIVISIONS.contains(&self.grid_division) {
            return Err(ConfigError::UnsupportedDivision(self.grid_division));
        }
        if !(self.silence_duration > 0.0) {
            return Err(ConfigError::InvalidSilenceDuration(self.silence_duration));
        }
        if self.max_note_cells == 0 {
            return Err(ConfigError::ZeroMaxNoteCells);
        }
        Ok(())
    }

    /// Build the grid clock for this configuration (must be validated)
    pub fn grid_clock(&self) -> GridClock {
        GridClock::new(
            Tempo::new(self.bpm),
            TimeSignature::four_four(),
            self.bars,
            self.grid_division,
        )
    }

    /// Segmentation thresholds for this configuration
    pub fn segmenter_config(&self) -> SegmenterConfig {
        SegmenterConfig {
            volume_threshold: self.volume_threshold,
            clarity_threshold: self.clarity_threshold,
            silence_duration: self.silence_duration,
            max_note_cells: self.max_note_cells,
        }
    }

    /// Whether applying `other` requires rebuilding the grid at cycle start
    pub fn grid_differs(&self, other: &EngineConfig) -> bool {
        self.bpm != other.bpm
            || self.bars != other.bars
            || self.grid_division != other.grid_division
    }
}

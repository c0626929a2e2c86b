// Generative model seam - The external companion model as a trait
// The model is injected where it is used, never looked up from globals

use crate::sequencer::note::Note;

/// A note in the model's own time units (seconds), the wire shape
/// exchanged with the generative collaborator
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModelNote {
    pub pitch: u8,
    pub start_time: f64,
    pub end_time: f64,
    pub velocity: u8,
}

impl From<&Note> for ModelNote {
    fn from(note: &Note) -> Self {
        Self {
            pitch: note.pitch,
            start_time: note.start_time,
            end_time: note.end_time,
            velocity: note.velocity,
        }
    }
}

/// Inclusive pitch range the model accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PitchRange {
    pub min: u8,
    pub max: u8,
}

impl PitchRange {
    pub fn new(min: u8, max: u8) -> Self {
        assert!(min <= max, "Pitch range min must not exceed max");
        Self { min, max }
    }

    pub fn contains(&self, pitch: u8) -> bool {
        (self.min..=self.max).contains(&pitch)
    }
}

/// Generation failures
///
/// All of these are recoverable: the dispatcher logs them, clears its
/// pending slot and lets a later loop boundary retry.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GenerationError {
    #[error("model backend unavailable: {0}")]
    Unavailable(String),

    #[error("model rejected phrase: {0}")]
    Rejected(String),

    #[error("model worker terminated before responding")]
    WorkerDied,
}

/// The external generative model
///
/// `generate` receives the combined phrase and answers with a response
/// phrase in its own time units. Implementations run on a worker thread,
/// hence `Send + Sync`.
pub trait GenerativeModel: Send + Sync {
    /// Pitches the model accepts; out-of-range input notes are dropped
    /// before dispatch, not clamped
    fn pitch_range(&self) -> PitchRange;

    fn generate(&self, phrase: &[ModelNote]) -> Result<Vec<ModelNote>, GenerationError>;
}

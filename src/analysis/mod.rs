// Analysis module - Pitch extraction from live audio frames

pub mod frame;
pub mod pitch;

pub use frame::AnalysisFrame;
pub use pitch::{AutocorrelationSampler, PitchError, PitchSampler};

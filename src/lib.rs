// Loopmate - Library exports for the companion pipeline, tests and benchmarks

pub mod analysis;
pub mod engine;
pub mod generation;
pub mod messaging;
pub mod midi;
pub mod sequencer;

// Re-export commonly used types for convenience
pub use analysis::frame::AnalysisFrame;
pub use analysis::pitch::{AutocorrelationSampler, PitchError, PitchSampler};
pub use engine::config::{ConfigError, EngineConfig};
pub use engine::pipeline::{CompanionEngine, EngineError, FrameOutcome};
pub use generation::dispatcher::{GenerationDispatcher, GenerationOutcome};
pub use generation::gate::PhraseDiffGate;
pub use generation::model::{GenerationError, GenerativeModel, ModelNote, PitchRange};
pub use messaging::channels::{create_frame_channel, create_notification_channel};
pub use messaging::notification::{Notification, NotificationCategory, NotificationLevel};
pub use midi::export::{ExportTrack, MidiExportError, render_smf, write_midi_file};
pub use sequencer::{
    CommittedNoteStore, GridClock, LoopBoundaryDetector, Note, NoteSegmenter, SegmenterConfig,
    Tempo, TimeSignature, Transport, WriteMode, combine_sustained, midi_note_from_hz,
};

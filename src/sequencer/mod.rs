// Sequencer module
// Grid time, note model, segmentation and loop-cycle infrastructure

pub mod boundary;
pub mod combiner;
pub mod grid;
pub mod note;
pub mod segmenter;
pub mod store;
pub mod timeline;
pub mod transport;

pub use boundary::LoopBoundaryDetector;
pub use combiner::combine_sustained;
pub use grid::GridClock;
pub use note::{DEFAULT_VELOCITY, Note, midi_note_from_hz, semitone_offset};
pub use segmenter::{ActiveNoteState, NoteSegmenter, SegmenterConfig};
pub use store::{CommittedNoteStore, WriteMode};
pub use timeline::{Tempo, TimeSignature};
pub use transport::{SharedTransportState, Transport};

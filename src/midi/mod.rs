// MIDI module - Standard MIDI File serialization of the note model

pub mod export;

pub use export::{ExportTrack, MidiExportError, TICKS_PER_QUARTER, render_smf, write_midi_file};

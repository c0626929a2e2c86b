// Note segmenter - Continuous pitch stream to discrete notes
// Per-frame state machine applying onset, hysteresis, duration-split and
// silence-offset rules

use crate::analysis::frame::AnalysisFrame;

use super::grid::GridClock;
use super::note::{DEFAULT_VELOCITY, Note, midi_note_from_hz, semitone_offset};

/// Segmentation thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmenterConfig {
    /// Minimum frame RMS for a note to sound
    pub volume_threshold: f32,
    /// Minimum pitch-detection confidence for onset and continuation
    pub clarity_threshold: f32,
    /// Continuous silence (seconds) after which the active note closes.
    /// One threshold governs closure; a note closes exactly once.
    pub silence_duration: f64,
    /// Maximum length of a single note in grid cells before it splits
    pub max_note_cells: u32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            volume_threshold: 0.01,
            clarity_threshold: 0.7,
            silence_duration: 0.1,
            max_note_cells: 8,
        }
    }
}

/// The single note currently being tracked between onset and offset
///
/// Owned exclusively by the segmenter; converted into a `Note` and
/// destroyed when the offset (or a split) arrives.
#[derive(Debug, Clone, Copy)]
pub struct ActiveNoteState {
    /// Detected frequency at onset, the reference for hysteresis
    pub pitch_hz: f32,
    pub start_time: f64,
    pub start_position: u32,
    pub last_update_time: f64,
}

impl ActiveNoteState {
    fn open(pitch_hz: f32, time: f64, position: u32) -> Self {
        Self {
            pitch_hz,
            start_time: time,
            start_position: position,
            last_update_time: time,
        }
    }

    fn close(&self, time: f64, grid: &GridClock) -> Note {
        Note::new(
            midi_note_from_hz(self.pitch_hz),
            self.start_position,
            grid.position_of(time),
            self.start_time,
            time,
            DEFAULT_VELOCITY,
        )
    }
}

/// Per-frame state machine turning (pitch, clarity, energy) samples into
/// closed `Note` records.
///
/// States are Idle (no active note) and Active (exactly one). Transitions,
/// evaluated once per frame:
/// - onset: energy above the volume threshold, clarity above the clarity
///   threshold, and a defined pitch
/// - continuation: onset conditions hold and the pitch stays within one
///   semitone of the active note's onset pitch
/// - split-and-restart: the pitch moves a full semitone or more, or the
///   active duration reaches `max_note_cells` grid cells - the close and
///   the reopen happen within the same frame
/// - offset: the frame stops qualifying as voiced for `silence_duration`
///   seconds of continuous time
///
/// Each call returns at most one closed note, ready to commit.
#[derive(Debug)]
pub struct NoteSegmenter {
    config: SegmenterConfig,
    active: Option<ActiveNoteState>,
    silence_since: Option<f64>,
}

impl NoteSegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self {
            config,
            active: None,
            silence_since: None,
        }
    }

    /// Currently tracked note, if any
    pub fn active(&self) -> Option<&ActiveNoteState> {
        self.active.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Replace thresholds; takes effect on the next frame
    pub fn set_config(&mut self, config: SegmenterConfig) {
        self.config = config;
    }

    /// Advance the state machine by one frame
    ///
    /// Returns the note closed on this frame, if any. On a split the
    /// returned note's successor is already open when the call returns.
    pub fn process_frame(&mut self, frame: &AnalysisFrame, grid: &GridClock) -> Option<Note> {
        let voiced = frame.is_voiced(self.config.volume_threshold, self.config.clarity_threshold);

        let Some(active) = self.active else {
            if voiced {
                let frequency = frame.frequency.expect("voiced frame has a frequency");
                self.active = Some(ActiveNoteState::open(
                    frequency,
                    frame.time,
                    grid.position_of(frame.time),
                ));
            }
            self.silence_since = None;
            return None;
        };

        if !voiced {
            // Run the silence timer; the note survives short dropouts
            let since = *self.silence_since.get_or_insert(frame.time);
            if frame.time - since >= self.config.silence_duration {
                self.active = None;
                self.silence_since = None;
                return Some(active.close(frame.time, grid));
            }
            return None;
        }

        self.silence_since = None;
        let frequency = frame.frequency.expect("voiced frame has a frequency");

        let pitch_moved = semitone_offset(active.pitch_hz, frequency).abs() >= 1.0
            && midi_note_from_hz(frequency) != midi_note_from_hz(active.pitch_hz);
        let max_duration = self.config.max_note_cells as f64 * grid.seconds_per_cell();
        let over_length = frame.time - active.start_time >= max_duration;

        if pitch_moved || over_length {
            // Split-and-restart: close and reopen atomically within this
            // frame so no frame observes a gap
            let closed = active.close(frame.time, grid);
            self.active = Some(ActiveNoteState::open(
                frequency,
                frame.time,
                grid.position_of(frame.time),
            ));
            return Some(closed);
        }

        if let Some(active) = self.active.as_mut() {
            active.last_update_time = frame.time;
        }
        None
    }

    /// Close the active note unconditionally (session stop)
    pub fn flush(&mut self, time: f64, grid: &GridClock) -> Option<Note> {
        self.silence_since = None;
        self.active.take().map(|active| active.close(time, grid))
    }

    /// Drop all transient state without emitting a note
    pub fn reset(&mut self) {
        self.active = None;
        self.silence_since = None;
    }
}

// Note representation for the companion pipeline
// A note is a committed pitch with a grid-cell span and a wall-clock span

/// Default velocity for notes committed from the live pitch stream
pub const DEFAULT_VELOCITY: u8 = 100;

/// A committed musical note
///
/// Positions are grid-cell indices, unique modulo the loop's total cell
/// count. `end_position` is always reachable from `start_position` by
/// forward wraparound stepping; a note never spans more than one full loop.
/// Times are seconds on the session clock and survive grid reconfiguration
/// unchanged.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Note {
    /// MIDI note number (0-127, where 60 = C4)
    pub pitch: u8,

    /// Grid cell where the note starts
    pub start_position: u32,

    /// Grid cell where the note ends (wraparound-aware)
    pub end_position: u32,

    /// Onset time in seconds
    pub start_time: f64,

    /// Offset time in seconds
    pub end_time: f64,

    /// MIDI velocity (0-127, where 127 = maximum)
    pub velocity: u8,
}

impl Note {
    /// Creates a new note
    pub fn new(
        pitch: u8,
        start_position: u32,
        end_position: u32,
        start_time: f64,
        end_time: f64,
        velocity: u8,
    ) -> Self {
        assert!(pitch <= 127, "MIDI pitch must be 0-127");
        assert!(velocity <= 127, "MIDI velocity must be 0-127");

        Self {
            pitch,
            start_position,
            end_position,
            start_time,
            end_time,
            velocity,
        }
    }

    /// Duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Get the note name (e.g., "C4", "A#5")
    pub fn note_name(&self) -> String {
        const NOTE_NAMES: [&str; 12] = [
            "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
        ];

        let octave = (self.pitch / 12) as i32 - 1;
        let note_index = (self.pitch % 12) as usize;

        format!("{}{}", NOTE_NAMES[note_index], octave)
    }
}

/// Map a frequency in Hz to the nearest MIDI note number
///
/// `midi = round(69 + 12 * log2(f / 440))`, clamped to [0, 127].
/// Non-positive or non-finite frequencies clamp to 0.
pub fn midi_note_from_hz(frequency: f32) -> u8 {
    if !frequency.is_finite() || frequency <= 0.0 {
        return 0;
    }
    let midi = 69.0 + 12.0 * (frequency / 440.0).log2();
    midi.round().clamp(0.0, 127.0) as u8
}

/// Signed distance in semitones from `from_hz` to `to_hz`
pub fn semitone_offset(from_hz: f32, to_hz: f32) -> f32 {
    12.0 * (to_hz / from_hz).log2()
}

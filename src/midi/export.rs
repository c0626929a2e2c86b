// MIDI export - Committed and generated notes to a Standard MIDI File
// Uses the `midly` crate; output is SMF Format 1 (tempo track + one track
// per note list)

use crate::sequencer::grid::GridClock;
use crate::sequencer::note::Note;
use midly::{
    Format, Header, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use std::path::Path;

/// Ticks per quarter note in MIDI output (standard resolution)
pub const TICKS_PER_QUARTER: u16 = 480;

/// Exported pitch is shifted up one octave
const PITCH_SHIFT: u8 = 12;

/// One named note list to export as its own MIDI track
#[derive(Debug, Clone, Copy)]
pub struct ExportTrack<'a> {
    pub name: &'a str,
    pub notes: &'a [Note],
}

/// MIDI export failures
#[derive(Debug, thiserror::Error)]
pub enum MidiExportError {
    #[error("grid division {0} does not divide {TICKS_PER_QUARTER} ticks per quarter")]
    UnsupportedDivision(u32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Render the given tracks to SMF bytes
///
/// Note timing comes from grid positions, not wall-clock times: a note
/// starts at `start_position` cells and lasts `span(start, end)` cells,
/// so one cell is `60 / (bpm * grid_division)` seconds of playback.
pub fn render_smf(tracks: &[ExportTrack<'_>], grid: &GridClock) -> Result<Vec<u8>, MidiExportError> {
    let smf = tracks_to_smf(tracks, grid)?;
    let mut buf = Vec::new();
    smf.write_std(&mut buf)?;
    Ok(buf)
}

/// Render and write straight to a file
pub fn write_midi_file(
    path: &Path,
    tracks: &[ExportTrack<'_>],
    grid: &GridClock,
) -> Result<(), MidiExportError> {
    let bytes = render_smf(tracks, grid)?;
    std::fs::write(path, &bytes)?;
    Ok(())
}

// MIDI event at an absolute tick; `order` puts NoteOff before NoteOn at
// equal ticks so back-to-back notes re-trigger cleanly
struct AbsoluteEvent<'a> {
    tick: u32,
    order: u8,
    kind: TrackEventKind<'a>,
}

fn tracks_to_smf<'a>(
    tracks: &[ExportTrack<'a>],
    grid: &GridClock,
) -> Result<Smf<'a>, MidiExportError> {
    let division = grid.grid_division();
    if division == 0 || TICKS_PER_QUARTER as u32 % division != 0 {
        return Err(MidiExportError::UnsupportedDivision(division));
    }
    let ticks_per_cell = TICKS_PER_QUARTER as u32 / division;

    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
    ));

    // Track 0: tempo track
    let mut tempo_track: Track<'a> = Vec::new();
    let tempo_microseconds = (60_000_000.0 / grid.tempo().bpm()).round() as u32;
    tempo_track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(midly::MetaMessage::Tempo(u24::new(tempo_microseconds))),
    });
    tempo_track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(midly::MetaMessage::EndOfTrack),
    });
    smf.tracks.push(tempo_track);

    for (track_index, export) in tracks.iter().enumerate() {
        let channel = u4::new((track_index as u8).min(15));
        let mut track: Track<'a> = Vec::new();

        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(midly::MetaMessage::TrackName(export.name.as_bytes())),
        });

        // Acoustic grand piano
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::ProgramChange {
                    program: u7::new(0),
                },
            },
        });

        let mut events: Vec<AbsoluteEvent<'a>> = Vec::with_capacity(export.notes.len() * 2);
        for note in export.notes {
            let pitch = u7::new(note.pitch.saturating_add(PITCH_SHIFT).min(127));
            let on_tick = note.start_position * ticks_per_cell;
            // Wraparound-aware length; a degenerate zero-cell note still
            // gets one tick so NoteOff follows its NoteOn
            let length_ticks =
                (grid.span(note.start_position, note.end_position) * ticks_per_cell).max(1);

            events.push(AbsoluteEvent {
                tick: on_tick,
                order: 1,
                kind: TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOn {
                        key: pitch,
                        vel: u7::new(note.velocity.min(127)),
                    },
                },
            });
            events.push(AbsoluteEvent {
                tick: on_tick + length_ticks,
                order: 0,
                kind: TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOff {
                        key: pitch,
                        vel: u7::new(0),
                    },
                },
            });
        }

        events.sort_by_key(|e| (e.tick, e.order));

        let mut last_tick = 0u32;
        for event in events {
            track.push(TrackEvent {
                delta: u28::new(event.tick - last_tick),
                kind: event.kind,
            });
            last_tick = event.tick;
        }

        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(midly::MetaMessage::EndOfTrack),
        });
        smf.tracks.push(track);
    }

    Ok(smf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::timeline::{Tempo, TimeSignature};

    fn grid(bpm: f64, division: u32) -> GridClock {
        GridClock::new(Tempo::new(bpm), TimeSignature::four_four(), 1, division)
    }

    fn note_events(track: &Track<'_>) -> Vec<(u32, String)> {
        let mut tick = 0;
        let mut out = Vec::new();
        for event in track {
            tick += event.delta.as_int();
            match event.kind {
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOn { key, .. },
                    ..
                } => out.push((tick, format!("on {}", key.as_int()))),
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOff { key, .. },
                    ..
                } => out.push((tick, format!("off {}", key.as_int()))),
                _ => {}
            }
        }
        out
    }

    #[test]
    fn test_single_note_timing_and_pitch_shift() {
        // C4 spanning cells 0..4 on an eighth-note grid at 120 BPM:
        // 60 ticks per cell, so 240 ticks = 0.25s of playback
        let grid = grid(120.0, 8);
        let notes = [Note::new(60, 0, 4, 0.0, 0.25, 100)];
        let tracks = [ExportTrack {
            name: "Performance",
            notes: &notes,
        }];

        let smf = tracks_to_smf(&tracks, &grid).unwrap();
        assert_eq!(smf.tracks.len(), 2); // tempo + one note track

        let events = note_events(&smf.tracks[1]);
        assert_eq!(events.len(), 2);
        // Exported pitch is 60 + 12 = 72
        assert_eq!(events[0], (0, "on 72".to_string()));
        assert_eq!(events[1], (240, "off 72".to_string()));
    }

    #[test]
    fn test_tempo_meta_event() {
        let grid = grid(120.0, 4);
        let smf = tracks_to_smf(&[], &grid).unwrap();

        // 120 BPM = 500_000 microseconds per quarter
        match smf.tracks[0][0].kind {
            TrackEventKind::Meta(midly::MetaMessage::Tempo(t)) => {
                assert_eq!(t.as_int(), 500_000);
            }
            _ => panic!("expected tempo meta event first"),
        }
    }

    #[test]
    fn test_wraparound_note_length() {
        // 16-cell loop; note from cell 14 to cell 2 is 4 cells long
        let grid = grid(120.0, 4);
        let notes = [Note::new(69, 14, 2, 1.75, 2.25, 100)];
        let tracks = [ExportTrack {
            name: "Performance",
            notes: &notes,
        }];

        let smf = tracks_to_smf(&tracks, &grid).unwrap();
        let events = note_events(&smf.tracks[1]);

        let on_tick = events[0].0;
        let off_tick = events[1].0;
        assert_eq!(off_tick - on_tick, 4 * 120);
    }

    #[test]
    fn test_adjacent_notes_note_off_first() {
        let grid = grid(120.0, 4);
        let notes = [
            Note::new(60, 0, 2, 0.0, 0.25, 100),
            Note::new(62, 2, 4, 0.25, 0.5, 100),
        ];
        let tracks = [ExportTrack {
            name: "Performance",
            notes: &notes,
        }];

        let smf = tracks_to_smf(&tracks, &grid).unwrap();
        let events = note_events(&smf.tracks[1]);

        // At tick 240 the first note's off precedes the second note's on
        assert_eq!(events[1], (240, "off 72".to_string()));
        assert_eq!(events[2], (240, "on 74".to_string()));
    }

    #[test]
    fn test_pitch_shift_clamped_at_top() {
        let grid = grid(120.0, 4);
        let notes = [Note::new(120, 0, 1, 0.0, 0.1, 100)];
        let tracks = [ExportTrack {
            name: "High",
            notes: &notes,
        }];

        let smf = tracks_to_smf(&tracks, &grid).unwrap();
        let events = note_events(&smf.tracks[1]);
        assert_eq!(events[0].1, "on 127");
    }

    #[test]
    fn test_one_track_per_list() {
        let grid = grid(120.0, 4);
        let committed = [Note::new(60, 0, 2, 0.0, 0.25, 100)];
        let generated = [Note::new(67, 4, 6, 0.5, 0.75, 100)];
        let tracks = [
            ExportTrack {
                name: "Performance",
                notes: &committed,
            },
            ExportTrack {
                name: "Companion",
                notes: &generated,
            },
        ];

        let smf = tracks_to_smf(&tracks, &grid).unwrap();
        assert_eq!(smf.tracks.len(), 3);
    }

    #[test]
    fn test_render_round_trips_through_midly() {
        let grid = grid(120.0, 8);
        let notes = [Note::new(60, 0, 4, 0.0, 0.25, 100)];
        let tracks = [ExportTrack {
            name: "Performance",
            notes: &notes,
        }];

        let bytes = render_smf(&tracks, &grid).unwrap();
        let parsed = Smf::parse(&bytes).unwrap();
        assert_eq!(parsed.tracks.len(), 2);
    }
}

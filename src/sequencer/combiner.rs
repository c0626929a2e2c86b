// Note combiner - Merge consecutive same-pitch notes into sustained notes
// Applied to a phrase before it is handed to the generative model

use super::note::Note;

/// Merge runs of consecutive equal-pitch notes into single sustained notes.
///
/// Walks the sequence once. A note folds into the preceding accumulator when
/// its pitch matches, extending the accumulator's end time and end position;
/// otherwise the accumulator is flushed and the note starts a new one. The
/// result is never longer than the input and no two adjacent entries share
/// a pitch.
pub fn combine_sustained(notes: &[Note]) -> Vec<Note> {
    let mut combined: Vec<Note> = Vec::with_capacity(notes.len());

    for note in notes {
        match combined.last_mut() {
            Some(previous) if previous.pitch == note.pitch => {
                previous.end_time = note.end_time;
                previous.end_position = note.end_position;
            }
            _ => combined.push(*note),
        }
    }

    combined
}

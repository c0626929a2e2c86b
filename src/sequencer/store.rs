// Committed note store - Finalized notes for the current loop cycle
// Insertion order is rendering order; all updates are remove+append

use super::note::Note;

/// How a closed note is written into the store
///
/// The mode is an explicit argument of every commit so the store's behavior
/// is a pure function of its inputs, never of ambient state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum WriteMode {
    /// Append unless a note with identical (start_position, pitch) exists
    Add,
    /// Remove every note at start_position (any pitch), then append
    Replace,
}

/// Ordered collection of committed notes for the current session
///
/// Notes enter through `commit` and only ever leave through the Replace
/// write mode or `clear`. No note is mutated in place.
#[derive(Debug, Clone, Default)]
pub struct CommittedNoteStore {
    notes: Vec<Note>,
}

impl CommittedNoteStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self { notes: Vec::new() }
    }

    /// All committed notes in insertion order
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Commit a closed note under the given write mode
    ///
    /// Returns `true` if the note was appended (`Add` skips duplicates).
    pub fn commit(&mut self, note: Note, mode: WriteMode) -> bool {
        match mode {
            WriteMode::Add => {
                let duplicate = self
                    .notes
                    .iter()
                    .any(|n| n.start_position == note.start_position && n.pitch == note.pitch);
                if duplicate {
                    return false;
                }
            }
            WriteMode::Replace => {
                self.notes
                    .retain(|n| n.start_position != note.start_position);
            }
        }

        self.notes.push(note);
        true
    }

    /// Owned copy of the current contents (for phrase snapshots)
    pub fn snapshot(&self) -> Vec<Note> {
        self.notes.clone()
    }

    /// Remove all notes (session reset)
    pub fn clear(&mut self) {
        self.notes.clear();
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

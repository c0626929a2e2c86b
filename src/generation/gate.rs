// Phrase diff gate - Suppresses redundant generation dispatch
// Compares the committed phrase against the last dispatched snapshot

use crate::sequencer::note::Note;

/// Decides, at each loop boundary, whether the committed phrase goes out
/// for generation.
///
/// The gate owns exactly one piece of state: the snapshot last handed to
/// the dispatcher. Whether a request is currently in flight is owned by
/// the dispatcher and passed in explicitly, so the two facts can never
/// fall out of sync. When a dispatch is approved the baseline is replaced
/// wholesale *before* the asynchronous call resolves - a second boundary
/// with identical content stays quiet while the request is pending.
#[derive(Debug, Default)]
pub struct PhraseDiffGate {
    last_sent: Vec<Note>,
}

impl PhraseDiffGate {
    pub fn new() -> Self {
        Self {
            last_sent: Vec::new(),
        }
    }

    /// Evaluate a loop boundary
    ///
    /// Returns the phrase to dispatch, or `None` when a request is in
    /// flight or the content is unchanged since the last dispatch.
    /// Equality is structural: order and every field.
    pub fn on_boundary(&mut self, committed: &[Note], in_flight: bool) -> Option<Vec<Note>> {
        if in_flight {
            return None;
        }
        if committed == self.last_sent.as_slice() {
            return None;
        }

        self.last_sent = committed.to_vec();
        Some(self.last_sent.clone())
    }

    /// Snapshot last handed to the dispatcher
    pub fn last_sent(&self) -> &[Note] {
        &self.last_sent
    }

    /// Forget the baseline (session reset)
    pub fn reset(&mut self) {
        self.last_sent.clear();
    }
}

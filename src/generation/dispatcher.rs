// Generation dispatcher - Single-flight call into the generative model
// Runs the model on a worker thread; the frame loop polls for the result

use crate::sequencer::grid::GridClock;
use crate::sequencer::note::Note;
use std::sync::Arc;
use std::sync::mpsc::{self, TryRecvError};
use std::thread;
use uuid::Uuid;

use super::model::{GenerationError, GenerativeModel, ModelNote};

/// Result of a finished generation request, observed via `poll`
#[derive(Debug, Clone)]
pub enum GenerationOutcome {
    Completed {
        request_id: Uuid,
        /// Response notes remapped into grid coordinates
        notes: Vec<Note>,
    },
    Failed {
        request_id: Uuid,
        error: GenerationError,
    },
}

struct PendingGeneration {
    id: Uuid,
    result_rx: mpsc::Receiver<Result<Vec<ModelNote>, GenerationError>>,
}

/// Single-flight dispatcher for the injected generative model
///
/// The pending slot *is* the in-flight flag: `Some` while a worker is out,
/// `None` otherwise. `poll` clears it unconditionally on completion -
/// success, model error or worker death alike - so a later boundary can
/// always retry. There is no cancellation; back-pressure is simply that
/// dispatch is withheld while a request is outstanding.
pub struct GenerationDispatcher {
    model: Arc<dyn GenerativeModel>,
    pending: Option<PendingGeneration>,
}

impl GenerationDispatcher {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self {
            model,
            pending: None,
        }
    }

    /// Whether a request is currently outstanding
    pub fn is_in_flight(&self) -> bool {
        self.pending.is_some()
    }

    /// Send a phrase to the model on a worker thread
    ///
    /// Notes outside the model's accepted pitch range are dropped, not
    /// clamped. Returns the request id for log correlation.
    pub fn dispatch(&mut self, phrase: &[Note]) -> Uuid {
        assert!(
            self.pending.is_none(),
            "dispatch while a generation is in flight"
        );

        let range = self.model.pitch_range();
        let payload: Vec<ModelNote> = phrase
            .iter()
            .filter(|note| range.contains(note.pitch))
            .map(ModelNote::from)
            .collect();

        let id = Uuid::new_v4();
        let (result_tx, result_rx) = mpsc::channel();
        let model = Arc::clone(&self.model);

        thread::spawn(move || {
            let _ = result_tx.send(model.generate(&payload));
        });

        self.pending = Some(PendingGeneration { id, result_rx });
        id
    }

    /// Check for a finished request without blocking the frame loop
    ///
    /// Response times are remapped through the grid configuration current
    /// *now* - if the grid changed mid-flight, the last writer wins.
    pub fn poll(&mut self, grid: &GridClock) -> Option<GenerationOutcome> {
        let pending = self.pending.as_ref()?;
        let id = pending.id;

        let outcome = match pending.result_rx.try_recv() {
            Ok(Ok(notes)) => GenerationOutcome::Completed {
                request_id: id,
                notes: notes.iter().map(|n| remap(n, grid)).collect(),
            },
            Ok(Err(error)) => GenerationOutcome::Failed {
                request_id: id,
                error,
            },
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => GenerationOutcome::Failed {
                request_id: id,
                error: GenerationError::WorkerDied,
            },
        };

        self.pending = None;
        Some(outcome)
    }
}

/// Convert a model response note into grid coordinates
fn remap(note: &ModelNote, grid: &GridClock) -> Note {
    Note::new(
        note.pitch.min(127),
        grid.position_of(note.start_time),
        grid.position_of(note.end_time),
        note.start_time,
        note.end_time,
        note.velocity.min(127),
    )
}

// Integration tests: the full frame loop from analysis frames to
// committed notes, loop-synchronized generation and MIDI export

use loopmate::{
    AnalysisFrame, CompanionEngine, EngineConfig, GenerationError, GenerativeModel, GridClock,
    ModelNote, Note, PitchRange, Tempo, TimeSignature, combine_sustained,
    create_notification_channel, render_smf,
};
use midly::{MidiMessage, Smf, TrackEventKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::time::Duration;

/// Model that answers immediately with its input, counting calls
struct EchoModel {
    calls: AtomicUsize,
}

impl EchoModel {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

impl GenerativeModel for EchoModel {
    fn pitch_range(&self) -> PitchRange {
        PitchRange::new(0, 127)
    }

    fn generate(&self, phrase: &[ModelNote]) -> Result<Vec<ModelNote>, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(phrase.to_vec())
    }
}

/// Model that blocks until the test releases it, asserting single-flight
struct BlockingModel {
    calls: AtomicUsize,
    concurrent: AtomicUsize,
    release: Mutex<mpsc::Receiver<()>>,
}

impl BlockingModel {
    fn new() -> (Arc<Self>, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        (
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                concurrent: AtomicUsize::new(0),
                release: Mutex::new(rx),
            }),
            tx,
        )
    }
}

impl GenerativeModel for BlockingModel {
    fn pitch_range(&self) -> PitchRange {
        PitchRange::new(0, 127)
    }

    fn generate(&self, phrase: &[ModelNote]) -> Result<Vec<ModelNote>, GenerationError> {
        let running = self.concurrent.fetch_add(1, Ordering::SeqCst);
        assert_eq!(running, 0, "two generation calls ran concurrently");

        self.calls.fetch_add(1, Ordering::SeqCst);
        self.release
            .lock()
            .unwrap()
            .recv()
            .map_err(|_| GenerationError::Unavailable("release channel closed".into()))?;

        self.concurrent.fetch_sub(1, Ordering::SeqCst);
        Ok(phrase.to_vec())
    }
}

fn voiced(time: f64, hz: f32) -> AnalysisFrame {
    AnalysisFrame {
        time,
        frequency: Some(hz),
        clarity: 0.9,
        rms: 0.5,
    }
}

/// 1 bar, whole-beat cells: 4 cells of 0.5s, one cycle every 2s
fn coarse_config() -> EngineConfig {
    EngineConfig {
        bars: 1,
        grid_division: 1,
        ..EngineConfig::default()
    }
}

fn engine(config: EngineConfig, model: Arc<dyn GenerativeModel>) -> CompanionEngine {
    let (tx, _rx) = create_notification_channel(128);
    CompanionEngine::new(config, model, tx).unwrap()
}

/// Sing one note inside the current cycle and close it with silence
fn sing(engine: &mut CompanionEngine, onset: f64, hz: f32) {
    engine.process_frame(voiced(onset, hz)).unwrap();
    engine.process_frame(voiced(onset + 0.1, hz)).unwrap();
    engine
        .process_frame(AnalysisFrame::silent(onset + 0.2))
        .unwrap();
    engine
        .process_frame(AnalysisFrame::silent(onset + 0.45))
        .unwrap();
}

/// Cross the loop boundary ending the cycle that began at `cycle_start`
fn cross_boundary(engine: &mut CompanionEngine, cycle_start: f64) -> loopmate::FrameOutcome {
    engine
        .process_frame(AnalysisFrame::silent(cycle_start + 1.6))
        .unwrap();
    let outcome = engine
        .process_frame(AnalysisFrame::silent(cycle_start + 2.0))
        .unwrap();
    assert!(outcome.boundary, "expected a boundary frame");
    outcome
}

#[test]
fn grid_position_periodic_and_wrap_idempotent() {
    let grid = GridClock::new(Tempo::new(120.0), TimeSignature::four_four(), 2, 8);
    let cycle = grid.cycle_duration();

    for i in 0..64 {
        let t = i as f64 * 0.037;
        let p = grid.position_of(t);
        assert_eq!(grid.wrap(p as i64), p);
        assert_eq!(grid.position_of(t + cycle), p);
        assert_eq!(grid.position_of(t + 3.0 * cycle), p);
    }
}

#[test]
fn sustained_pitch_then_silence_commits_one_note() {
    let mut engine = engine(coarse_config(), EchoModel::new());

    // 440 Hz at clarity 0.9 across three frames
    engine.process_frame(voiced(0.50, 440.0)).unwrap();
    engine.process_frame(voiced(0.52, 440.0)).unwrap();
    engine.process_frame(voiced(0.54, 440.0)).unwrap();

    // Then more than 200ms of silence
    engine.process_frame(AnalysisFrame::silent(0.56)).unwrap();
    engine.process_frame(AnalysisFrame::silent(0.80)).unwrap();
    engine.process_frame(AnalysisFrame::silent(1.00)).unwrap();

    let notes = engine.committed_notes();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].pitch, 69);
}

#[test]
fn long_hold_splits_into_contiguous_notes() {
    let config = EngineConfig {
        max_note_cells: 2, // 1.0s at 0.5s cells
        ..coarse_config()
    };
    let mut engine = engine(config, EchoModel::new());

    let mut time = 0.0;
    while time < 2.6 {
        engine.process_frame(voiced(time, 440.0)).unwrap();
        time += 0.02;
    }
    let _ = engine.finalize(time);

    let notes = engine.committed_notes();
    assert!(notes.len() >= 2, "expected a split, got {} notes", notes.len());
    for note in notes {
        assert!(note.duration_seconds() <= 1.0 + 0.021);
    }
    for pair in notes.windows(2) {
        assert_eq!(pair[0].end_time, pair[1].start_time);
        assert_eq!(pair[0].end_position, pair[1].start_position);
    }
}

#[test]
fn semitone_jump_closes_and_reopens_in_one_frame() {
    let mut engine = engine(coarse_config(), EchoModel::new());

    engine.process_frame(voiced(0.0, 440.0)).unwrap();
    assert!(engine.active_note().is_some());
    assert!(engine.committed_notes().is_empty());

    // The jump frame both commits the old note and keeps a note active -
    // at no point is there neither an active note nor a new commit
    let outcome = engine.process_frame(voiced(0.5, 467.0)).unwrap();
    assert!(outcome.committed.is_some());
    assert_eq!(engine.committed_notes().len(), 1);
    assert_eq!(engine.committed_notes()[0].pitch, 69);
    assert!(engine.active_note().is_some());

    engine.finalize(1.0);
    assert_eq!(engine.committed_notes().len(), 2);
    assert_eq!(engine.committed_notes()[1].pitch, 70);
}

#[test]
fn unchanged_phrase_crosses_boundaries_without_dispatch() {
    let model = EchoModel::new();
    let mut engine = engine(coarse_config(), model.clone());

    sing(&mut engine, 0.5, 440.0);
    let first = cross_boundary(&mut engine, 0.0);
    assert!(first.dispatched.is_some());

    // Nothing new is sung; later boundaries stay quiet
    for cycle in 1..4 {
        let outcome = cross_boundary(&mut engine, cycle as f64 * 2.0);
        assert!(outcome.dispatched.is_none());
    }

    // Allow the single worker to finish before counting
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn changed_phrase_dispatches_once_and_never_concurrently() {
    let (model, release) = BlockingModel::new();
    let mut engine = engine(coarse_config(), model.clone());

    // Cycle 1: one note, boundary dispatches
    sing(&mut engine, 0.5, 440.0);
    let outcome = cross_boundary(&mut engine, 0.0);
    assert!(outcome.dispatched.is_some());

    // Cycle 2: phrase changes, but the request is still in flight
    sing(&mut engine, 2.5, 523.25);
    let outcome = cross_boundary(&mut engine, 2.0);
    assert!(outcome.dispatched.is_none());

    // Release the worker and poll until the completion is observed
    release.send(()).unwrap();
    let mut completed = false;
    for i in 0..500 {
        let frame = AnalysisFrame::silent(4.02 + i as f64 * 0.001);
        if engine.process_frame(frame).unwrap().generation.is_some() {
            completed = true;
            break;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    assert!(completed, "generation never completed");

    // Next boundary re-dispatches the changed phrase
    release.send(()).unwrap();
    let outcome = cross_boundary(&mut engine, 4.0);
    assert!(outcome.dispatched.is_some());

    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(model.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn combiner_merges_adjacent_same_pitch() {
    let notes = [
        Note::new(60, 0, 2, 0.0, 0.25, 100),
        Note::new(60, 2, 4, 0.25, 0.5, 100),
        Note::new(64, 4, 6, 0.5, 0.75, 100),
    ];

    let combined = combine_sustained(&notes);
    assert_eq!(combined.len(), 2);
    assert_eq!(combined[0].pitch, 60);
    assert_eq!(combined[0].end_position, 4);
    assert_eq!(combined[1].pitch, 64);
}

#[test]
fn generation_response_lands_on_the_grid() {
    let model = EchoModel::new();
    let mut engine = engine(coarse_config(), model);

    sing(&mut engine, 0.5, 440.0);
    let committed = engine.committed_notes()[0];
    cross_boundary(&mut engine, 0.0);

    let mut generated = None;
    for i in 0..500 {
        let frame = AnalysisFrame::silent(2.02 + i as f64 * 0.001);
        if engine.process_frame(frame).unwrap().generation.is_some() {
            generated = Some(engine.generated_notes().to_vec());
            break;
        }
        std::thread::sleep(Duration::from_millis(2));
    }

    let generated = generated.expect("generation never completed");
    assert_eq!(generated.len(), 1);
    // The echo keeps the committed note's times, so remapping through the
    // unchanged grid reproduces its cells
    assert_eq!(generated[0].start_position, committed.start_position);
    assert_eq!(generated[0].end_position, committed.end_position);
}

#[test]
fn midi_export_places_and_shifts_the_note() {
    // Note {pitch 60, cells 0..4} on an eighth grid at 120 BPM:
    // 4 cells * 60/(120*8) = 0.25s, i.e. 240 of 480 ticks per quarter
    let grid = GridClock::new(Tempo::new(120.0), TimeSignature::four_four(), 1, 8);
    let notes = [Note::new(60, 0, 4, 0.0, 0.25, 100)];
    let bytes = render_smf(
        &[loopmate::ExportTrack {
            name: "Performance",
            notes: &notes,
        }],
        &grid,
    )
    .unwrap();

    let smf = Smf::parse(&bytes).unwrap();
    let mut tick = 0;
    let mut events = Vec::new();
    for event in &smf.tracks[1] {
        tick += event.delta.as_int();
        match event.kind {
            TrackEventKind::Midi {
                message: MidiMessage::NoteOn { key, .. },
                ..
            } => events.push(("on", tick, key.as_int())),
            TrackEventKind::Midi {
                message: MidiMessage::NoteOff { key, .. },
                ..
            } => events.push(("off", tick, key.as_int())),
            _ => {}
        }
    }

    assert_eq!(events, vec![("on", 0, 72), ("off", 240, 72)]);
}

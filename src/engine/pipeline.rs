// Companion engine - The per-frame pipeline
// Wires segmentation, the committed store, loop-boundary detection and
// generation dispatch into one cooperative frame loop

use crate::analysis::frame::AnalysisFrame;
use crate::analysis::pitch::{PitchError, PitchSampler};
use crate::generation::dispatcher::{GenerationDispatcher, GenerationOutcome};
use crate::generation::gate::PhraseDiffGate;
use crate::generation::model::GenerativeModel;
use crate::messaging::channels::{FrameConsumer, NotificationProducer};
use crate::messaging::notification::{Notification, NotificationCategory};
use crate::midi::export::{ExportTrack, MidiExportError, write_midi_file};
use crate::sequencer::boundary::LoopBoundaryDetector;
use crate::sequencer::combiner::combine_sustained;
use crate::sequencer::grid::GridClock;
use crate::sequencer::note::Note;
use crate::sequencer::segmenter::{ActiveNoteState, NoteSegmenter};
use crate::sequencer::store::CommittedNoteStore;
use crate::sequencer::timeline::Tempo;
use crate::sequencer::transport::{SharedTransportState, Transport};
use chrono::{DateTime, Utc};
use ringbuf::traits::{Consumer, Producer};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use super::config::{ConfigError, EngineConfig};

/// Engine failures
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The pitch sampler failed inside the frame loop; fatal for the session
    #[error("pitch sampler failed: {0}")]
    Sampler(#[from] PitchError),

    /// A previous sampler failure halted this session
    #[error("engine halted after a fatal sampler error")]
    Halted,

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("MIDI export failed: {0}")]
    Export(#[from] MidiExportError),
}

/// What one frame of processing did
#[derive(Debug, Clone)]
pub struct FrameOutcome {
    /// Grid cell of this frame
    pub position: u32,
    /// New playhead beat, when a beat edge was crossed
    pub playhead: Option<u32>,
    /// Note closed and committed on this frame
    pub committed: Option<Note>,
    /// Whether this frame was the loop restart edge
    pub boundary: bool,
    /// Generation request sent on this frame
    pub dispatched: Option<Uuid>,
    /// Generation request that finished on this frame
    pub generation: Option<GenerationOutcome>,
}

/// The real-time companion pipeline
///
/// Owns every piece of mutable pipeline state; external readers only get
/// `&[Note]` snapshots and the atomic playhead. One `process_frame` call
/// per animation/audio frame runs the whole §2 data flow synchronously -
/// the single asynchronous suspension point is the generation worker,
/// drained by `poll` inside the same call.
pub struct CompanionEngine {
    config: EngineConfig,
    /// Grid-affecting settings staged until the next cycle start
    pending_config: Option<EngineConfig>,

    grid: GridClock,
    segmenter: NoteSegmenter,
    store: CommittedNoteStore,
    boundary: LoopBoundaryDetector,
    gate: PhraseDiffGate,
    dispatcher: GenerationDispatcher,
    transport: Transport,

    /// Latest model response, replaced wholesale on every completion
    generated: Vec<Note>,

    notifications: NotificationProducer,
    halted: bool,
    session_started: DateTime<Utc>,
}

impl CompanionEngine {
    /// Create an engine around an injected generative model
    pub fn new(
        config: EngineConfig,
        model: Arc<dyn GenerativeModel>,
        notifications: NotificationProducer,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let grid = config.grid_clock();
        let beats_per_loop = config.bars * grid.time_signature().beats_per_bar();

        Ok(Self {
            config,
            pending_config: None,
            segmenter: NoteSegmenter::new(config.segmenter_config()),
            store: CommittedNoteStore::new(),
            boundary: LoopBoundaryDetector::new(),
            gate: PhraseDiffGate::new(),
            dispatcher: GenerationDispatcher::new(model),
            transport: Transport::new(Tempo::new(config.bpm), beats_per_loop),
            grid,
            generated: Vec::new(),
            notifications,
            halted: false,
            session_started: Utc::now(),
        })
    }

    /// Run one frame of the pipeline
    pub fn process_frame(&mut self, frame: AnalysisFrame) -> Result<FrameOutcome, EngineError> {
        if self.halted {
            return Err(EngineError::Halted);
        }

        let playhead = self.transport.tick(frame.time);
        let position = self.grid.position_of(frame.time);

        // Write mode is read at the moment of commit, never cached
        let mode = self.config.write_mode;
        let committed = self.segmenter.process_frame(&frame, &self.grid);
        if let Some(note) = committed {
            self.store.commit(note, mode);
        }

        let boundary = self.boundary.observe(position, self.grid.total_cells());
        let mut dispatched = None;
        if boundary {
            if let Some(phrase) = self
                .gate
                .on_boundary(self.store.notes(), self.dispatcher.is_in_flight())
            {
                let combined = combine_sustained(&phrase);
                let id = self.dispatcher.dispatch(&combined);
                self.notify(Notification::info(
                    NotificationCategory::Generation,
                    format!("request {id}: sent {} notes to the model", combined.len()),
                ));
                dispatched = Some(id);
            }

            // Cycle start: staged grid settings take effect now; committed
            // notes keep their positions
            self.apply_pending_config();
        }

        let generation = self.dispatcher.poll(&self.grid);
        match &generation {
            Some(GenerationOutcome::Completed { request_id, notes }) => {
                self.generated = notes.clone();
                self.notify(Notification::info(
                    NotificationCategory::Generation,
                    format!("request {request_id}: model answered {} notes", notes.len()),
                ));
            }
            Some(GenerationOutcome::Failed { request_id, error }) => {
                self.notify(Notification::warning(
                    NotificationCategory::Generation,
                    format!("request {request_id} failed: {error}"),
                ));
            }
            None => {}
        }

        Ok(FrameOutcome {
            position,
            playhead,
            committed,
            boundary,
            dispatched,
            generation,
        })
    }

    /// Analyze one audio block and run the resulting frame
    ///
    /// A sampler error is fatal: the engine logs it, halts and stays
    /// halted until `reset_session`.
    pub fn process_block(
        &mut self,
        sampler: &mut dyn PitchSampler,
        samples: &[f32],
        time: f64,
    ) -> Result<FrameOutcome, EngineError> {
        if self.halted {
            return Err(EngineError::Halted);
        }

        match sampler.analyze(samples, time) {
            Ok(frame) => self.process_frame(frame),
            Err(error) => {
                self.halted = true;
                self.notify(Notification::error(
                    NotificationCategory::Pitch,
                    format!("pitch sampler failed, session halted: {error}"),
                ));
                Err(EngineError::Sampler(error))
            }
        }
    }

    /// Drain and process every frame queued on the analysis channel
    pub fn drain_frames(
        &mut self,
        frames: &mut FrameConsumer,
    ) -> Result<Vec<FrameOutcome>, EngineError> {
        let mut outcomes = Vec::new();
        while let Some(frame) = frames.try_pop() {
            outcomes.push(self.process_frame(frame)?);
        }
        Ok(outcomes)
    }

    /// Close a still-active note at session stop and commit it
    pub fn finalize(&mut self, time: f64) -> Option<Note> {
        let mode = self.config.write_mode;
        let note = self.segmenter.flush(time, &self.grid)?;
        self.store.commit(note, mode);
        Some(note)
    }

    pub fn start(&mut self) {
        self.transport.start();
    }

    pub fn stop(&mut self) {
        self.transport.stop();
    }

    /// Read-only view of the committed phrase
    pub fn committed_notes(&self) -> &[Note] {
        self.store.notes()
    }

    /// Read-only view of the latest model response
    pub fn generated_notes(&self) -> &[Note] {
        &self.generated
    }

    /// Note currently being tracked, if any
    pub fn active_note(&self) -> Option<&ActiveNoteState> {
        self.segmenter.active()
    }

    /// Playhead state for render threads
    pub fn transport_state(&self) -> Arc<SharedTransportState> {
        self.transport.shared_state()
    }

    pub fn grid(&self) -> &GridClock {
        &self.grid
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Staged configuration waiting for the next cycle start, if any
    pub fn pending_config(&self) -> Option<&EngineConfig> {
        self.pending_config.as_ref()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn session_started(&self) -> DateTime<Utc> {
        self.session_started
    }

    /// Update the configuration
    ///
    /// Thresholds and the write mode apply immediately; `bpm`, `bars` and
    /// `grid_division` stage until the next loop boundary so the cycle in
    /// progress keeps its geometry.
    pub fn set_config(&mut self, config: EngineConfig) -> Result<(), ConfigError> {
        config.validate()?;

        if self.config.grid_differs(&config) {
            self.config.volume_threshold = config.volume_threshold;
            self.config.clarity_threshold = config.clarity_threshold;
            self.config.silence_duration = config.silence_duration;
            self.config.max_note_cells = config.max_note_cells;
            self.config.write_mode = config.write_mode;
            self.pending_config = Some(config);
        } else {
            self.config = config;
            self.pending_config = None;
        }
        self.segmenter.set_config(self.config.segmenter_config());
        Ok(())
    }

    /// Start a fresh session: empty stores, cleared baselines, new clock
    ///
    /// Also the only way out of the halted state - recovery is an explicit
    /// new session, never automatic.
    pub fn reset_session(&mut self) {
        self.apply_pending_config();
        self.store.clear();
        self.generated.clear();
        self.segmenter.reset();
        self.boundary.reset();
        self.gate.reset();
        self.transport.stop();
        self.halted = false;
        self.session_started = Utc::now();
    }

    /// Export the committed phrase (and the model response, when present)
    /// as a Standard MIDI File
    pub fn export_midi(&self, path: &Path) -> Result<(), EngineError> {
        let mut tracks = vec![ExportTrack {
            name: "Performance",
            notes: self.store.notes(),
        }];
        if !self.generated.is_empty() {
            tracks.push(ExportTrack {
                name: "Companion",
                notes: &self.generated,
            });
        }
        write_midi_file(path, &tracks, &self.grid)?;
        Ok(())
    }

    fn apply_pending_config(&mut self) {
        if let Some(config) = self.pending_config.take() {
            self.config = config;
            self.grid = config.grid_clock();
            self.segmenter.set_config(config.segmenter_config());
            let beats_per_loop = config.bars * self.grid.time_signature().beats_per_bar();
            self.transport.set_timing(Tempo::new(config.bpm), beats_per_loop);
        }
    }

    // Notifications are best-effort; a full buffer drops the message
    // rather than stalling the frame loop
    fn notify(&mut self, notification: Notification) {
        let _ = self.notifications.try_push(notification);
    }
}

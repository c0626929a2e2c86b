// Transport - Session clock and beat-indexed playhead
// Advances the playhead once per beat and supports position resync

use super::timeline::Tempo;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Shared transport state
/// Thread-safe via atomics so renderers on other threads can read the
/// playhead without touching the frame loop
#[derive(Debug)]
pub struct SharedTransportState {
    running: AtomicBool,
    playhead_beat: AtomicU32,
}

impl SharedTransportState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            running: AtomicBool::new(false),
            playhead_beat: AtomicU32::new(0),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Current playhead beat within the loop (updated once per beat)
    pub fn playhead_beat(&self) -> u32 {
        self.playhead_beat.load(Ordering::Relaxed)
    }

    fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Relaxed);
    }

    fn set_playhead_beat(&self, beat: u32) {
        self.playhead_beat.store(beat, Ordering::Relaxed);
    }
}

/// Transport controller
///
/// Owns tempo and loop length in beats. `tick` is called once per frame
/// with the session-relative monotonic time; it advances the playhead when
/// a beat edge is crossed. `resync` moves the playhead to an arbitrary beat
/// without touching the time source.
#[derive(Debug)]
pub struct Transport {
    shared: Arc<SharedTransportState>,
    tempo: Tempo,
    beats_per_loop: u32,
    /// Offset in beats applied on top of the time-derived beat count
    beat_offset: f64,
    last_beat: Option<u64>,
}

impl Transport {
    pub fn new(tempo: Tempo, beats_per_loop: u32) -> Self {
        assert!(beats_per_loop > 0, "Loop must span at least one beat");

        Self {
            shared: SharedTransportState::new(),
            tempo,
            beats_per_loop,
            beat_offset: 0.0,
            last_beat: None,
        }
    }

    /// Get shared state (for passing to render threads)
    pub fn shared_state(&self) -> Arc<SharedTransportState> {
        Arc::clone(&self.shared)
    }

    pub fn start(&mut self) {
        self.shared.set_running(true);
    }

    pub fn stop(&mut self) {
        self.shared.set_running(false);
        self.shared.set_playhead_beat(0);
        self.last_beat = None;
        self.beat_offset = 0.0;
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Absolute beat index for a session-relative time
    pub fn absolute_beat(&self, now: f64) -> u64 {
        let beats = now / self.tempo.beat_duration_seconds() + self.beat_offset;
        beats.max(0.0).floor() as u64
    }

    /// Advance the playhead if a beat edge was crossed since the last tick
    ///
    /// Returns the new playhead beat (wrapped into the loop) when it moved.
    pub fn tick(&mut self, now: f64) -> Option<u32> {
        if !self.is_running() {
            return None;
        }

        let beat = self.absolute_beat(now);
        if self.last_beat == Some(beat) {
            return None;
        }

        self.last_beat = Some(beat);
        let wrapped = (beat % self.beats_per_loop as u64) as u32;
        self.shared.set_playhead_beat(wrapped);
        Some(wrapped)
    }

    /// Resynchronize: make `now` correspond to the given absolute beat
    pub fn resync(&mut self, now: f64, beat: u64) {
        self.beat_offset = beat as f64 - now / self.tempo.beat_duration_seconds();
        self.last_beat = None;
    }

    pub fn tempo(&self) -> &Tempo {
        &self.tempo
    }

    /// Retarget tempo and loop length (applied by the engine at cycle start)
    pub fn set_timing(&mut self, tempo: Tempo, beats_per_loop: u32) {
        assert!(beats_per_loop > 0, "Loop must span at least one beat");
        self.tempo = tempo;
        self.beats_per_loop = beats_per_loop;
    }

    pub fn beats_per_loop(&self) -> u32 {
        self.beats_per_loop
    }
}

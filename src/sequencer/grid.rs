// Grid clock - Quantized loop time
// Converts wall-clock seconds to integer grid-cell positions and back,
// and owns all modulo-wraparound arithmetic for the loop

use super::timeline::{Tempo, TimeSignature};

/// Clock for one loop configuration: tempo, bar count and grid resolution.
///
/// A grid cell is one `grid_division`-th of a beat; the loop is
/// `bars * beats_per_bar * grid_division` cells long. Every position
/// computation in the crate routes through `wrap`/`span` so loop length
/// has a single source of truth. A `GridClock` is immutable - configuration
/// changes build a new clock at cycle start and never rewrite committed notes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridClock {
    tempo: Tempo,
    time_signature: TimeSignature,
    bars: u32,
    grid_division: u32,
}

impl GridClock {
    /// Creates a new grid clock
    pub fn new(tempo: Tempo, time_signature: TimeSignature, bars: u32, grid_division: u32) -> Self {
        assert!(bars > 0, "Loop must span at least one bar");
        assert!(grid_division > 0, "Grid division must be > 0");

        Self {
            tempo,
            time_signature,
            bars,
            grid_division,
        }
    }

    /// Duration of one grid cell in seconds: `(60 / bpm) / grid_division`
    pub fn seconds_per_cell(&self) -> f64 {
        self.tempo.beat_duration_seconds() / self.grid_division as f64
    }

    /// Total number of grid cells in one loop cycle
    pub fn total_cells(&self) -> u32 {
        self.bars * self.time_signature.beats_per_bar() * self.grid_division
    }

    /// Duration of one full loop cycle in seconds
    pub fn cycle_duration(&self) -> f64 {
        self.total_cells() as f64 * self.seconds_per_cell()
    }

    /// Wrap an arbitrary cell index into the loop
    pub fn wrap(&self, position: i64) -> u32 {
        position.rem_euclid(self.total_cells() as i64) as u32
    }

    /// Grid cell for a point in time (nearest-cell rounding, wrapped)
    pub fn position_of(&self, time: f64) -> u32 {
        self.wrap((time / self.seconds_per_cell()).round() as i64)
    }

    /// Forward wraparound-aware distance from `start` to `end` in cells
    ///
    /// Inputs are wrapped first, so positions committed under an older,
    /// longer grid still yield a defined length. A note spanning the loop
    /// restart (`start` near the end, `end` near zero) gets its true length.
    pub fn span(&self, start: u32, end: u32) -> u32 {
        let total = self.total_cells();
        let start = start % total;
        let end = end % total;
        (end + total - start) % total
    }

    pub fn tempo(&self) -> &Tempo {
        &self.tempo
    }

    pub fn time_signature(&self) -> &TimeSignature {
        &self.time_signature
    }

    pub fn bars(&self) -> u32 {
        self.bars
    }

    pub fn grid_division(&self) -> u32 {
        self.grid_division
    }
}

impl Default for GridClock {
    fn default() -> Self {
        Self::new(Tempo::default(), TimeSignature::default(), 2, 4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock(bpm: f64, bars: u32, division: u32) -> GridClock {
        GridClock::new(Tempo::new(bpm), TimeSignature::four_four(), bars, division)
    }

    #[test]
    fn test_cell_duration() {
        // At 120 BPM a beat is 0.5s; sixteenth-note grid = 0.125s per cell
        let grid = clock(120.0, 2, 4);
        assert_eq!(grid.seconds_per_cell(), 0.125);
        assert_eq!(grid.total_cells(), 32);
        assert_eq!(grid.cycle_duration(), 4.0);
    }

    #[test]
    fn test_position_of() {
        let grid = clock(120.0, 1, 4);

        assert_eq!(grid.position_of(0.0), 0);
        assert_eq!(grid.position_of(0.125), 1);
        // Nearest-cell rounding
        assert_eq!(grid.position_of(0.07), 1);
        assert_eq!(grid.position_of(0.05), 0);
        // One full cycle later maps to the same cell
        let cycle = grid.cycle_duration();
        assert_eq!(grid.position_of(0.25), grid.position_of(0.25 + cycle));
    }

    #[test]
    fn test_wrap_idempotent() {
        let grid = clock(120.0, 2, 8);
        let total = grid.total_cells() as i64;

        for p in [0, 1, total - 1, total, total + 5, -1, -total] {
            let wrapped = grid.wrap(p);
            assert!(wrapped < grid.total_cells());
            assert_eq!(grid.wrap(wrapped as i64), wrapped);
        }
    }

    #[test]
    fn test_span_wraparound() {
        let grid = clock(120.0, 1, 4); // 16 cells

        assert_eq!(grid.span(0, 4), 4);
        assert_eq!(grid.span(4, 4), 0);
        // Note crossing the loop restart: 14 -> 2 is 4 cells forward
        assert_eq!(grid.span(14, 2), 4);
    }

    #[test]
    fn test_different_configurations() {
        // 1 bar of 4/4 at division 1 = 4 cells of one beat each
        let coarse = clock(60.0, 1, 1);
        assert_eq!(coarse.total_cells(), 4);
        assert_eq!(coarse.seconds_per_cell(), 1.0);

        // 4 bars at thirty-second-note resolution
        let fine = clock(240.0, 4, 8);
        assert_eq!(fine.total_cells(), 128);
    }
}

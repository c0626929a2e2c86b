// Loop boundary detector - Fires once per cycle on the wraparound frame
// Detects the frame where the grid position wraps from its maximum to zero

/// Detects the loop restart edge.
///
/// A boundary fires on the frame where the position lands on cell 0 after
/// the previous frame saw the last cell of the loop - or on the very first
/// observed frame at cell 0, when no previous position exists yet. Because
/// `last_position` is updated on every frame, re-observing the same position
/// (equal-time resampling) can never fire twice.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopBoundaryDetector {
    last_position: Option<u32>,
}

impl LoopBoundaryDetector {
    pub fn new() -> Self {
        Self {
            last_position: None,
        }
    }

    /// Observe the current frame's position; returns `true` on the single
    /// boundary frame of each cycle.
    pub fn observe(&mut self, position: u32, total_cells: u32) -> bool {
        let fired = position == 0
            && match self.last_position {
                None => true,
                Some(last) => last == total_cells - 1,
            };

        self.last_position = Some(position);
        fired
    }

    /// Last position seen, if any
    pub fn last_position(&self) -> Option<u32> {
        self.last_position
    }

    /// Forget history (session reset)
    pub fn reset(&mut self) {
        self.last_position = None;
    }
}

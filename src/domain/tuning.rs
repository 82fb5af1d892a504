use super::position::Position;

/// Gameplay tuning for worms.
///
/// Keep this separate from runtime/server configuration (tick rates, buffer sizes, etc.).
#[derive(Debug, Clone, Copy)]
pub struct WormTuning {
    /// Inclusive upper bound of both grid axes; the lower bound is 0.
    pub boundary: i32,

    /// Segments trailing the head of a freshly created worm.
    pub tail: usize,

    /// Where new worms are placed.
    pub spawn: Position,
}

impl Default for WormTuning {
    fn default() -> Self {
        Self {
            boundary: 49,
            tail: 10,
            spawn: Position::new(25, 25),
        }
    }
}

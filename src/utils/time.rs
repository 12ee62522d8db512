/// Simulation clock advanced once per crowd tick.
///
/// Time is driven by the caller's delta instead of the wall clock so that a
/// frame can be replayed deterministically.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameClock {
    /// Delta of the last tick, in seconds
    pub delta: f32,
    /// Total simulated time, in seconds
    pub elapsed: f64,
    /// Total number of ticks
    pub frame_count: u64,
}

impl FrameClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the clock and returns the new frame number.
    pub fn tick(&mut self, delta: f32) -> u64 {
        let delta = delta.max(0.0);
        self.delta = delta;
        self.elapsed += f64::from(delta);
        self.frame_count += 1;
        self.frame_count
    }
}

// The gauge is a fraction in [0, 1] that starts full every session.
//
// Each judgment moves it by (good² − d²) × PENALTY_SCALE, where d is the
// normalized delta: plays inside the good threshold refill a little, misses
// drain up to (1 − good²) × PENALTY_SCALE. Prospective judgments also pay
// PLAY_COST.

pub const GAUGE_FULL: f64 = 1.0;
pub const PENALTY_SCALE: f64 = 0.05;
pub const PLAY_COST: f64 = 0.002;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Gauge {
    value: f64,
}

impl Default for Gauge {
    fn default() -> Self {
        Self { value: GAUGE_FULL }
    }
}

impl Gauge {
    #[inline(always)]
    pub fn value(self) -> f64 {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = GAUGE_FULL;
    }

    /// Applies a signed change and clamps. Returns the change actually applied.
    pub fn apply(&mut self, delta: f64) -> f64 {
        let before = self.value;
        self.value = (self.value + delta).clamp(0.0, GAUGE_FULL);
        self.value - before
    }
}

/// Gauge change for one judgment, before clamping.
#[inline(always)]
pub fn penalty(normalized_delta: f64, good: f64, scale: f64) -> f64 {
    -(normalized_delta * normalized_delta - good * good) * scale
}

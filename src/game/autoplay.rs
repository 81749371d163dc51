//! Input source that plays the chart by itself.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::drum::DrumMask;
use crate::game::chart::Chart;

/// Fires every step's required drums once music time reaches the step,
/// optionally shifted by a uniform random offset in `[-jitter, +jitter]`.
pub struct Autoplay {
    jitter_s: f64,
    rng: StdRng,
    next_step: usize,
    next_due: Option<f64>,
}

impl Autoplay {
    pub fn new(jitter_s: f64, seed: u64) -> Self {
        Self {
            jitter_s: jitter_s.abs(),
            rng: StdRng::seed_from_u64(seed),
            next_step: 0,
            next_due: None,
        }
    }

    pub fn reset(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
        self.next_step = 0;
        self.next_due = None;
    }

    fn jitter(&mut self) -> f64 {
        if self.jitter_s > 0.0 {
            self.rng.random_range(-self.jitter_s..=self.jitter_s)
        } else {
            0.0
        }
    }

    /// Drums to trigger this tick.
    pub fn poll(&mut self, chart: &Chart, now: f64) -> DrumMask {
        let mut mask = DrumMask::empty();
        while self.next_step < chart.len() {
            let required = chart.required(self.next_step);
            if required.is_empty() {
                self.next_step += 1;
                continue;
            }
            let due = match self.next_due {
                Some(t) => t,
                None => {
                    let t = chart.step_time(self.next_step) + self.jitter();
                    self.next_due = Some(t);
                    t
                }
            };
            if due > now {
                break;
            }
            mask |= required;
            self.next_step += 1;
            self.next_due = None;
        }
        mask
    }

    pub fn is_done(&self, chart: &Chart) -> bool {
        self.next_step >= chart.len()
    }
}

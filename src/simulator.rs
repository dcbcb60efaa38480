use rand::Rng;

use crate::model::round2;

/// Synthetic price generator: applies a uniformly random multiplicative
/// factor within `±DRIFT_BOUND` of 1.0 to the previous price.
#[derive(Debug, Clone)]
pub struct SimulatedGenerator {
    factor_lo: f64,
    factor_hi: f64,
}

pub const DRIFT_BOUND: f64 = 0.04;

impl Default for SimulatedGenerator {
    fn default() -> Self {
        Self {
            factor_lo: 1.0 - DRIFT_BOUND,
            factor_hi: 1.0 + DRIFT_BOUND,
        }
    }
}

impl SimulatedGenerator {
    /// Next plausible price from `previous`, rounded to 2 decimals. Pure
    /// given the supplied random source.
    pub fn next_price<R: Rng + ?Sized>(&self, rng: &mut R, previous: f64) -> f64 {
        let factor = rng.random_range(self.factor_lo..self.factor_hi);
        round2(previous * factor)
    }
}

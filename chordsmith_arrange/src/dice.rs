// Seeded randomness for the generators.
//
// One `Dice` is created per render from the song seed and threaded through
// every generator in track order, so a fixed seed reproduces the file byte
// for byte. Backed by `oorandom::Rand64`, whose output is stable across
// platforms.

use oorandom::Rand64;
use std::time::{SystemTime, UNIX_EPOCH};

pub struct Dice {
    rng: Rand64,
}

impl Dice {
    pub fn new(seed: u64) -> Self {
        Dice {
            rng: Rand64::new(u128::from(seed)),
        }
    }

    /// Uniform in `lo..=hi`. Bounds are swapped if reversed.
    pub fn between(&mut self, lo: u8, hi: u8) -> u8 {
        let (lo, hi) = (lo.min(hi), lo.max(hi));
        let span = u64::from(hi - lo) + 1;
        lo + self.rng.rand_range(0..span) as u8
    }

    /// Uniform in `-max..=max`.
    pub fn step(&mut self, max: u32) -> i64 {
        let max = u64::from(max);
        self.rng.rand_range(0..2 * max + 1) as i64 - max as i64
    }

    /// True with probability `p`.
    pub fn chance(&mut self, p: f64) -> bool {
        self.rng.rand_float() < p
    }

    /// An index drawn in proportion to its weight. `None` when no weight is
    /// positive or any weight is negative or not finite.
    pub fn weighted(&mut self, weights: &[f64]) -> Option<usize> {
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return None;
        }
        let total: f64 = weights.iter().sum();
        if !total.is_finite() || total <= 0.0 {
            return None;
        }
        let mut roll = self.rng.rand_float() * total;
        for (index, &weight) in weights.iter().enumerate() {
            if roll < weight {
                return Some(index);
            }
            roll -= weight;
        }
        // Rounding can leave the roll just past the last bucket.
        weights.iter().rposition(|&w| w > 0.0)
    }

    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let index = self.rng.rand_range(0..items.len() as u64) as usize;
        items.get(index)
    }
}

/// A seed from the clock, for renders that don't ask for one.
pub fn entropy_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

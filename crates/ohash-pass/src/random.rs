//! Sources of the pass's random choices.
//!
//! Every accumulator pick, combiner pick, and logging coin flip is drawn from a
//! [`RandomSource`]. Production runs use [`SeededRandom`]; tests replay a fixed
//! sequence with [`ScriptedRandom`] to pin exact placements.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub trait RandomSource {
    /// Uniform draw in `[0, range)`. Callers never pass `range == 0`.
    fn below(&mut self, range: usize) -> usize;
}

/// `StdRng` seeded once per run.
pub struct SeededRandom {
    rng: StdRng,
    seed: u64,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    /// Seed from the wall clock so placements differ between runs.
    pub fn from_time() -> Self {
        Self::new(time_seed())
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl RandomSource for SeededRandom {
    fn below(&mut self, range: usize) -> usize {
        self.rng.gen_range(0..range)
    }
}

fn time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Replays `draws` in order (cycling), each reduced modulo the requested range.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRandom {
    draws: Vec<usize>,
    pos: usize,
}

impl ScriptedRandom {
    pub fn new(draws: impl Into<Vec<usize>>) -> Self {
        Self {
            draws: draws.into(),
            pos: 0,
        }
    }

    /// Number of draws consumed so far.
    pub fn consumed(&self) -> usize {
        self.pos
    }
}

impl RandomSource for ScriptedRandom {
    fn below(&mut self, range: usize) -> usize {
        if self.draws.is_empty() {
            self.pos += 1;
            return 0;
        }
        let v = self.draws[self.pos % self.draws.len()];
        self.pos += 1;
        v % range
    }
}

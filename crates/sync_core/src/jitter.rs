use rand::{rngs::StdRng, Rng, SeedableRng};

/// Per-tick brightness reduction, as a fraction of full brightness.
pub trait JitterSource: Send {
    /// Draws a reduction in `0.0..max`.
    fn next_delta(&mut self, max: f32) -> f32;
}

pub struct RandomJitter {
    rng: StdRng,
}

impl RandomJitter {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomJitter {
    fn default() -> Self {
        Self::new()
    }
}

impl JitterSource for RandomJitter {
    fn next_delta(&mut self, max: f32) -> f32 {
        if max.is_nan() || max <= 0.0 {
            return 0.0;
        }
        self.rng.gen_range(0.0..max)
    }
}

/// Replays a fixed sequence of reductions, cycling when exhausted.
pub struct FixedJitter {
    deltas: Vec<f32>,
    next: usize,
}

impl FixedJitter {
    pub fn new(deltas: Vec<f32>) -> Self {
        Self { deltas, next: 0 }
    }
}

impl JitterSource for FixedJitter {
    fn next_delta(&mut self, max: f32) -> f32 {
        let Some(delta) = self.deltas.get(self.next % self.deltas.len().max(1)).copied() else {
            return 0.0;
        };
        self.next += 1;
        delta.clamp(0.0, max.max(0.0))
    }
}

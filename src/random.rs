//! Injectable randomness for cast selection and template choice.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniform draws in `[0, 1)`
pub trait RandomSource: Send + Sync {
    fn next_f64(&self) -> f64;

    /// Uniform index into a collection of `len` items (0 when empty)
    fn pick_index(&self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        ((self.next_f64() * len as f64) as usize).min(len - 1)
    }
}

pub type SharedRandom = Arc<dyn RandomSource>;

/// `StdRng` behind a lock, seeded explicitly or from entropy
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn shared(seed: Option<u64>) -> SharedRandom {
        match seed {
            Some(seed) => Arc::new(Self::with_seed(seed)),
            None => Arc::new(Self::from_entropy()),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_f64(&self) -> f64 {
        self.rng.lock().gen::<f64>()
    }
}

/// Replays a fixed list of draws, cycling when exhausted.
///
/// Useful wherever a test needs to steer a weighted draw.
pub struct ScriptedRandom {
    draws: Vec<f64>,
    cursor: AtomicUsize,
}

impl ScriptedRandom {
    pub fn new(draws: Vec<f64>) -> Self {
        let draws = draws
            .into_iter()
            .map(|d| if d.is_finite() { d.clamp(0.0, 0.999_999) } else { 0.0 })
            .collect();
        Self {
            draws,
            cursor: AtomicUsize::new(0),
        }
    }
}

impl RandomSource for ScriptedRandom {
    fn next_f64(&self) -> f64 {
        if self.draws.is_empty() {
            return 0.0;
        }
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.draws[i % self.draws.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let a = SeededRandom::with_seed(42);
        let b = SeededRandom::with_seed(42);
        for _ in 0..20 {
            assert_eq!(a.next_f64(), b.next_f64());
        }
    }

    #[test]
    fn test_draws_in_unit_interval() {
        let rng = SeededRandom::with_seed(7);
        for _ in 0..1000 {
            let d = rng.next_f64();
            assert!((0.0..1.0).contains(&d));
        }
    }

    #[test]
    fn test_pick_index_bounds() {
        let rng = ScriptedRandom::new(vec![0.0, 0.5, 0.999_999, 1.0]);
        assert_eq!(rng.pick_index(4), 0);
        assert_eq!(rng.pick_index(4), 2);
        assert_eq!(rng.pick_index(4), 3);
        assert_eq!(rng.pick_index(4), 3);
        assert_eq!(rng.pick_index(0), 0);
    }

    #[test]
    fn test_scripted_cycles() {
        let rng = ScriptedRandom::new(vec![0.1, 0.2]);
        assert_eq!(rng.next_f64(), 0.1);
        assert_eq!(rng.next_f64(), 0.2);
        assert_eq!(rng.next_f64(), 0.1);
    }
}

//! Deterministic random number generation.
//!
//! Every simulated verdict, fault and payload is drawn from a seeded
//! Xoshiro256** stream, so a failing simulation replays exactly from its seed.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

/// Seeded RNG with a draw counter.
///
/// ```rust
/// use ir_dst::DeterministicRng;
///
/// let mut rng = DeterministicRng::new(12345);
/// let a: u64 = rng.gen();
///
/// let mut replay = DeterministicRng::new(12345);
/// assert_eq!(replay.gen::<u64>(), a);
/// ```
#[derive(Debug, Clone)]
pub struct DeterministicRng {
    seed: u64,
    rng: Xoshiro256StarStar,
    draws_count: u64,
}

/// Draws beyond this suggest a runaway loop in a simulation.
const DRAWS_COUNT_WARNING_MAX: u64 = 1_000_000_000;

impl DeterministicRng {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        debug_assert!(seed != 0, "Seed should not be zero for better randomness");

        Self {
            seed,
            rng: Xoshiro256StarStar::seed_from_u64(seed),
            draws_count: 0,
        }
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of values drawn so far.
    #[must_use]
    pub fn draws_count(&self) -> u64 {
        self.draws_count
    }

    fn count_draw(&mut self) {
        self.draws_count += 1;
        debug_assert!(
            self.draws_count < DRAWS_COUNT_WARNING_MAX,
            "Very high number of RNG draws - possible infinite loop"
        );
    }

    pub fn gen<T>(&mut self) -> T
    where
        rand::distributions::Standard: rand::distributions::Distribution<T>,
    {
        self.count_draw();
        self.rng.gen()
    }

    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
    {
        self.count_draw();
        self.rng.gen_range(range)
    }

    /// `true` with the given probability.
    pub fn gen_bool(&mut self, probability: f64) -> bool {
        debug_assert!(
            (0.0..=1.0).contains(&probability),
            "Probability must be in [0.0, 1.0]"
        );
        self.count_draw();
        self.rng.gen_bool(probability)
    }

    /// Pick one element of a non-empty slice.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let idx = self.gen_range(0..items.len());
        items.get(idx)
    }

    /// Derive an independent RNG, for giving each simulated service its own stream.
    #[must_use]
    pub fn fork(&mut self) -> Self {
        let mut seed = self.gen::<u64>();
        if seed == 0 {
            seed = 1;
        }
        Self::new(seed)
    }
}

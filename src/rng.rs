//! Seedable random source for route sampling.
//!
//! Sampling takes a `&mut SamplerRng` instead of reaching for a thread-local
//! generator, so a fixed seed reproduces the same route queue.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

pub struct SamplerRng(SmallRng);

impl SamplerRng {
    pub fn new(seed: u64) -> Self {
        SamplerRng(SmallRng::seed_from_u64(seed))
    }

    /// Seeded from OS entropy, for runs that don't need to be repeatable.
    pub fn from_entropy() -> Self {
        SamplerRng(SmallRng::from_entropy())
    }

    #[inline]
    pub fn inner(&mut self) -> &mut SmallRng {
        &mut self.0
    }

    #[inline]
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
    {
        self.0.gen_range(range)
    }

    /// Shuffle a slice in place (Fisher-Yates).
    #[inline]
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        use rand::seq::SliceRandom;
        slice.shuffle(&mut self.0);
    }

    /// `amount` distinct elements drawn without replacement, in random order.
    /// Returns every element when `amount` exceeds the slice length.
    pub fn sample<T: Clone>(&mut self, slice: &[T], amount: usize) -> Vec<T> {
        use rand::seq::SliceRandom;
        slice
            .choose_multiple(&mut self.0, amount.min(slice.len()))
            .cloned()
            .collect()
    }
}

use rand::{thread_rng, Rng};

/// A source of uniformly distributed numbers in `[0, 1)` used for weighted variant draws.
pub trait RandomSource {
    /// Return the next number in `[0, 1)`.
    fn next_f64(&self) -> f64;
}

/// The default source, backed by [`rand::thread_rng`].
pub(crate) struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_f64(&self) -> f64 {
        thread_rng().gen()
    }
}

impl<T: Fn() -> f64> RandomSource for T {
    fn next_f64(&self) -> f64 {
        self()
    }
}

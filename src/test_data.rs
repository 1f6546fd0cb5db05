//! Synthetic profiles shared by the unit tests
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

use crate::peak::gaussian;
use crate::signal::Signal;

/// The sample coordinates used by the synthetic profiles, `0.0..=100.0` in steps of 0.25
pub fn axis() -> Vec<f64> {
    (0..=400).map(|i| i as f64 * 0.25).collect()
}

/// Sum `(amplitude, center, width)` Gaussians at `x`
pub fn mixture_at(x: f64, params: &[(f64, f64, f64)]) -> f64 {
    params
        .iter()
        .map(|(amplitude, center, width)| gaussian(x, *amplitude, *center, *width))
        .sum()
}

/// A noiseless mixture of `(amplitude, center, width)` Gaussians
pub fn mixture_signal(params: &[(f64, f64, f64)]) -> Signal {
    let x = axis();
    let y = x.iter().map(|x| mixture_at(*x, params)).collect();
    Signal::new(x, y).unwrap()
}

/// A mixture of `(amplitude, center, width)` Gaussians with additive normal noise of
/// standard deviation `sigma`, from a fixed seed
pub fn noisy_mixture_signal(params: &[(f64, f64, f64)], sigma: f64) -> Signal {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let noise = Normal::new(0.0, sigma).unwrap();
    let x = axis();
    let y = x
        .iter()
        .map(|x| mixture_at(*x, params) + noise.sample(&mut rng))
        .collect();
    Signal::new(x, y).unwrap()
}

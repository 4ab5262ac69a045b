//! Stochastic scalar sources driving one impairment dimension each.
//!
//! Every [`Provider`] variant carries its own PRNG stream, seeded once at
//! construction from a caller-supplied master generator (see
//! [`crate::scenario`]), so a fixed master seed reproduces every stream bit
//! for bit (spec §4.1 "Determinism").

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp, Normal};

/// A stateful, seeded source of non-negative scalar samples.
#[derive(Debug)]
pub enum Provider {
    /// Always returns `value`.
    Constant { value: f64 },
    /// `Exp(lambda) + offset`. Used for corruption multiplicity.
    Exponential {
        rng: StdRng,
        dist: Exp<f64>,
        offset: f64,
    },
    /// `max(0, N(mean, stddev))`.
    Gaussian {
        rng: StdRng,
        dist: Normal<f64>,
    },
    /// Gaussian with an additive, re-triggerable spike state machine
    /// (spec §4.1, §9 "Spike accumulation").
    GaussianWithSpike {
        rng: StdRng,
        dist: Normal<f64>,
        spike_chance: f64,
        max_spike_duration: u32,
        spike_multiplier: f64,
        remaining_spike_ticks: u32,
    },
}

impl Provider {
    pub fn constant(value: f64) -> Self {
        Provider::Constant { value }
    }

    pub fn exponential(seed: u64, lambda: f64, offset: f64) -> Self {
        Provider::Exponential {
            rng: StdRng::seed_from_u64(seed),
            dist: Exp::new(lambda).expect("lambda must be positive"),
            offset,
        }
    }

    pub fn gaussian(seed: u64, mean: f64, stddev: f64) -> Self {
        Provider::Gaussian {
            rng: StdRng::seed_from_u64(seed),
            dist: Normal::new(mean, stddev).expect("stddev must be non-negative"),
        }
    }

    pub fn gaussian_with_spike(
        seed: u64,
        mean: f64,
        stddev: f64,
        spike_chance: f64,
        max_spike_duration: u32,
        spike_multiplier: f64,
    ) -> Self {
        Provider::GaussianWithSpike {
            rng: StdRng::seed_from_u64(seed),
            dist: Normal::new(mean, stddev).expect("stddev must be non-negative"),
            spike_chance,
            max_spike_duration,
            spike_multiplier,
            remaining_spike_ticks: 0,
        }
    }

    /// Next non-negative real sample.
    pub fn sample(&mut self) -> f64 {
        match self {
            Provider::Constant { value } => *value,
            Provider::Exponential { rng, dist, offset } => dist.sample(rng) + *offset,
            Provider::Gaussian { rng, dist } => dist.sample(rng).max(0.0),
            Provider::GaussianWithSpike {
                rng,
                dist,
                spike_chance,
                max_spike_duration,
                spike_multiplier,
                remaining_spike_ticks,
            } => {
                // The chance-to-add-spike check always runs and always
                // consumes a draw, regardless of whether a spike is already
                // in progress (spec §4.1 tie-break).
                if rng.random::<f64>() < *spike_chance {
                    *remaining_spike_ticks += rng.random_range(1..=*max_spike_duration);
                }

                if *remaining_spike_ticks > 0 {
                    *remaining_spike_ticks -= 1;
                    (dist.sample(rng) * *spike_multiplier).max(0.0)
                } else {
                    dist.sample(rng).max(0.0)
                }
            }
        }
    }

    /// Next non-negative integer sample: truncation for [`Provider::Constant`],
    /// floor for [`Provider::Exponential`], round for the two Gaussian variants.
    pub fn sample_int(&mut self) -> u64 {
        match self {
            Provider::Constant { value } => *value as u64,
            Provider::Exponential { .. } => self.sample().floor() as u64,
            Provider::Gaussian { .. } | Provider::GaussianWithSpike { .. } => {
                self.sample().round() as u64
            }
        }
    }
}

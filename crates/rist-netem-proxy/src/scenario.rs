//! Named bundles of Provider configurations (spec §6 "Scenario parameter
//! table"), wired up deterministically from a single master seed.
//!
//! Mirrors the shape of `strata-sim::scenario::Scenario` — a config
//! consumed by a constructor that seeds one master RNG and derives
//! per-dimension state from it — adapted from strata's random-walk link
//! model to this spec's fixed table of stochastic [`Provider`]s.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{ProxyError, Result};
use crate::impairment::ImpairmentState;
use crate::provider::Provider;

const MIB: f64 = 1024.0 * 1024.0;
const SPIKE_CHANCE: f64 = 0.005;
const MAX_SPIKE_DURATION: u32 = 30;

/// One of the four fixed named scenarios from spec §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Scenario {
    Best,
    Average,
    Worst,
    Testing,
}

impl Scenario {
    pub fn name(self) -> &'static str {
        match self {
            Scenario::Best => "Best",
            Scenario::Average => "Average",
            Scenario::Worst => "Worst",
            Scenario::Testing => "Testing",
        }
    }

    /// Builds the [`ImpairmentState`] for this scenario under `run_dir`.
    ///
    /// Derives one seed per dimension from `master_rng` in construction
    /// order (bandwidth, latency, loss, corruption rate, corruption
    /// multiplicity), so a fixed master seed reproduces every provider's
    /// stream (spec §9 "PRNG discipline").
    pub fn build(
        self,
        master_rng: &mut StdRng,
        run_dir: &Path,
        update_every: Duration,
    ) -> Result<ImpairmentState> {
        let seed_bw = master_rng.random();
        let seed_lat = master_rng.random();
        let seed_loss = master_rng.random();
        let seed_corr = master_rng.random();
        let seed_mult = master_rng.random();

        let (bandwidth, latency, loss, corruption, multiplicity) = match self {
            Scenario::Best => (
                Provider::gaussian(seed_bw, 15.0 * MIB, 1.0 * MIB),
                Provider::gaussian(seed_lat, 0.010, 0.0025),
                Provider::constant(0.0),
                Provider::constant(0.0),
                Provider::constant(0.0),
            ),
            Scenario::Average => (
                Provider::gaussian_with_spike(
                    seed_bw,
                    10.0 * MIB,
                    1.0 * MIB,
                    SPIKE_CHANCE,
                    MAX_SPIKE_DURATION,
                    0.5,
                ),
                Provider::gaussian_with_spike(
                    seed_lat,
                    0.060,
                    0.005,
                    SPIKE_CHANCE,
                    MAX_SPIKE_DURATION,
                    1.5,
                ),
                Provider::gaussian_with_spike(
                    seed_loss,
                    0.025,
                    0.0125,
                    SPIKE_CHANCE,
                    MAX_SPIKE_DURATION,
                    3.0,
                ),
                Provider::gaussian_with_spike(
                    seed_corr,
                    0.01,
                    0.005,
                    SPIKE_CHANCE,
                    MAX_SPIKE_DURATION,
                    3.0,
                ),
                Provider::exponential(seed_mult, 2.0, 1.0),
            ),
            Scenario::Worst => (
                Provider::gaussian(seed_bw, 5.0 * MIB, 1.0 * MIB),
                Provider::gaussian(seed_lat, 0.100, 0.010),
                Provider::constant(0.10),
                Provider::constant(0.05),
                Provider::exponential(seed_mult, 2.0, 1.0),
            ),
            Scenario::Testing => (
                Provider::constant(100_000.0),
                Provider::constant(1.0),
                Provider::constant(0.0),
                Provider::constant(0.0),
                Provider::constant(0.0),
            ),
        };

        ImpairmentState::new(
            run_dir,
            update_every,
            bandwidth,
            latency,
            loss,
            corruption,
            multiplicity,
        )
    }
}

impl FromStr for Scenario {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Best" => Ok(Scenario::Best),
            "Average" => Ok(Scenario::Average),
            "Worst" => Ok(Scenario::Worst),
            "Testing" => Ok(Scenario::Testing),
            other => Err(ProxyError::InvalidScenario(other.to_string())),
        }
    }
}

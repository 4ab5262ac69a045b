//! The impairment-parameter subsystem: one [`Provider`] per dimension,
//! refreshed on a periodic cadence and logged to a CSV trace (spec §3, §4.2).

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

use crate::error::{ProxyError, Result};
use crate::provider::Provider;

const CSV_HEADER: &str = "time,bandwidth,latency,packet_loss_rate,packet_corruption_rate\n";

/// Owns one [`Provider`] per impairment dimension, the cached "current"
/// value for each continuous dimension, and the open CSV trace sink.
pub struct ImpairmentState {
    bandwidth_provider: Provider,
    latency_provider: Provider,
    loss_provider: Provider,
    corruption_provider: Provider,
    pub no_of_packet_corruptions: Provider,

    pub bandwidth: f64,
    pub latency: f64,
    pub packet_loss_rate: f64,
    pub packet_corruption_rate: f64,

    start_time: Instant,
    last_update: Instant,
    update_every: Duration,
    file: File,
}

impl ImpairmentState {
    /// Creates `dir` (must not already exist), opens `dir/data.csv`, samples
    /// every continuous provider once, and writes the initial row.
    pub fn new(
        dir: &Path,
        update_every: Duration,
        bandwidth_provider: Provider,
        latency_provider: Provider,
        loss_provider: Provider,
        corruption_provider: Provider,
        no_of_packet_corruptions: Provider,
    ) -> Result<Self> {
        if dir.exists() {
            return Err(ProxyError::RunDirExists(dir.to_path_buf()));
        }
        fs::create_dir_all(dir)?;

        let mut file = File::create(dir.join("data.csv"))?;
        file.write_all(CSV_HEADER.as_bytes())?;

        let now = Instant::now();
        let mut state = Self {
            bandwidth_provider,
            latency_provider,
            loss_provider,
            corruption_provider,
            no_of_packet_corruptions,
            bandwidth: 0.0,
            latency: 0.0,
            packet_loss_rate: 0.0,
            packet_corruption_rate: 0.0,
            start_time: now,
            last_update: now,
            update_every,
            file,
        };
        state.resample();
        state.write_row()?;
        Ok(state)
    }

    fn resample(&mut self) {
        self.bandwidth = self.bandwidth_provider.sample();
        self.latency = self.latency_provider.sample();
        self.packet_loss_rate = self.loss_provider.sample();
        self.packet_corruption_rate = self.corruption_provider.sample();
    }

    fn write_row(&mut self) -> Result<()> {
        let t = self.last_update.duration_since(self.start_time).as_secs_f64();
        writeln!(
            self.file,
            "{},{},{},{},{}",
            t, self.bandwidth, self.latency, self.packet_loss_rate, self.packet_corruption_rate
        )?;
        Ok(())
    }

    /// Resample and log once every `update_every`, but only once the proxy
    /// has seen its first packet — the proxy should not age its parameters
    /// before traffic starts, so runs are directly comparable (spec §4.2).
    pub fn update(&mut self, started: bool) -> Result<()> {
        if !started {
            return Ok(());
        }
        let now = Instant::now();
        if now.duration_since(self.last_update) >= self.update_every {
            self.last_update = now;
            self.resample();
            tracing::debug!(
                bandwidth = self.bandwidth,
                latency = self.latency,
                packet_loss_rate = self.packet_loss_rate,
                packet_corruption_rate = self.packet_corruption_rate,
                "impairment refresh"
            );
            self.write_row()?;
        }
        Ok(())
    }

    /// Loss rate clamped into `[0, 1]` at read time; the CSV keeps the raw
    /// pre-clamp value (spec §7 "Provider range").
    pub fn clamped_loss_rate(&self) -> f64 {
        self.packet_loss_rate.clamp(0.0, 1.0)
    }

    pub fn clamped_corruption_rate(&self) -> f64 {
        self.packet_corruption_rate.clamp(0.0, 1.0)
    }

    pub fn close(mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }
}

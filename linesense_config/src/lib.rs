#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the line-sensing stack.
//!
//! `Config` and sub-structs are deserialized from TOML and validated. Every
//! section has defaults, so an empty document is a valid configuration for the
//! simulated source.
use serde::Deserialize;

/// Sensor bar geometry and polarity.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct ArrayCfg {
    /// Number of channels on the bar, fixed for the sensor's lifetime.
    pub sensor_count: usize,
    /// Track a light line on a dark background instead of the default
    /// dark-on-light.
    pub white_line: bool,
}

impl Default for ArrayCfg {
    fn default() -> Self {
        Self {
            sensor_count: 5,
            white_line: false,
        }
    }
}

/// Estimator thresholds on the normalized [0, 1000] scale.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Thresholds {
    /// Channels at or below this value are excluded from the centroid.
    pub noise_floor: u16,
    /// A channel above this value marks the line as present.
    #[serde(alias = "on_line_threshold")]
    pub on_line: u16,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            noise_floor: 50,
            on_line: 500,
        }
    }
}

/// TLC1543 transport settings; only consulted by hardware builds.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct SpiCfg {
    /// SPI bus index (0 = /dev/spidev0.x on a Pi).
    pub bus: u8,
    /// BCM pin driving the ADC chip select.
    pub chip_select_pin: u8,
    /// SPI clock in Hz; the TLC1543 tops out around 2 MHz.
    #[serde(default = "default_clock_hz")]
    pub clock_hz: u32,
}

fn default_clock_hz() -> u32 {
    2_000_000
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub array: ArrayCfg,
    pub thresholds: Thresholds,
    pub spi: Option<SpiCfg>,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        if self.array.sensor_count == 0 {
            eyre::bail!("array.sensor_count must be >= 1");
        }
        if self.array.sensor_count > 128 {
            eyre::bail!("array.sensor_count is unreasonably large (>128)");
        }
        if self.thresholds.on_line > 1000 {
            eyre::bail!("thresholds.on_line must be <= 1000");
        }
        // The estimator's division-safety argument needs the floor strictly
        // below the on-line threshold.
        if self.thresholds.noise_floor >= self.thresholds.on_line {
            eyre::bail!("thresholds.noise_floor must be below thresholds.on_line");
        }
        if let Some(spi) = &self.spi
            && spi.clock_hz == 0
        {
            eyre::bail!("spi.clock_hz must be > 0");
        }
        Ok(())
    }
}

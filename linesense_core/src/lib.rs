#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core line-position pipeline (hardware-agnostic).
//!
//! This crate turns raw reflectance snapshots from a linear sensor bar into a
//! calibrated lateral line position. All sensor interactions go through the
//! `linesense_traits::SensorSource` trait.
//!
//! ## Architecture
//!
//! - **Calibration**: per-channel widening [min, max] bounds (`calibrate`)
//! - **Normalization**: raw → [0, 1000] per channel (`read_calibrated`)
//! - **Estimation**: weighted centroid over channel indices with on/off-line
//!   hysteresis (`read_line`)
//!
//! ## Integer arithmetic
//!
//! The pipeline is integer-only: signed 32-bit for per-channel scaling (wide
//! enough for any `u16` raw value times the normalized full scale), unsigned
//! 64-bit accumulators for the centroid. Positions live in
//! `[0, (sensor_count - 1) * 1000]`.

// Module declarations
pub mod error;
pub mod mocks;
pub mod util;

use crate::error::{BuildError, LineError, Result};
use eyre::WrapErr;
use linesense_traits::SensorSource;

use crate::util::{NORMALIZED_FULL_SCALE, RAW_FULL_SCALE};

/// Raw reads taken by a single `calibrate` pass.
pub const CALIBRATION_READS: usize = 10;
/// Channel count of the stock 5-element bar.
pub const DEFAULT_SENSOR_COUNT: usize = 5;
/// Upper bound on configurable bar width.
pub const MAX_SENSOR_COUNT: usize = 128;

/// Estimator thresholds on the normalized [0, 1000] scale.
#[derive(Debug, Clone, Copy)]
pub struct EstimatorCfg {
    /// Channels at or below this value are excluded from the centroid
    /// entirely, not merely down-weighted.
    pub noise_floor: u16,
    /// A channel strictly above this value marks the line as present.
    /// Must stay above `noise_floor`; build validation enforces it.
    pub on_line_threshold: u16,
}

impl Default for EstimatorCfg {
    fn default() -> Self {
        Self {
            noise_floor: 50,
            on_line_threshold: 500,
        }
    }
}

impl From<linesense_config::Thresholds> for EstimatorCfg {
    fn from(t: linesense_config::Thresholds) -> Self {
        Self {
            noise_floor: t.noise_floor,
            on_line_threshold: t.on_line,
        }
    }
}

/// One position estimate plus the per-channel values behind it.
#[derive(Debug, Clone)]
pub struct LineReading {
    /// Lateral position in `[0, (sensor_count - 1) * 1000]`; 0 means the line
    /// sits under channel 0, 1000 under channel 1, and so on.
    pub position: i32,
    /// Whether any channel cleared the on-line threshold. When false the
    /// position is the hysteresis fallback, not a fresh centroid.
    pub on_line: bool,
    /// Normalized per-channel values after polarity inversion, for
    /// diagnostics.
    pub values: Vec<u16>,
}

/// Unified core for both dynamic (boxed) and generic (static dispatch)
/// variants. Owns the per-channel calibration bounds and the last on-line
/// position; one instance per physical bar, so several bars coexist without
/// shared state.
pub struct LineSensorCore<S: SensorSource> {
    source: S,
    sensor_count: usize,
    estimator: EstimatorCfg,
    // Bounds start at the opposite extremes so a calibration pass can only
    // widen them toward the true range.
    calibrated_min: Vec<u16>,
    calibrated_max: Vec<u16>,
    // Last centroid, kept across calls for the off-line fallback.
    last_position: i32,
    // Cached (sensor_count - 1) * 1000
    full_scale_position: i32,
}

impl<S: SensorSource> core::fmt::Debug for LineSensorCore<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LineSensorCore")
            .field("sensor_count", &self.sensor_count)
            .field("last_position", &self.last_position)
            .finish()
    }
}

impl<S: SensorSource> LineSensorCore<S> {
    /// Number of channels on the bar, fixed at construction.
    pub fn sensor_count(&self) -> usize {
        self.sensor_count
    }

    /// Last position computed while the line was visible.
    pub fn last_position(&self) -> i32 {
        self.last_position
    }

    /// Largest representable position, `(sensor_count - 1) * 1000`.
    pub fn full_scale_position(&self) -> i32 {
        self.full_scale_position
    }

    /// Return the configured estimator thresholds.
    pub fn estimator_cfg(&self) -> &EstimatorCfg {
        &self.estimator
    }

    /// Per-channel lower calibration bounds recorded so far.
    pub fn calibrated_min(&self) -> &[u16] {
        &self.calibrated_min
    }

    /// Per-channel upper calibration bounds recorded so far.
    pub fn calibrated_max(&self) -> &[u16] {
        &self.calibrated_max
    }

    /// One calibration pass: ten raw reads, per-channel extremes over the
    /// burst, then a widening-only merge into the stored bounds.
    ///
    /// The merge compares the burst minimum against the running max and the
    /// burst maximum against the running min, so a single outlier inside the
    /// burst can never move a stored bound by itself; only a value extreme
    /// across the whole burst is eligible.
    pub fn calibrate(&mut self) -> Result<()> {
        let n = self.sensor_count;
        let mut session_max = vec![0u16; n];
        let mut session_min = vec![0u16; n];

        for pass in 0..CALIBRATION_READS {
            let raw = self.read_raw_checked()?;
            for i in 0..n {
                // set the extremes we found THIS burst
                if pass == 0 || raw[i] > session_max[i] {
                    session_max[i] = raw[i];
                }
                if pass == 0 || raw[i] < session_min[i] {
                    session_min[i] = raw[i];
                }
            }
        }

        for i in 0..n {
            if session_min[i] > self.calibrated_max[i] {
                self.calibrated_max[i] = session_min[i];
            }
            if session_max[i] < self.calibrated_min[i] {
                self.calibrated_min[i] = session_max[i];
            }
        }
        tracing::debug!(
            min = ?self.calibrated_min,
            max = ?self.calibrated_max,
            "calibration pass recorded"
        );
        Ok(())
    }

    /// Rescale one externally sampled snapshot through the stored bounds.
    /// Fails fast when the snapshot length does not match `sensor_count`.
    pub fn normalize(&self, raw: &[u16]) -> Result<Vec<u16>> {
        self.check_snapshot_len(raw.len())?;
        Ok(raw
            .iter()
            .enumerate()
            .map(|(i, &r)| util::normalize_channel(r, self.calibrated_min[i], self.calibrated_max[i]))
            .collect())
    }

    /// Read the bar once and return per-channel values calibrated to
    /// [0, 1000], where 0 maps to the channel's calibrated minimum and 1000
    /// to its calibrated maximum.
    pub fn read_calibrated(&mut self) -> Result<Vec<u16>> {
        let raw = self.read_raw_checked()?;
        self.normalize(&raw)
    }

    /// Read the bar once and estimate the line position.
    ///
    /// With `white_line` set, each normalized value is replaced by
    /// `1000 - value` before thresholding and averaging (light line on a dark
    /// background).
    pub fn read_line(&mut self, white_line: bool) -> Result<LineReading> {
        let raw = self.read_raw_checked()?;
        let values = self.normalize(&raw)?;
        Ok(self.estimate(values, white_line))
    }

    /// Estimate from a pre-sampled raw snapshot instead of touching the
    /// source.
    pub fn line_from_raw(&mut self, raw: &[u16], white_line: bool) -> Result<LineReading> {
        let values = self.normalize(raw)?;
        Ok(self.estimate(values, white_line))
    }

    fn estimate(&mut self, mut values: Vec<u16>, white_line: bool) -> LineReading {
        let mut on_line = false;
        let mut weighted_sum: u64 = 0;
        let mut weight_sum: u64 = 0;

        for (i, value) in values.iter_mut().enumerate() {
            if white_line {
                *value = NORMALIZED_FULL_SCALE - *value;
            }
            let v = *value;

            // keep track of whether we see the line at all
            if v > self.estimator.on_line_threshold {
                on_line = true;
            }
            // only average in values above the noise floor
            if v > self.estimator.noise_floor {
                weighted_sum += u64::from(v) * (i as u64 * 1000);
                weight_sum += u64::from(v);
            }
        }

        let position = if on_line {
            // on_line_threshold > noise_floor, so the channel that set
            // on_line also contributed to weight_sum.
            debug_assert!(weight_sum > 0, "on-line estimate with empty weight sum");
            let p = (weighted_sum / weight_sum) as i32;
            self.last_position = p;
            p
        } else if self.last_position < self.full_scale_position / 2 {
            // line lost; it last read left of center
            0
        } else {
            // line lost; it last read right of center
            self.full_scale_position
        };

        tracing::trace!(position, on_line, "line estimate");
        LineReading {
            position,
            on_line,
            values,
        }
    }

    fn read_raw_checked(&mut self) -> Result<Vec<u16>> {
        let raw = self
            .source
            .read_raw()
            .map_err(|e| eyre::Report::new(map_source_error_dyn(&*e)))
            .wrap_err("reading sensor bar")?;
        self.check_snapshot_len(raw.len())?;
        Ok(raw)
    }

    fn check_snapshot_len(&self, got: usize) -> Result<()> {
        if got != self.sensor_count {
            return Err(eyre::Report::new(LineError::ChannelCount {
                expected: self.sensor_count,
                got,
            }));
        }
        Ok(())
    }
}

// Map any source error to a typed LineError, with special handling for
// hardware errors.
fn map_source_error_dyn(e: &(dyn std::error::Error + 'static)) -> LineError {
    #[cfg(feature = "hardware-errors")]
    if let Some(hw) = e.downcast_ref::<linesense_hardware::error::HwError>() {
        return match hw {
            linesense_hardware::error::HwError::Timeout => LineError::Timeout,
            other => LineError::SensorFault(other.to_string()),
        };
    }
    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        LineError::Timeout
    } else {
        LineError::Sensor(s)
    }
}

/// Public dynamic (boxed) sensor that hides the source type via composition.
pub struct LineSensor {
    inner: LineSensorCore<Box<dyn SensorSource>>,
}

impl core::fmt::Debug for LineSensor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LineSensor")
            .field("sensor_count", &self.inner.sensor_count)
            .field("last_position", &self.inner.last_position)
            .finish()
    }
}

impl LineSensor {
    /// Start building a LineSensor.
    pub fn builder() -> LineSensorBuilder<Missing> {
        LineSensorBuilder::default()
    }

    /// Number of channels on the bar, fixed at construction.
    pub fn sensor_count(&self) -> usize {
        self.inner.sensor_count()
    }

    /// Last position computed while the line was visible.
    pub fn last_position(&self) -> i32 {
        self.inner.last_position()
    }

    /// Largest representable position, `(sensor_count - 1) * 1000`.
    pub fn full_scale_position(&self) -> i32 {
        self.inner.full_scale_position()
    }

    /// Return the configured estimator thresholds.
    pub fn estimator_cfg(&self) -> &EstimatorCfg {
        self.inner.estimator_cfg()
    }

    /// Per-channel lower calibration bounds recorded so far.
    pub fn calibrated_min(&self) -> &[u16] {
        self.inner.calibrated_min()
    }

    /// Per-channel upper calibration bounds recorded so far.
    pub fn calibrated_max(&self) -> &[u16] {
        self.inner.calibrated_max()
    }

    /// One calibration pass (ten raw reads, widening-only bound merge).
    pub fn calibrate(&mut self) -> Result<()> {
        self.inner.calibrate()
    }

    /// Rescale one externally sampled snapshot through the stored bounds.
    pub fn normalize(&self, raw: &[u16]) -> Result<Vec<u16>> {
        self.inner.normalize(raw)
    }

    /// Read the bar once and return calibrated per-channel values.
    pub fn read_calibrated(&mut self) -> Result<Vec<u16>> {
        self.inner.read_calibrated()
    }

    /// Read the bar once and estimate the line position.
    pub fn read_line(&mut self, white_line: bool) -> Result<LineReading> {
        self.inner.read_line(white_line)
    }

    /// Estimate from a pre-sampled raw snapshot instead of touching the
    /// source.
    pub fn line_from_raw(&mut self, raw: &[u16], white_line: bool) -> Result<LineReading> {
        self.inner.line_from_raw(raw, white_line)
    }
}

// Type-state markers for the builder
pub struct Missing;
pub struct Set;

use std::marker::PhantomData;

/// Builder for `LineSensor`. Geometry and thresholds are validated on
/// `build()`.
pub struct LineSensorBuilder<S> {
    source: Option<Box<dyn SensorSource>>,
    sensor_count: Option<usize>,
    estimator: Option<EstimatorCfg>,
    // Type-state marker
    _s: PhantomData<S>,
}

impl Default for LineSensorBuilder<Missing> {
    fn default() -> Self {
        Self {
            source: None,
            sensor_count: None,
            estimator: None,
            _s: PhantomData,
        }
    }
}

/// Chainable setters that do not affect type-state
impl<S> LineSensorBuilder<S> {
    pub fn with_sensor_count(mut self, sensor_count: usize) -> Self {
        self.sensor_count = Some(sensor_count);
        self
    }

    pub fn with_estimator(mut self, estimator: EstimatorCfg) -> Self {
        self.estimator = Some(estimator);
        self
    }

    /// Fallible build available in any type-state; returns a detailed
    /// BuildError for missing pieces.
    pub fn try_build(self) -> Result<LineSensor> {
        let LineSensorBuilder {
            source,
            sensor_count,
            estimator,
            _s: _,
        } = self;

        let source = source.ok_or_else(|| eyre::Report::new(BuildError::MissingSource))?;
        let sensor_count = sensor_count.unwrap_or(DEFAULT_SENSOR_COUNT);
        let estimator = estimator.unwrap_or_default();
        let inner = build_line_sensor(source, sensor_count, estimator)?;
        Ok(LineSensor { inner })
    }
}

// Setter that advances type-state when providing the mandatory source
impl LineSensorBuilder<Missing> {
    pub fn with_source(self, source: impl SensorSource + 'static) -> LineSensorBuilder<Set> {
        let LineSensorBuilder {
            source: _,
            sensor_count,
            estimator,
            _s: _,
        } = self;
        LineSensorBuilder {
            source: Some(Box::new(source)),
            sensor_count,
            estimator,
            _s: PhantomData,
        }
    }
}

impl LineSensorBuilder<Set> {
    /// Validate and build the LineSensor. Only available once a source is
    /// set.
    pub fn build(self) -> Result<LineSensor> {
        self.try_build()
    }
}

/// Generic, statically-dispatched alias using the unified core.
pub type LineSensorG<S> = LineSensorCore<S>;

/// Build a generic, statically-dispatched LineSensorG from a concrete source.
pub fn build_line_sensor<S>(
    source: S,
    sensor_count: usize,
    estimator: EstimatorCfg,
) -> Result<LineSensorG<S>>
where
    S: SensorSource + 'static,
{
    if !(1..=MAX_SENSOR_COUNT).contains(&sensor_count) {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "sensor count out of range",
        )));
    }
    if estimator.on_line_threshold > NORMALIZED_FULL_SCALE {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "on_line_threshold exceeds the normalized full scale",
        )));
    }
    // Threshold ordering keeps the centroid division safe: any channel that
    // clears the on-line threshold is also above the noise floor.
    if estimator.noise_floor >= estimator.on_line_threshold {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "noise_floor must be below on_line_threshold",
        )));
    }

    Ok(LineSensorCore {
        source,
        sensor_count,
        estimator,
        calibrated_min: vec![RAW_FULL_SCALE; sensor_count],
        calibrated_max: vec![0; sensor_count],
        last_position: 0,
        full_scale_position: ((sensor_count - 1) * 1000) as i32,
    })
}

//! Quick start: calibrate against the simulated sensor bar, then stream a
//! few position estimates.
//!
//! Run with `cargo run -p linesense_core --example quick_start`.

use linesense_core::{EstimatorCfg, LineSensor};
use linesense_hardware::SimulatedLineSource;

fn main() -> eyre::Result<()> {
    let mut sensor = LineSensor::builder()
        .with_source(SimulatedLineSource::new(5))
        .with_sensor_count(5)
        .with_estimator(EstimatorCfg::default())
        .build()?;

    // Let the simulated line sweep under the bar while the bounds settle.
    for _ in 0..4 {
        sensor.calibrate()?;
    }

    for _ in 0..20 {
        let reading = sensor.read_line(false)?;
        println!(
            "position={:>5} on_line={} values={:?}",
            reading.position, reading.on_line, reading.values
        );
    }
    Ok(())
}

//! Test and helper mocks for linesense_core

/// A source that always errors on read; useful when driving the pipeline with
/// externally sampled snapshots via `line_from_raw`.
pub struct NoopSource;

impl linesense_traits::SensorSource for NoopSource {
    fn read_raw(&mut self) -> Result<Vec<u16>, Box<dyn std::error::Error + Send + Sync>> {
        Err(Box::new(std::io::Error::other("noop source")))
    }
}

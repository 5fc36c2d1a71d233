/// Source of raw reflectance snapshots from one linear sensor bar.
///
/// A snapshot is one unsigned magnitude per channel, higher meaning darker
/// (less reflective). Implementations must return the same channel count on
/// every read; the core fails fast on a length mismatch. A read may block for
/// as long as the underlying transport needs — no timeout semantics exist at
/// this boundary.
pub trait SensorSource {
    fn read_raw(&mut self) -> Result<Vec<u16>, Box<dyn std::error::Error + Send + Sync>>;
}

impl<T: SensorSource + ?Sized> SensorSource for Box<T> {
    fn read_raw(&mut self) -> Result<Vec<u16>, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read_raw()
    }
}

pub mod error;
#[cfg(feature = "hardware")]
pub mod tlc1543;

use linesense_traits::SensorSource;

// Simulated reflectance profile: light background, dark line peak, linear
// falloff over LINE_HALF_WIDTH channel spacings.
const BACKGROUND_RAW: f32 = 120.0;
const PEAK_RAW: f32 = 980.0;
const LINE_HALF_WIDTH: f32 = 1.5;

/// Simulated sensor bar: a dark line sweeping back and forth under the
/// channels, rendered as a triangular darkness profile around the line
/// center. Deterministic, so tests and the CLI demo behave the same way on
/// every run.
pub struct SimulatedLineSource {
    sensor_count: usize,
    center: f32,
    velocity: f32,
}

impl SimulatedLineSource {
    pub fn new(sensor_count: usize) -> Self {
        SimulatedLineSource {
            sensor_count,
            center: 0.0,
            velocity: 0.05,
        }
    }
}

impl SensorSource for SimulatedLineSource {
    fn read_raw(&mut self) -> Result<Vec<u16>, Box<dyn std::error::Error + Send + Sync>> {
        let mut snapshot = Vec::with_capacity(self.sensor_count);
        for i in 0..self.sensor_count {
            let distance = (i as f32 - self.center).abs();
            let darkness = (1.0 - distance / LINE_HALF_WIDTH).max(0.0);
            let raw = BACKGROUND_RAW + darkness * (PEAK_RAW - BACKGROUND_RAW);
            snapshot.push(raw as u16);
        }

        // Bounce the line between the outermost channels.
        self.center += self.velocity;
        let rightmost = self.sensor_count.saturating_sub(1) as f32;
        if self.center <= 0.0 || self.center >= rightmost {
            self.velocity = -self.velocity;
            self.center = self.center.clamp(0.0, rightmost);
        }
        Ok(snapshot)
    }
}

/// TLC1543-backed sensor bar.
#[cfg(feature = "hardware")]
pub struct HardwareLineSource {
    adc: tlc1543::Tlc1543,
    sensor_count: usize,
}

#[cfg(feature = "hardware")]
impl HardwareLineSource {
    pub fn new(
        bus: u8,
        chip_select_pin: u8,
        clock_hz: u32,
        sensor_count: usize,
    ) -> Result<Self, error::HwError> {
        use rppal::gpio::Gpio;
        use rppal::spi::{Bus, Mode, SlaveSelect, Spi};

        let bus = match bus {
            0 => Bus::Spi0,
            1 => Bus::Spi1,
            2 => Bus::Spi2,
            other => return Err(error::HwError::Spi(format!("unsupported spi bus {other}"))),
        };
        // Chip select is driven manually around each frame; the kernel's own
        // slave select stays unused.
        let spi = Spi::new(bus, SlaveSelect::Ss0, clock_hz, Mode::Mode0)
            .map_err(|e| error::HwError::Spi(e.to_string()))?;
        let cs = Gpio::new()
            .map_err(|e| error::HwError::Gpio(e.to_string()))?
            .get(chip_select_pin)
            .map_err(|e| error::HwError::Gpio(e.to_string()))?
            .into_output();
        let adc = tlc1543::Tlc1543::new(spi, cs)?;
        Ok(HardwareLineSource { adc, sensor_count })
    }
}

#[cfg(feature = "hardware")]
impl SensorSource for HardwareLineSource {
    fn read_raw(&mut self) -> Result<Vec<u16>, Box<dyn std::error::Error + Send + Sync>> {
        match self.adc.read_all(self.sensor_count) {
            Ok(values) => Ok(values),
            Err(e) => {
                tracing::error!("sensor bar read error: {}", e);
                Err(Box::new(e))
            }
        }
    }
}

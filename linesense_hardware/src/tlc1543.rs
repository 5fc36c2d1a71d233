use std::time::Duration;
use tracing::trace;

use crate::error::{HwError, Result};

// Settle times carried over from the acquisition sequence this driver
// replaces: CS low before clocking, then the ADC's conversion window.
const CS_SETTLE: Duration = Duration::from_micros(2);
const CONVERSION_WAIT: Duration = Duration::from_micros(21);

/// TLC1543 10-bit serial ADC on an SPI bus with a manually driven chip select.
pub struct Tlc1543 {
    spi: rppal::spi::Spi,
    cs: rppal::gpio::OutputPin,
}

impl Tlc1543 {
    pub fn new(spi: rppal::spi::Spi, mut cs: rppal::gpio::OutputPin) -> Result<Self> {
        cs.set_high(); // chip idle between frames
        Ok(Self { spi, cs })
    }

    /// One conversion frame: the next channel address goes out in the upper
    /// nibble of a 16-bit word, the previous conversion comes back with 10
    /// significant bits.
    fn transfer(&mut self, channel: u8) -> Result<u16> {
        let tx = (u16::from(channel) << 12).to_be_bytes();
        let mut rx = [0u8; 2];

        self.cs.set_low();
        std::thread::sleep(CS_SETTLE);
        let n = self
            .spi
            .transfer(&mut rx, &tx)
            .map_err(|e| HwError::Spi(e.to_string()))?;
        self.cs.set_high();
        std::thread::sleep(CONVERSION_WAIT);

        if n != tx.len() {
            return Err(HwError::ShortTransfer {
                expected: tx.len(),
                got: n,
            });
        }
        Ok(u16::from_be_bytes(rx) >> 6)
    }

    /// Read all `channels` inputs. The ADC answers one frame late, so one
    /// extra frame is clocked and the first response discarded.
    pub fn read_all(&mut self, channels: usize) -> Result<Vec<u16>> {
        let mut values = Vec::with_capacity(channels);
        for i in 0..=channels {
            let v = self.transfer(i as u8)?;
            if i > 0 {
                values.push(v);
            }
        }
        trace!(?values, "tlc1543 snapshot");
        Ok(values)
    }
}

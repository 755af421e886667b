//! TH02 digital humidity and temperature sensor.
//!
//! Every measurement is a fresh sequence: write a conversion command to
//! the config register, poll the busy flag in the status register, read
//! the two data registers and decode.
//!
//! ```text
//!   CONFIG <- command
//!          │
//!          ▼
//!     wait 25 ms ◄──────────┐
//!          │                │
//!          ▼                │
//!   STATUS bit 0 set? ── yes (at most 8 checks)
//!          │
//!          no
//!          ▼
//!   DATAH, DATAL -> decode
//! ```

use core::fmt;

use embedded_hal::blocking::delay::DelayMs;
use log::{debug, warn};

use crate::i2c::RegisterBus;

/// Fixed I2C address of the TH02
pub const SENSOR_ADDRESS: u8 = 0x40;

pub const REGISTER_STATUS: u8 = 0x00;
pub const REGISTER_DATAH: u8 = 0x01;
pub const REGISTER_DATAL: u8 = 0x02;
pub const REGISTER_CONFIG: u8 = 0x03;

/// Start a temperature conversion
pub const CONVERSION_TEMPERATURE: u8 = 0x11;
/// Start a humidity conversion with the heater off
pub const CONVERSION_HUMIDITY: u8 = 0x01;

/// Busy flag in the status register
const STATUS_BUSY: u8 = 0x01;

/// Delay before and between status checks
pub const CHECK_DELAY_MS: u32 = 25;
/// Status checks before giving up on a conversion
pub const MAX_STATUS_CHECKS: usize = 8;

/// Value returned by the sentinel accessors on any failure
pub const ERROR_VALUE: f32 = -60.0;

/// TH02 error
#[derive(Debug, PartialEq)]
pub enum Error<E> {
    /// Register transaction failed
    Bus(E),
    /// Conversion did not complete within the poll budget
    Timeout,
}

impl<E> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::Bus(e)
    }
}

impl<E: fmt::Display> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Bus(e) => write!(f, "bus error: {}", e),
            Error::Timeout => f.write_str("conversion timed out"),
        }
    }
}

/// Physical quantity the sensor converts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    /// Degrees Celsius
    Temperature,
    /// Percent relative humidity
    Humidity,
}

impl Quantity {
    /// Config register value starting this conversion
    pub const fn command(self) -> u8 {
        match self {
            Quantity::Temperature => CONVERSION_TEMPERATURE,
            Quantity::Humidity => CONVERSION_HUMIDITY,
        }
    }

    /// Convert the 16-bit data register value
    ///
    /// Temperature uses the top 14 bits: `(raw >> 2) / 32 - 50`.
    /// Humidity uses the top 12 bits: `(raw >> 4) / 16 - 24`.
    pub fn decode(self, raw: u16) -> f32 {
        match self {
            Quantity::Temperature => f32::from(raw >> 2) / 32.0 - 50.0,
            Quantity::Humidity => f32::from(raw >> 4) / 16.0 - 24.0,
        }
    }
}

/// Decoded measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub quantity: Quantity,
    /// DATAH << 8 | DATAL
    pub raw: u16,
    pub value: f32,
}

/// Status register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status(u8);

impl Status {
    pub fn new(status: u8) -> Self {
        Status(status)
    }

    /// The device clears the busy flag once a conversion is done
    pub fn is_ready(&self) -> bool {
        self.0 & STATUS_BUSY == 0
    }

    pub fn bits(&self) -> u8 {
        self.0
    }
}

/// TH02 on a register bus
pub struct Th02<B, D> {
    bus: B,
    delay: D,
}

impl<B, D, E> Th02<B, D>
where
    B: RegisterBus<Error = E>,
    D: DelayMs<u32>,
{
    pub fn new(bus: B, delay: D) -> Self {
        Th02 { bus, delay }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Give back the bus and the delay
    pub fn destroy(self) -> (B, D) {
        (self.bus, self.delay)
    }

    /// Temperature in degrees Celsius, or [`ERROR_VALUE`]
    pub fn temperature(&mut self) -> f32 {
        self.value(Quantity::Temperature)
    }

    /// Relative humidity in percent, or [`ERROR_VALUE`]
    pub fn humidity(&mut self) -> f32 {
        self.value(Quantity::Humidity)
    }

    /// Run one full conversion of `quantity`
    pub fn measure(&mut self, quantity: Quantity) -> Result<Reading, Error<E>> {
        self.trigger(quantity)?;

        if !self.wait_until_ready() {
            warn!("TH02 {:?} conversion timed out", quantity);
            return Err(Error::Timeout);
        }

        let raw = self.read_data()?;
        let reading = Reading {
            quantity,
            raw,
            value: quantity.decode(raw),
        };
        debug!("TH02 {:?}: raw {:#06x}", quantity, raw);
        Ok(reading)
    }

    /// Start a conversion
    pub fn trigger(&mut self, quantity: Quantity) -> Result<(), Error<E>> {
        self.bus
            .write_register(SENSOR_ADDRESS, REGISTER_CONFIG, quantity.command())?;
        Ok(())
    }

    /// Read the status register
    pub fn status(&mut self) -> Result<Status, Error<E>> {
        let status = self.bus.read_register(SENSOR_ADDRESS, REGISTER_STATUS)?;
        Ok(Status::new(status))
    }

    /// Whether the last conversion completed
    ///
    /// An unreadable status register counts as busy.
    pub fn is_ready(&mut self) -> bool {
        match self.status() {
            Ok(status) => status.is_ready(),
            Err(_) => false,
        }
    }

    /// Poll the status register until the conversion completes
    ///
    /// Returns `false` after [`MAX_STATUS_CHECKS`] busy observations.
    pub fn wait_until_ready(&mut self) -> bool {
        self.delay.delay_ms(CHECK_DELAY_MS);
        for _ in 0..MAX_STATUS_CHECKS {
            if self.is_ready() {
                return true;
            }
            self.delay.delay_ms(CHECK_DELAY_MS);
        }
        false
    }

    /// Read DATAH and DATAL as one value
    pub fn read_data(&mut self) -> Result<u16, Error<E>> {
        let high = self.bus.read_register(SENSOR_ADDRESS, REGISTER_DATAH)?;
        let low = self.bus.read_register(SENSOR_ADDRESS, REGISTER_DATAL)?;
        Ok(u16::from_be_bytes([high, low]))
    }

    /// Measure `quantity`, or [`ERROR_VALUE`] if anything fails
    pub fn value(&mut self, quantity: Quantity) -> f32 {
        match self.measure(quantity) {
            Ok(reading) => reading.value,
            Err(_) => ERROR_VALUE,
        }
    }
}

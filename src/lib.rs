//! Driver for the TH02 temperature and humidity sensor over a [bit banged]
//! I2C bus.
//!
//! [bit banged]: https://en.wikipedia.org/wiki/Bit_banging
//!
//! The crate is split in layers:
//! - [`pin`]: the pin-level capability the bus is generic over
//! - [`i2c`]: start/stop framing, byte transfer and single-register
//!   transactions built on two pins and a periodic timer
//! - [`th02`]: the conversion sequence and decoding of the sensor
//! - [`command`]: the measure-and-print surface used by the `th02` binary
//!
//! ## Usage examples
//!
//! See `src/bin/th02` for a Linux sysfs GPIO setup.

#![cfg_attr(not(test), no_std)]

pub mod command;
pub mod i2c;
pub mod pin;
pub mod th02;
pub mod trace;

pub use i2c::{BusConfig, I2cBB, RegisterBus};
pub use pin::{Direction, Level, PinDriver, Pull};
pub use th02::{Quantity, Reading, Th02, ERROR_VALUE};

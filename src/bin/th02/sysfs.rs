//! `PinDriver` over Linux sysfs GPIO.
//!
//! Pins are addressed by their number on the 26-pin Raspberry Pi header
//! and translated to BCM GPIO numbers here.

use std::fmt;

use embedded_hal::digital::v2::{InputPin, OutputPin};
use linux_embedded_hal::sysfs_gpio;
use linux_embedded_hal::SysfsPin;
use log::{debug, warn};

use bitbang_th02::pin::{Direction, Level, PinDriver, Pull};

/// BCM GPIO behind a header pin, `None` for power and ground pins
pub fn bcm_for_board(pin: u8) -> Option<u64> {
    let gpio = match pin {
        3 => 2,
        5 => 3,
        7 => 4,
        8 => 14,
        10 => 15,
        11 => 17,
        12 => 18,
        13 => 27,
        15 => 22,
        16 => 23,
        18 => 24,
        19 => 10,
        21 => 9,
        22 => 25,
        23 => 11,
        24 => 8,
        26 => 7,
        _ => return None,
    };
    Some(gpio)
}

#[derive(Debug)]
pub enum Error {
    /// Header pin without a GPIO
    NotGpio(u8),
    Gpio(sysfs_gpio::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotGpio(pin) => write!(f, "header pin {} is not a GPIO", pin),
            Error::Gpio(e) => write!(f, "gpio: {}", e),
        }
    }
}

impl From<sysfs_gpio::Error> for Error {
    fn from(e: sysfs_gpio::Error) -> Self {
        Error::Gpio(e)
    }
}

/// Run `release` on every pin, even after a failure, and report the first error
fn release_each<T, E, I, F>(pins: I, mut release: F) -> Result<(), E>
where
    I: IntoIterator<Item = T>,
    F: FnMut(T) -> Result<(), E>,
{
    let mut result = Ok(());
    for pin in pins {
        if let Err(e) = release(pin) {
            if result.is_ok() {
                result = Err(e);
            }
        }
    }
    result
}

/// Header pins exported through sysfs on first use
#[derive(Default)]
pub struct SysfsPins {
    exported: Vec<(u8, SysfsPin)>,
}

impl SysfsPins {
    pub fn new() -> Self {
        SysfsPins::default()
    }

    fn pin(&mut self, pin: u8) -> Result<&mut SysfsPin, Error> {
        let index = match self.exported.iter().position(|(board, _)| *board == pin) {
            Some(index) => index,
            None => {
                let gpio = bcm_for_board(pin).ok_or(Error::NotGpio(pin))?;
                let sysfs = SysfsPin::new(gpio);
                sysfs.export()?;
                debug!("exported header pin {} as gpio{}", pin, gpio);
                self.exported.push((pin, sysfs));
                self.exported.len() - 1
            }
        };
        Ok(&mut self.exported[index].1)
    }
}

impl PinDriver for SysfsPins {
    type Error = Error;

    fn configure(
        &mut self,
        pin: u8,
        direction: Direction,
        initial: Level,
        pull: Pull,
    ) -> Result<(), Error> {
        let sysfs = self.pin(pin)?;
        match direction {
            Direction::Output => sysfs.set_direction(match initial {
                Level::High => sysfs_gpio::Direction::High,
                Level::Low => sysfs_gpio::Direction::Low,
            })?,
            Direction::Input => sysfs.set_direction(sysfs_gpio::Direction::In)?,
        }
        if pull == Pull::Up {
            warn!("sysfs cannot enable the pull-up on pin {}, wire one externally", pin);
        }
        Ok(())
    }

    fn set_level(&mut self, pin: u8, level: Level) -> Result<(), Error> {
        let sysfs = self.pin(pin)?;
        match level {
            Level::High => sysfs.set_high()?,
            Level::Low => sysfs.set_low()?,
        }
        Ok(())
    }

    fn level(&mut self, pin: u8) -> Result<Level, Error> {
        let sysfs = self.pin(pin)?;
        if sysfs.is_high()? {
            Ok(Level::High)
        } else {
            Ok(Level::Low)
        }
    }

    fn release_all(&mut self) -> Result<(), Error> {
        release_each(self.exported.drain(..), |(board, sysfs)| {
            // leave the pin as a floating input before giving it back
            sysfs
                .set_direction(sysfs_gpio::Direction::In)
                .and_then(|_| sysfs.unexport())
                .map_err(|e| {
                    warn!("failed to release header pin {}: {}", board, e);
                    Error::Gpio(e)
                })?;
            debug!("released header pin {}", board);
            Ok(())
        })
    }
}

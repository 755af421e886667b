//! Command surface: pick a quantity by name, measure it, print it.
//!
//! Kept free of `std` so it runs against any pin driver; the binary only
//! supplies the hardware and the argument.

use core::fmt;
use core::str::FromStr;

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::timer::{CountDown, Periodic};
use log::debug;

use crate::i2c::{self, BusConfig, I2cBB};
use crate::pin::PinDriver;
use crate::th02::{Quantity, Th02};

/// Printed for a missing or unknown mode
pub const USAGE: &str = "Pass 'temperature' or 'humidity' as an argument";

/// What to measure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Temperature,
    Humidity,
}

impl Mode {
    pub fn quantity(self) -> Quantity {
        match self {
            Mode::Temperature => Quantity::Temperature,
            Mode::Humidity => Quantity::Humidity,
        }
    }
}

/// Unknown mode token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownMode;

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "temperature" => Ok(Mode::Temperature),
            "humidity" => Ok(Mode::Humidity),
            _ => Err(UnknownMode),
        }
    }
}

/// Command error
#[derive(Debug, PartialEq)]
pub enum Error<E> {
    /// Bus could not be brought up or released
    Bus(i2c::Error<E>),
    /// Output could not be written
    Output,
}

impl<E> From<i2c::Error<E>> for Error<E> {
    fn from(e: i2c::Error<E>) -> Self {
        Error::Bus(e)
    }
}

impl<E> From<fmt::Error> for Error<E> {
    fn from(_: fmt::Error) -> Self {
        Error::Output
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Bus(e) => write!(f, "{}", e),
            Error::Output => f.write_str("failed to write output"),
        }
    }
}

/// Pick the mode token out of the command-line arguments
///
/// `args` excludes the program name; an argument that is not valid UTF-8
/// arrives as `None`. Only a single valid argument yields a token.
pub fn mode_arg<'a, I>(args: I) -> Option<&'a str>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut args = args.into_iter();
    match (args.next(), args.next()) {
        (Some(mode), None) => mode,
        _ => None,
    }
}

/// Run one invocation
///
/// `mode` is the single command-line argument, if exactly one was given.
/// An unknown or missing mode prints [`USAGE`] and leaves the pins
/// untouched. A failed measurement prints the sentinel value and is not
/// an error.
pub fn run<P, CLK, D, W, E>(
    mode: Option<&str>,
    pins: P,
    config: BusConfig,
    clk: CLK,
    delay: D,
    out: &mut W,
) -> Result<(), Error<E>>
where
    P: PinDriver<Error = E>,
    CLK: CountDown + Periodic,
    D: DelayMs<u32>,
    W: fmt::Write,
{
    let mode = match mode.map(str::parse::<Mode>) {
        Some(Ok(mode)) => mode,
        _ => {
            writeln!(out, "{}", USAGE)?;
            return Ok(());
        }
    };
    debug!("measuring {:?}", mode);

    let bus = I2cBB::new(pins, config, clk)?;
    let mut sensor = Th02::new(bus, delay);
    let value = sensor.value(mode.quantity());
    writeln!(out, "{}", value)?;

    let (mut bus, _) = sensor.destroy();
    bus.release()?;
    Ok(())
}

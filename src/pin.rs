//! Pin-level capability consumed by the bus driver.
//!
//! The bus never touches hardware directly. Everything it does to the two
//! lines goes through a [`PinDriver`], which makes it possible to run the
//! whole protocol against a simulated device.

/// Logic level of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    /// Level of bit `bit` in `byte`
    #[inline]
    pub fn of_bit(byte: u8, bit: u8) -> Self {
        if (byte >> bit) & 0b1 == 1 {
            Level::High
        } else {
            Level::Low
        }
    }

    #[inline]
    pub fn is_high(self) -> bool {
        self == Level::High
    }
}

/// Pin direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// Pull resistor setting of an input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    None,
    Up,
}

/// Physical pin driver
///
/// Pins are identified by their board number. Implementations own the
/// hardware for as long as the bus holds them and give it back in
/// [`release_all`](PinDriver::release_all).
pub trait PinDriver {
    type Error;

    /// Set direction, initial output level and pull mode of `pin`
    fn configure(
        &mut self,
        pin: u8,
        direction: Direction,
        initial: Level,
        pull: Pull,
    ) -> Result<(), Self::Error>;

    /// Drive an output pin
    fn set_level(&mut self, pin: u8, level: Level) -> Result<(), Self::Error>;

    /// Sample the current level of `pin`
    fn level(&mut self, pin: u8) -> Result<Level, Self::Error>;

    /// Return every pin to its neutral state
    fn release_all(&mut self) -> Result<(), Self::Error>;
}

impl<T> PinDriver for &mut T
where
    T: PinDriver + ?Sized,
{
    type Error = T::Error;

    fn configure(
        &mut self,
        pin: u8,
        direction: Direction,
        initial: Level,
        pull: Pull,
    ) -> Result<(), Self::Error> {
        (**self).configure(pin, direction, initial, pull)
    }

    fn set_level(&mut self, pin: u8, level: Level) -> Result<(), Self::Error> {
        (**self).set_level(pin, level)
    }

    fn level(&mut self, pin: u8) -> Result<Level, Self::Error> {
        (**self).level(pin)
    }

    fn release_all(&mut self) -> Result<(), Self::Error> {
        (**self).release_all()
    }
}

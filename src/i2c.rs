/*!
  # Synchronous register-level I2C master based on GPIO bitbang

  This implementation consumes the following resources:
  - A periodic timer marking the delay quantum between line transitions
  - Two pins of a [`PinDriver`] for the SDA and SCL lines.

  Only single-register transfers with 7-bit addressing are supported, and
  the master does not honour clock stretching.

  ## Hardware requirements

  1. SCL is driven push-pull; SDA is switched between output and input
     around every acknowledge slot and read.
  2. SDA needs a pull-up. If the board does not have one, build the
     [`BusConfig`] with `external_pullup(false)` and the internal pull-up
     is enabled whenever SDA is an input.
  3. Start the timer with the desired delay quantum before handing it
     over; the bus only waits on it.

  ## Example

  ```ignore
    use bitbang_th02::i2c::{BusConfig, I2cBB};
    use bitbang_th02::th02::Th02;

    // ...

    clk.start(Duration::from_micros(100));

    let i2c = I2cBB::new(pins, BusConfig::default(), clk)?;
    let mut sensor = Th02::new(i2c, delay);
    let temp = sensor.temperature();

    //...
  ```
*/

use core::fmt;

use embedded_hal::timer::{CountDown, Periodic};
use log::{debug, trace, warn};
use nb::block;

use crate::pin::{Direction, Level, PinDriver, Pull};
use crate::trace::{BusEvent, Trace};

/// Lowest legal board pin number
pub const PIN_MIN: u8 = 1;
/// Highest legal board pin number
pub const PIN_MAX: u8 = 26;
/// Highest 7-bit device address
pub const ADDRESS_MAX: u8 = 0x7F;

/// Timer ticks the start condition holds both lines high
const SETTLE_TICKS: u32 = 10;
/// Timer ticks the lines are held idle after construction
const IDLE_TICKS: u32 = 5;

/// Byte of a transaction that went unacknowledged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackPhase {
    /// Device address in write mode
    Address,
    /// Register number
    Register,
    /// Value written to the register
    Value,
    /// Device address in read mode, after the repeated start
    ReadAddress,
}

/// I2C error
#[derive(Debug, Eq, PartialEq)]
pub enum Error<E> {
    /// GPIO error
    Bus(E),
    /// No ack received
    NoAck(NackPhase),
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Bus(e) => write!(f, "pin driver error: {:?}", e),
            Error::NoAck(phase) => write!(f, "no ack for {:?} byte", phase),
        }
    }
}

/// Acknowledge bit returned by the receiver of a byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// Receiver pulled SDA low: continue
    Ack,
    /// SDA stayed high: abort
    Nack,
}

impl Ack {
    fn from_level(level: Level) -> Self {
        match level {
            Level::Low => Ack::Ack,
            Level::High => Ack::Nack,
        }
    }

    pub fn is_ack(self) -> bool {
        self == Ack::Ack
    }
}

/// Pin assignment of the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    scl: u8,
    sda: u8,
    external_pullup: bool,
}

impl BusConfig {
    /// # Panics
    ///
    /// If either pin is outside `PIN_MIN..=PIN_MAX` or both lines share a pin.
    pub fn new(scl: u8, sda: u8) -> Self {
        assert!(
            (PIN_MIN..=PIN_MAX).contains(&scl),
            "SCL pin {} out of range",
            scl
        );
        assert!(
            (PIN_MIN..=PIN_MAX).contains(&sda),
            "SDA pin {} out of range",
            sda
        );
        assert_ne!(scl, sda, "SCL and SDA must be different pins");

        BusConfig {
            scl,
            sda,
            external_pullup: true,
        }
    }

    /// Whether SDA has a physical pull-up resistor
    ///
    /// With one present the internal pull-up must stay off, it breaks the
    /// protocol on some boards.
    pub fn external_pullup(mut self, present: bool) -> Self {
        self.external_pullup = present;
        self
    }

    pub fn scl(&self) -> u8 {
        self.scl
    }

    pub fn sda(&self) -> u8 {
        self.sda
    }

    pub fn has_external_pullup(&self) -> bool {
        self.external_pullup
    }

    fn sda_input_pull(&self) -> Pull {
        if self.external_pullup {
            Pull::None
        } else {
            Pull::Up
        }
    }
}

impl Default for BusConfig {
    /// SDA on board pin 3, SCL on board pin 5, with the board's own pull-up
    fn default() -> Self {
        BusConfig::new(5, 3)
    }
}

/// Levels and SDA direction as last set by the master
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusState {
    pub scl: Level,
    pub sda: Level,
    pub sda_direction: Direction,
}

impl BusState {
    const IDLE: BusState = BusState {
        scl: Level::High,
        sda: Level::High,
        sda_direction: Direction::Output,
    };

    /// Both lines released high with SDA driven
    pub fn is_idle(&self) -> bool {
        *self == BusState::IDLE
    }
}

/// Register access over the bus
pub trait RegisterBus {
    type Error;

    /// Read one 8-bit register of the device at `address`
    fn read_register(&mut self, address: u8, register: u8) -> Result<u8, Self::Error>;

    /// Write one 8-bit register of the device at `address`
    fn write_register(&mut self, address: u8, register: u8, value: u8)
        -> Result<(), Self::Error>;
}

/// Bit banging I2C master
///
/// Owns both lines until [`release`](I2cBB::release) is called or the
/// handle is dropped.
pub struct I2cBB<P, CLK>
where
    P: PinDriver,
    CLK: CountDown + Periodic,
{
    pins: P,
    clk: CLK,
    config: BusConfig,
    state: BusState,
    trace: Trace,
    released: bool,
}

impl<P, CLK, E> I2cBB<P, CLK>
where
    P: PinDriver<Error = E>,
    CLK: CountDown + Periodic,
{
    /// Take over the pins and leave the bus idle
    pub fn new(pins: P, config: BusConfig, clk: CLK) -> Result<Self, Error<E>> {
        let mut bus = I2cBB {
            pins,
            clk,
            config,
            state: BusState::IDLE,
            trace: Trace::new(),
            released: false,
        };

        bus.scl_out()?;
        bus.sda_out()?;
        bus.set_sda_high()?;
        bus.set_scl_high()?;
        bus.wait_ticks(IDLE_TICKS);
        bus.trace.clear();

        debug!(
            "i2c bus up on scl={} sda={} (external pull-up: {})",
            config.scl, config.sda, config.external_pullup
        );
        Ok(bus)
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn state(&self) -> BusState {
        self.state
    }

    /// Events of the current or most recent register transaction
    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn pins(&self) -> &P {
        &self.pins
    }

    /// Hand the pins back to the driver
    ///
    /// Only the first call reaches the driver.
    pub fn release(&mut self) -> Result<(), Error<E>> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        debug!("releasing i2c pins");
        self.pins.release_all().map_err(Error::Bus)
    }

    /// Start condition, also used as repeated start
    pub fn start(&mut self) -> Result<(), Error<E>> {
        self.trace.push(BusEvent::Start);

        self.set_sda_high()?;
        self.set_scl_high()?;
        self.wait_ticks(SETTLE_TICKS);

        self.set_sda_low()?;
        self.set_scl_low()
    }

    /// Stop condition, leaves both lines high
    pub fn stop(&mut self) -> Result<(), Error<E>> {
        self.trace.push(BusEvent::Stop);

        self.set_scl_low()?;
        self.set_sda_low()?;
        self.set_scl_high()?;
        self.set_sda_high()
    }

    /// Shift out `byte` MSB first and sample the receiver's acknowledge
    pub fn write_byte(&mut self, byte: u8) -> Result<Ack, Error<E>> {
        self.trace.push(BusEvent::Write(byte));

        for bit in (0..8).rev() {
            self.set_sda(Level::of_bit(byte, bit))?;
            self.set_scl_high()?;
            self.set_scl_low()?;
        }

        self.sda_in()?;
        self.set_scl_high()?;
        let ack = Ack::from_level(self.sense_sda()?);
        self.set_scl_low()?;
        self.sda_out()?;

        self.trace.push(match ack {
            Ack::Ack => BusEvent::AckReceived,
            Ack::Nack => BusEvent::NackReceived,
        });
        Ok(ack)
    }

    /// Clock in one byte MSB first
    ///
    /// The acknowledge slot is left to [`send_ack`](I2cBB::send_ack) or
    /// [`send_nack`](I2cBB::send_nack).
    pub fn read_byte(&mut self) -> Result<u8, Error<E>> {
        self.trace.push(BusEvent::Read);
        let mut byte: u8 = 0;

        self.sda_in()?;
        for bit in (0..8).rev() {
            self.set_scl_high()?;
            if self.sense_sda()?.is_high() {
                byte |= 1 << bit;
            }
            self.set_scl_low()?;
        }
        self.sda_out()?;

        Ok(byte)
    }

    /// Ask the device for more data
    pub fn send_ack(&mut self) -> Result<(), Error<E>> {
        self.trace.push(BusEvent::AckSent);
        self.set_sda_low()?;
        self.set_scl_high()?;
        self.set_scl_low()
    }

    /// Tell the device no more data is wanted
    pub fn send_nack(&mut self) -> Result<(), Error<E>> {
        self.trace.push(BusEvent::NackSent);
        self.set_sda_high()?;
        self.set_scl_high()?;
        self.set_scl_low()
    }

    /// Read register `register` of the device at `address`
    ///
    /// # Panics
    ///
    /// If `address` is not a 7-bit address.
    pub fn read_register(&mut self, address: u8, register: u8) -> Result<u8, Error<E>> {
        assert!(address <= ADDRESS_MAX, "invalid i2c address {:#04x}", address);

        let value = self.transaction(address, |bus| {
            // ST
            bus.start()?;

            // SAD + W
            bus.write_acked(address << 1, NackPhase::Address)?;

            // SUB
            bus.write_acked(register, NackPhase::Register)?;

            // SR
            bus.start()?;

            // SAD + R
            bus.write_acked((address << 1) | 0x1, NackPhase::ReadAddress)?;

            let value = bus.read_byte()?;
            bus.send_nack()?;

            // SP
            bus.stop()?;
            Ok(value)
        })?;

        trace!("read {:#04x}[{:#04x}] = {:#04x}", address, register, value);
        Ok(value)
    }

    /// Write `value` into register `register` of the device at `address`
    ///
    /// # Panics
    ///
    /// If `address` is not a 7-bit address.
    pub fn write_register(&mut self, address: u8, register: u8, value: u8) -> Result<(), Error<E>> {
        assert!(address <= ADDRESS_MAX, "invalid i2c address {:#04x}", address);

        self.transaction(address, |bus| {
            // ST
            bus.start()?;

            // SAD + W
            bus.write_acked(address << 1, NackPhase::Address)?;

            // SUB
            bus.write_acked(register, NackPhase::Register)?;

            bus.write_acked(value, NackPhase::Value)?;

            // SP
            bus.stop()
        })?;

        trace!("wrote {:#04x}[{:#04x}] = {:#04x}", address, register, value);
        Ok(())
    }

    /// Run one register transaction with a fresh trace
    ///
    /// On failure the bus is stopped and the trace is logged.
    fn transaction<T, F>(&mut self, address: u8, op: F) -> Result<T, Error<E>>
    where
        F: FnOnce(&mut Self) -> Result<T, Error<E>>,
    {
        self.trace.clear();

        match op(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                // the bus must not stay mid-frame, even if the pins misbehave
                self.stop().ok();
                match &err {
                    Error::NoAck(phase) => {
                        warn!("i2c device {:#04x} sent no ack for {:?}: {}", address, phase, self.trace)
                    }
                    Error::Bus(_) => {
                        warn!("i2c pin failure talking to {:#04x}: {}", address, self.trace)
                    }
                }
                Err(err)
            }
        }
    }

    #[inline]
    fn write_acked(&mut self, byte: u8, phase: NackPhase) -> Result<(), Error<E>> {
        match self.write_byte(byte)? {
            Ack::Ack => Ok(()),
            Ack::Nack => Err(Error::NoAck(phase)),
        }
    }

    fn scl_out(&mut self) -> Result<(), Error<E>> {
        self.pins
            .configure(self.config.scl, Direction::Output, Level::High, Pull::None)
            .map_err(Error::Bus)?;
        self.state.scl = Level::High;
        Ok(())
    }

    fn sda_out(&mut self) -> Result<(), Error<E>> {
        self.sda_out_at(Level::High)
    }

    fn sda_out_at(&mut self, initial: Level) -> Result<(), Error<E>> {
        self.trace.push(BusEvent::DataOutput);
        self.pins
            .configure(self.config.sda, Direction::Output, initial, Pull::None)
            .map_err(Error::Bus)?;
        self.state.sda = initial;
        self.state.sda_direction = Direction::Output;
        Ok(())
    }

    fn sda_in(&mut self) -> Result<(), Error<E>> {
        self.set_sda_low()?;

        self.trace.push(BusEvent::DataInput);
        self.pins
            .configure(
                self.config.sda,
                Direction::Input,
                Level::Low,
                self.config.sda_input_pull(),
            )
            .map_err(Error::Bus)?;
        self.state.sda_direction = Direction::Input;
        Ok(())
    }

    #[inline]
    fn sense_sda(&mut self) -> Result<Level, Error<E>> {
        let level = self.pins.level(self.config.sda).map_err(Error::Bus)?;
        self.trace.push(BusEvent::Sampled(level));
        Ok(level)
    }

    fn set_sda(&mut self, level: Level) -> Result<(), Error<E>> {
        if self.state.sda_direction != Direction::Output {
            self.sda_out_at(level)?;
        }
        self.pins
            .set_level(self.config.sda, level)
            .map_err(Error::Bus)?;
        self.state.sda = level;
        self.trace.push(match level {
            Level::High => BusEvent::DataHigh,
            Level::Low => BusEvent::DataLow,
        });
        self.wait_for_clk();
        Ok(())
    }

    fn set_scl(&mut self, level: Level) -> Result<(), Error<E>> {
        self.pins
            .set_level(self.config.scl, level)
            .map_err(Error::Bus)?;
        self.state.scl = level;
        self.trace.push(match level {
            Level::High => BusEvent::ClockHigh,
            Level::Low => BusEvent::ClockLow,
        });
        self.wait_for_clk();
        Ok(())
    }

    #[inline]
    fn set_scl_high(&mut self) -> Result<(), Error<E>> {
        self.set_scl(Level::High)
    }

    #[inline]
    fn set_scl_low(&mut self) -> Result<(), Error<E>> {
        self.set_scl(Level::Low)
    }

    #[inline]
    fn set_sda_high(&mut self) -> Result<(), Error<E>> {
        self.set_sda(Level::High)
    }

    #[inline]
    fn set_sda_low(&mut self) -> Result<(), Error<E>> {
        self.set_sda(Level::Low)
    }

    #[inline]
    fn wait_for_clk(&mut self) {
        block!(self.clk.wait()).ok();
    }

    fn wait_ticks(&mut self, ticks: u32) {
        for _ in 0..ticks {
            self.wait_for_clk();
        }
    }
}

impl<P, CLK, E> RegisterBus for I2cBB<P, CLK>
where
    P: PinDriver<Error = E>,
    CLK: CountDown + Periodic,
{
    type Error = Error<E>;

    fn read_register(&mut self, address: u8, register: u8) -> Result<u8, Self::Error> {
        I2cBB::read_register(self, address, register)
    }

    fn write_register(&mut self, address: u8, register: u8, value: u8) -> Result<(), Self::Error> {
        I2cBB::write_register(self, address, register, value)
    }
}

impl<P, CLK> Drop for I2cBB<P, CLK>
where
    P: PinDriver,
    CLK: CountDown + Periodic,
{
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            self.pins.release_all().ok();
        }
    }
}

//! Pin-level I2C slave for driving the bus without hardware.
//!
//! The simulator watches the two lines the master drives, decodes start
//! and stop conditions, clocked bytes and acknowledge slots from the edges,
//! and answers from a register model.

#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;

use bitbang_th02::pin::{Direction, Level, PinDriver, Pull};
use bitbang_th02::th02;
use embedded_hal::timer::{CountDown, Periodic};
use void::Void;

pub const SCL: u8 = 5;
pub const SDA: u8 = 3;

/// Register file of the simulated device
pub trait Registers {
    fn write(&mut self, register: u8, value: u8);
    fn read(&mut self, register: u8) -> u8;
}

/// Plain memory, every register stores what was written
pub struct Memory(pub [u8; 256]);

impl Default for Memory {
    fn default() -> Self {
        Memory([0; 256])
    }
}

impl Registers for Memory {
    fn write(&mut self, register: u8, value: u8) {
        self.0[register as usize] = value;
    }

    fn read(&mut self, register: u8) -> u8 {
        self.0[register as usize]
    }
}

/// TH02 register model
pub struct Th02Model {
    pub temperature_raw: u16,
    pub humidity_raw: u16,
    /// Status reads reporting busy after each trigger, `None` for never ready
    pub busy_reads: Option<u32>,
    pub status_reads: u32,
    pub config_writes: Vec<u8>,
    busy_left: u32,
    data: u16,
}

impl Th02Model {
    pub fn new(temperature_raw: u16, humidity_raw: u16) -> Self {
        Th02Model {
            temperature_raw,
            humidity_raw,
            busy_reads: Some(0),
            status_reads: 0,
            config_writes: Vec::new(),
            busy_left: 0,
            data: 0,
        }
    }
}

impl Registers for Th02Model {
    fn write(&mut self, register: u8, value: u8) {
        if register != th02::REGISTER_CONFIG {
            return;
        }
        self.config_writes.push(value);
        if value & 0x01 != 0 {
            self.busy_left = self.busy_reads.unwrap_or(0);
            self.data = if value & 0x10 != 0 {
                self.temperature_raw
            } else {
                self.humidity_raw
            };
        }
    }

    fn read(&mut self, register: u8) -> u8 {
        match register {
            th02::REGISTER_STATUS => {
                self.status_reads += 1;
                if self.busy_reads.is_none() {
                    return 0x01;
                }
                if self.busy_left > 0 {
                    self.busy_left -= 1;
                    0x01
                } else {
                    0x00
                }
            }
            th02::REGISTER_DATAH => (self.data >> 8) as u8,
            th02::REGISTER_DATAL => (self.data & 0xFF) as u8,
            th02::REGISTER_CONFIG => self.config_writes.last().copied().unwrap_or(0),
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Call {
    Configure(u8, Direction, Level, Pull),
    Set(u8, Level),
    Get(u8),
    ReleaseAll,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinSetup {
    pub direction: Direction,
    pub pull: Pull,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Expect {
    Address,
    Register,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    /// Waiting for a start condition
    Idle,
    /// Not addressed, waiting for the next start or stop
    Ignore,
    /// Shifting in a byte from the master
    Receive { bits: u8, byte: u8 },
    /// Holding SDA low through the acknowledge clock
    AckOut { transmit: bool },
    /// Shifting out a byte to the master
    Transmit { bits: u8, byte: u8 },
    /// Master acknowledge clock, `acked` sampled on the rising edge
    AckIn { acked: bool },
}

/// Two simulated lines with one slave attached
pub struct SimBus<R> {
    pub registers: R,
    pub address: u8,
    pub calls: Vec<Call>,
    pub starts: u32,
    pub stops: u32,
    /// Physical pull-up on SDA
    pub external_pullup: bool,
    scl: Option<PinSetup>,
    sda: Option<PinSetup>,
    scl_out: Level,
    sda_out: Level,
    slave_low: bool,
    last_scl: Level,
    last_sda: Level,
    phase: Phase,
    expect: Expect,
    pointer: u8,
}

impl<R: Registers> SimBus<R> {
    pub fn new(address: u8, registers: R) -> Self {
        SimBus {
            registers,
            address,
            calls: Vec::new(),
            starts: 0,
            stops: 0,
            external_pullup: true,
            scl: None,
            sda: None,
            scl_out: Level::High,
            sda_out: Level::High,
            slave_low: false,
            last_scl: Level::High,
            last_sda: Level::High,
            phase: Phase::Idle,
            expect: Expect::Address,
            pointer: 0,
        }
    }

    pub fn setup(&self, pin: u8) -> Option<PinSetup> {
        match pin {
            SCL => self.scl,
            SDA => self.sda,
            _ => None,
        }
    }

    /// Both lines high
    pub fn is_idle(&self) -> bool {
        self.scl_line() == Level::High && self.sda_line() == Level::High
    }

    /// The slave is between transfers
    pub fn is_stopped(&self) -> bool {
        self.phase == Phase::Idle
    }

    pub fn scl_line(&self) -> Level {
        match self.scl {
            Some(PinSetup {
                direction: Direction::Output,
                ..
            }) => self.scl_out,
            _ => Level::High,
        }
    }

    pub fn sda_line(&self) -> Level {
        if self.slave_low {
            return Level::Low;
        }
        match self.sda {
            Some(PinSetup {
                direction: Direction::Output,
                ..
            }) => self.sda_out,
            Some(PinSetup { pull: Pull::Up, .. }) => Level::High,
            _ if self.external_pullup => Level::High,
            _ => Level::Low,
        }
    }

    fn settle(&mut self) {
        let scl = self.scl_line();
        let sda = self.sda_line();

        if scl != self.last_scl {
            self.last_scl = scl;
            match scl {
                Level::High => self.clock_rising(sda),
                Level::Low => self.clock_falling(),
            }
        } else if scl == Level::High && sda != self.last_sda {
            match sda {
                Level::Low => self.start_condition(),
                Level::High => self.stop_condition(),
            }
        }
        self.last_sda = self.sda_line();
    }

    fn start_condition(&mut self) {
        self.starts += 1;
        self.slave_low = false;
        self.phase = Phase::Receive { bits: 0, byte: 0 };
        self.expect = Expect::Address;
    }

    fn stop_condition(&mut self) {
        self.stops += 1;
        self.slave_low = false;
        self.phase = Phase::Idle;
    }

    fn clock_rising(&mut self, sda: Level) {
        match self.phase {
            Phase::Receive { bits, byte } => {
                let bit = if sda.is_high() { 1 } else { 0 };
                self.phase = Phase::Receive {
                    bits: bits + 1,
                    byte: (byte << 1) | bit,
                };
            }
            Phase::AckIn { .. } => {
                self.phase = Phase::AckIn {
                    acked: sda == Level::Low,
                };
            }
            _ => {}
        }
    }

    fn clock_falling(&mut self) {
        match self.phase {
            Phase::Receive { bits: 8, byte } => self.received(byte),
            Phase::AckOut { transmit } => {
                self.slave_low = false;
                if transmit {
                    self.load_next();
                } else {
                    self.phase = Phase::Receive { bits: 0, byte: 0 };
                }
            }
            Phase::Transmit { bits, byte } => {
                let bits = bits + 1;
                if bits == 8 {
                    self.slave_low = false;
                    self.phase = Phase::AckIn { acked: false };
                } else {
                    self.slave_low = !Level::of_bit(byte, 7 - bits).is_high();
                    self.phase = Phase::Transmit { bits, byte };
                }
            }
            Phase::AckIn { acked } => {
                if acked {
                    self.load_next();
                } else {
                    self.phase = Phase::Ignore;
                }
            }
            _ => {}
        }
    }

    fn received(&mut self, byte: u8) {
        match self.expect {
            Expect::Address => {
                if byte >> 1 != self.address {
                    self.phase = Phase::Ignore;
                    return;
                }
                let read = byte & 0x01 == 1;
                self.expect = Expect::Register;
                self.acknowledge(read);
            }
            Expect::Register => {
                self.pointer = byte;
                self.expect = Expect::Data;
                self.acknowledge(false);
            }
            Expect::Data => {
                self.registers.write(self.pointer, byte);
                self.pointer = self.pointer.wrapping_add(1);
                self.acknowledge(false);
            }
        }
    }

    fn acknowledge(&mut self, transmit: bool) {
        self.slave_low = true;
        self.phase = Phase::AckOut { transmit };
    }

    fn load_next(&mut self) {
        let byte = self.registers.read(self.pointer);
        self.pointer = self.pointer.wrapping_add(1);
        self.slave_low = !Level::of_bit(byte, 7).is_high();
        self.phase = Phase::Transmit { bits: 0, byte };
    }
}

impl<R: Registers> PinDriver for SimBus<R> {
    type Error = ();

    fn configure(
        &mut self,
        pin: u8,
        direction: Direction,
        initial: Level,
        pull: Pull,
    ) -> Result<(), ()> {
        self.calls.push(Call::Configure(pin, direction, initial, pull));
        let setup = Some(PinSetup { direction, pull });
        match pin {
            SCL => {
                self.scl = setup;
                self.scl_out = initial;
            }
            SDA => {
                self.sda = setup;
                self.sda_out = initial;
            }
            _ => return Err(()),
        }
        self.settle();
        Ok(())
    }

    fn set_level(&mut self, pin: u8, level: Level) -> Result<(), ()> {
        self.calls.push(Call::Set(pin, level));
        match pin {
            SCL => self.scl_out = level,
            SDA => self.sda_out = level,
            _ => return Err(()),
        }
        self.settle();
        Ok(())
    }

    fn level(&mut self, pin: u8) -> Result<Level, ()> {
        self.calls.push(Call::Get(pin));
        match pin {
            SCL => Ok(self.scl_line()),
            SDA => Ok(self.sda_line()),
            _ => Err(()),
        }
    }

    fn release_all(&mut self) -> Result<(), ()> {
        self.calls.push(Call::ReleaseAll);
        self.scl = None;
        self.sda = None;
        self.settle();
        Ok(())
    }
}

/// Pins that only count calls
#[derive(Default)]
pub struct NoopPins {
    pub calls: usize,
}

impl PinDriver for NoopPins {
    type Error = ();

    fn configure(&mut self, _: u8, _: Direction, _: Level, _: Pull) -> Result<(), ()> {
        self.calls += 1;
        Ok(())
    }

    fn set_level(&mut self, _: u8, _: Level) -> Result<(), ()> {
        self.calls += 1;
        Ok(())
    }

    fn level(&mut self, _: u8) -> Result<Level, ()> {
        self.calls += 1;
        Ok(Level::High)
    }

    fn release_all(&mut self) -> Result<(), ()> {
        self.calls += 1;
        Ok(())
    }
}

/// Periodic timer that never blocks and counts its ticks
#[derive(Default, Clone)]
pub struct Ticks(pub Rc<Cell<u64>>);

impl CountDown for Ticks {
    type Time = ();

    fn start<T>(&mut self, _count: T)
    where
        T: Into<()>,
    {
    }

    fn wait(&mut self) -> nb::Result<(), Void> {
        self.0.set(self.0.get() + 1);
        Ok(())
    }
}

impl Periodic for Ticks {}

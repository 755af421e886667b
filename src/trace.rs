//! Diagnostic record of the line activity of one register transaction.

use core::fmt;

use crate::pin::Level;

/// Maximum number of events kept per transaction
///
/// A single register read takes a bit under 150 events.
pub const TRACE_CAPACITY: usize = 256;

/// One low-level bus action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    /// Start (or repeated start) condition begins
    Start,
    /// Stop condition begins
    Stop,
    /// Byte about to be shifted out
    Write(u8),
    /// Byte about to be shifted in
    Read,
    DataHigh,
    DataLow,
    ClockHigh,
    ClockLow,
    /// Data line switched to input
    DataInput,
    /// Data line switched to output
    DataOutput,
    /// Bit sampled from the data line
    Sampled(Level),
    /// Receiver acknowledged a written byte
    AckReceived,
    /// Receiver did not acknowledge a written byte
    NackReceived,
    /// Master acknowledged a read byte
    AckSent,
    /// Master signalled the end of a read
    NackSent,
}

impl fmt::Display for BusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusEvent::Start => f.write_str("[START]"),
            BusEvent::Stop => f.write_str("[STOP]"),
            BusEvent::Write(byte) => write!(f, "[W:{:#04x}]", byte),
            BusEvent::Read => f.write_str("[R]"),
            BusEvent::DataHigh => f.write_str("D"),
            BusEvent::DataLow => f.write_str("d"),
            BusEvent::ClockHigh => f.write_str("C"),
            BusEvent::ClockLow => f.write_str("c"),
            BusEvent::DataInput => f.write_str("[D_IN]"),
            BusEvent::DataOutput => f.write_str("[D_OUT]"),
            BusEvent::Sampled(Level::High) => f.write_str("1"),
            BusEvent::Sampled(Level::Low) => f.write_str("0"),
            BusEvent::AckReceived => f.write_str("[ACK]"),
            BusEvent::NackReceived => f.write_str("[NACK]"),
            BusEvent::AckSent => f.write_str("[M_ACK]"),
            BusEvent::NackSent => f.write_str("[M_NACK]"),
        }
    }
}

/// Ordered events since the last reset
///
/// Once full, further events are dropped and the trace is marked as
/// truncated.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    events: heapless::Vec<BusEvent, TRACE_CAPACITY>,
    truncated: bool,
}

impl Trace {
    pub fn new() -> Self {
        Trace::default()
    }

    #[inline]
    pub fn push(&mut self, event: BusEvent) {
        if self.events.push(event).is_err() {
            self.truncated = true;
        }
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.truncated = false;
    }

    pub fn events(&self) -> &[BusEvent] {
        &self.events
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for event in self.events.iter() {
            write!(f, "{}", event)?;
        }
        if self.truncated {
            f.write_str("...")?;
        }
        Ok(())
    }
}

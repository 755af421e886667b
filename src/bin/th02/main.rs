//! Print one TH02 reading.
//!
//! ```sh
//! th02 temperature
//! th02 humidity
//! ```
//!
//! Set `RUST_LOG=debug` to see bus activity on stderr.

mod sysfs;

use std::ffi::OsString;
use std::process;
use std::time::Duration;

use embedded_hal::timer::CountDown;
use linux_embedded_hal::{Delay, SysTimer};
use log::error;

use bitbang_th02::command;
use bitbang_th02::i2c;
use bitbang_th02::BusConfig;

use crate::sysfs::SysfsPins;

/// Base delay between line transitions
const QUANTUM: Duration = Duration::from_micros(100);

fn main() {
    env_logger::init();

    let args: Vec<OsString> = std::env::args_os().skip(1).collect();
    let mode = command::mode_arg(args.iter().map(|arg| arg.to_str()));

    let mut clk = SysTimer::new();
    clk.start(QUANTUM);

    let mut out = String::new();
    let result = command::run(
        mode,
        SysfsPins::new(),
        BusConfig::default(),
        clk,
        Delay,
        &mut out,
    );
    print!("{}", out);

    match result {
        Ok(()) => {}
        Err(command::Error::Bus(i2c::Error::Bus(e))) => {
            error!("{}", e);
            process::exit(1);
        }
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    }
}

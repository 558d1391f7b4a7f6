// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Bus address assignment through the sensor's XSHUT pin.
//!
//! Several VL53L0X sensors share the same factory address. Each sensor's
//! XSHUT line is wired to a GPIO so it can be held in reset while the others
//! are addressed, then released and opened at its own address.

use embedded_hal::{
    delay::DelayNs,
    digital::{self, ErrorKind, ErrorType, OutputPin},
};
use std::{fs, io, path::PathBuf, thread, time::Duration};
use tracing::{debug, info};

/// Time the sensor is held in reset and given to boot, in milliseconds.
pub const RESET_HOLD_MS: u32 = 500;

/// Run the XSHUT reset sequence: low, wait, high, wait.
///
/// On return the sensor has booted and is ready to be configured at its new
/// address.
pub fn assign_address<P, D>(xshut: &mut P, delay: &mut D) -> Result<(), P::Error>
where
    P: OutputPin,
    D: DelayNs,
{
    xshut.set_low()?;
    delay.delay_ms(RESET_HOLD_MS);
    xshut.set_high()?;
    delay.delay_ms(RESET_HOLD_MS);
    Ok(())
}

/// [`DelayNs`] backed by `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(ns.into()));
    }
}

/// Error from the sysfs GPIO interface.
#[derive(Debug)]
pub struct GpioError(pub io::Error);

impl digital::Error for GpioError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

impl From<GpioError> for io::Error {
    fn from(err: GpioError) -> Self {
        err.0
    }
}

/// Output GPIO driven through the Linux `/sys/class/gpio` interface.
#[derive(Debug)]
pub struct SysfsPin {
    value: PathBuf,
}

impl SysfsPin {
    const ROOT: &'static str = "/sys/class/gpio";

    /// Export the pin (if needed) and configure it as an output.
    pub fn export(gpio: u32) -> Result<Self, io::Error> {
        let dir = PathBuf::from(format!("{}/gpio{}", Self::ROOT, gpio));
        if !dir.exists() {
            debug!("exporting gpio {}", gpio);
            fs::write(format!("{}/export", Self::ROOT), gpio.to_string())?;
        }
        fs::write(dir.join("direction"), "out")?;
        info!("xshut on gpio {}", gpio);

        Ok(Self {
            value: dir.join("value"),
        })
    }

    fn write(&mut self, level: &str) -> Result<(), GpioError> {
        fs::write(&self.value, level).map_err(GpioError)
    }
}

impl ErrorType for SysfsPin {
    type Error = GpioError;
}

impl OutputPin for SysfsPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write("0")
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write("1")
    }
}

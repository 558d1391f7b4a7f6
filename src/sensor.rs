// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Configured sensor session.

use tracing::{debug, info};

use crate::{
    driver::{DEFAULT_ADDRESS, MAX_ADDRESS, RangingDriver, RangingMode},
    error::Error,
};

/// A driver whose session has been opened at a known bus address.
///
/// The only way to obtain a `SensorHandle` is [`SensorHandle::configure`], so
/// every start, stop and read is preceded by exactly one successful
/// configuration.
#[derive(Debug)]
pub struct SensorHandle<D> {
    driver: D,
    address: u8,
}

impl<D: RangingDriver> SensorHandle<D> {
    /// Open the driver session.
    ///
    /// Without an explicit address the factory default `0x29` is used. With
    /// one, the caller must already have run the reset sequence from
    /// [`crate::reset::assign_address`].
    pub fn configure(mut driver: D, address: Option<u8>) -> Result<Self, Error> {
        let address = address.unwrap_or(DEFAULT_ADDRESS);
        if address > MAX_ADDRESS {
            return Err(Error::DeviceInit {
                address,
                source: format!("address exceeds 7-bit range (max {:#04x})", MAX_ADDRESS)
                    .into(),
            });
        }

        driver
            .configure(address)
            .map_err(|e| Error::DeviceInit {
                address,
                source: e.into(),
            })?;

        info!("sensor configured at address {:#04x}", address);
        Ok(Self { driver, address })
    }

    /// Bus address of this session.
    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn start_ranging(&mut self, mode: RangingMode) -> Result<(), Error> {
        debug!("starting ranging in {} mode", mode);
        self.driver
            .start_ranging(mode)
            .map_err(|e| Error::device_io("start", e))
    }

    /// Not idempotent: only call while ranging.
    pub fn stop_ranging(&mut self) -> Result<(), Error> {
        debug!("stopping ranging");
        self.driver
            .stop_ranging()
            .map_err(|e| Error::device_io("stop", e))
    }

    pub fn timing_micros(&mut self) -> Result<u32, Error> {
        self.driver
            .timing_micros()
            .map_err(|e| Error::device_io("timing", e))
    }

    /// Latest distance, sentinel values included.
    pub fn distance_mm(&mut self) -> Result<u16, Error> {
        self.driver
            .distance_mm()
            .map_err(|e| Error::MissedSample(e.into()))
    }

    /// Access the underlying driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Driver abstraction for time-of-flight range sensors.
//!
//! The register protocol of a particular sensor lives behind
//! [`RangingDriver`]. The rest of the crate only needs the five operations
//! below, so any VL53L0X-class driver can be plugged in, as can the
//! [`crate::simulated::SimulatedDriver`] used for bench testing.

use clap::ValueEnum;
use std::fmt;

use crate::error::Error;

/// Factory-default 7-bit bus address of the VL53L0X.
pub const DEFAULT_ADDRESS: u8 = 0x29;

/// Highest legal 7-bit bus address.
pub const MAX_ADDRESS: u8 = 0x7F;

/// Ranging accuracy profile.
///
/// The discriminants match the mode constants carried by start requests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, ValueEnum)]
#[repr(u8)]
pub enum RangingMode {
    /// Default timing budget (~30 ms).
    GoodAccuracy = 0,
    /// Longer timing budget (~66 ms).
    #[default]
    BetterAccuracy = 1,
    /// Longest timing budget (~200 ms).
    BestAccuracy = 2,
    /// Reduced signal limits for targets beyond 1.2 m.
    LongRange = 3,
    /// Shortest timing budget (~20 ms).
    HighSpeed = 4,
}

impl TryFrom<u8> for RangingMode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RangingMode::GoodAccuracy),
            1 => Ok(RangingMode::BetterAccuracy),
            2 => Ok(RangingMode::BestAccuracy),
            3 => Ok(RangingMode::LongRange),
            4 => Ok(RangingMode::HighSpeed),
            other => Err(Error::InvalidMode(other)),
        }
    }
}

impl From<RangingMode> for u8 {
    fn from(mode: RangingMode) -> Self {
        mode as u8
    }
}

impl fmt::Display for RangingMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RangingMode::GoodAccuracy => write!(f, "good-accuracy"),
            RangingMode::BetterAccuracy => write!(f, "better-accuracy"),
            RangingMode::BestAccuracy => write!(f, "best-accuracy"),
            RangingMode::LongRange => write!(f, "long-range"),
            RangingMode::HighSpeed => write!(f, "high-speed"),
        }
    }
}

/// Low-level sensor capability.
///
/// Implementations perform blocking bus transactions. Callers guarantee that
/// [`RangingDriver::configure`] succeeds exactly once before any other call
/// and that calls never overlap.
pub trait RangingDriver: Send + 'static {
    /// Driver specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open the driver session at the given 7-bit bus address.
    fn configure(&mut self, address: u8) -> Result<(), Self::Error>;

    /// Start continuous ranging in the given mode.
    fn start_ranging(&mut self, mode: RangingMode) -> Result<(), Self::Error>;

    /// Stop continuous ranging.
    fn stop_ranging(&mut self) -> Result<(), Self::Error>;

    /// Current inter-measurement timing budget in microseconds.
    fn timing_micros(&mut self) -> Result<u32, Self::Error>;

    /// Latest measured distance in millimeters.
    ///
    /// Out-of-range targets are reported with the device's sentinel value
    /// rather than an error.
    fn distance_mm(&mut self) -> Result<u16, Self::Error>;
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Error type shared by the sensor handle, the ranging controller and the
//! service layer.

use thiserror::Error;

/// Boxed error returned by driver implementations.
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while configuring the sensor or controlling ranging.
///
/// Startup errors ([`Error::Configuration`], [`Error::DeviceInit`]) abort
/// initialization. Everything else is reported back to the caller of the
/// control operation and leaves the controller in its pre-call state.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or incomplete startup configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The driver session could not be opened at the given address.
    #[error("failed to initialize sensor at address {address:#04x}: {source}")]
    DeviceInit {
        /// Bus address the session was opened against.
        address: u8,
        /// Underlying driver error.
        #[source]
        source: DriverError,
    },

    /// A device call failed after initialization.
    #[error("sensor {op} failed: {source}")]
    DeviceIo {
        /// Name of the device operation.
        op: &'static str,
        /// Underlying driver error.
        #[source]
        source: DriverError,
    },

    /// A single periodic read failed.
    #[error("missed sample: {0}")]
    MissedSample(#[source] DriverError),

    /// `start` was requested while ranging.
    #[error("Already Ranging")]
    AlreadyRanging,

    /// `stop` was requested while stopped.
    #[error("Not Ranging")]
    NotRanging,

    /// A start request carried an unknown mode value.
    #[error("Invalid ranging mode {0}")]
    InvalidMode(u8),

    /// Service message encoding or decoding failed.
    #[error("CDR error: {0}")]
    Cdr(#[from] cdr::Error),

    /// I/O error (GPIO, thread spawn).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a device I/O error for the named operation.
    pub fn device_io(op: &'static str, source: impl Into<DriverError>) -> Self {
        Self::DeviceIo {
            op,
            source: source.into(),
        }
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! EdgeFirst Time-of-Flight Publisher Library
//!
//! This library exposes a single time-of-flight distance sensor as a
//! controllable ranging service.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌───────────────┐     ┌─────────────────────┐
//! │  RangingDriver  │ ──► │  SensorHandle │ ──► │  RangingController  │
//! │ (VL53L0X / sim) │     │  (configured) │     │  (lock + sampler)   │
//! └─────────────────┘     └───────────────┘     └─────────────────────┘
//!                                                          │
//!                                                          ▼
//!                                               ┌─────────────────────┐
//!                                               │  SamplePublisher    │
//!                                               │  (RangeSample)      │
//!                                               └─────────────────────┘
//! ```
//!
//! 1. Optionally re-address the sensor with [`reset::assign_address`]
//! 2. Open the session: `SensorHandle::configure(driver, address)`
//! 3. Wrap it: `RangingController::new(sensor, settings, publisher)`
//! 4. `start(mode)` arms a sampler at the device's own timing budget
//!    (never faster than 20 ms); `stop()` halts it and waits for it
//!
//! # Modules
//!
//! - [`driver`]: Driver trait and ranging modes
//! - [`sensor`]: Configured sensor session
//! - [`controller`]: Ranging lifecycle state machine and periodic sampler
//! - [`sample`]: Range samples and the publish boundary
//! - [`messages`]: CDR control service messages
//! - [`reset`]: XSHUT address assignment
//! - [`simulated`]: Simulated sensor for bench testing
//!
//! # Example
//!
//! ```ignore
//! use edgefirst_tofpub::{
//!     RangeSettings, RangingController, RangingMode, SensorHandle,
//!     simulated::SimulatedDriver,
//! };
//!
//! let (tx, rx) = kanal::bounded(16);
//! let sensor = SensorHandle::configure(SimulatedDriver::new(), None)?;
//! let controller = RangingController::new(sensor, RangeSettings::default(), tx);
//!
//! controller.start(RangingMode::BetterAccuracy)?;
//! let sample = rx.recv()?;
//! println!("{} m", sample.range);
//! controller.stop()?;
//! ```

pub mod controller;
pub mod driver;
pub mod error;
pub mod messages;
pub mod reset;
pub mod sample;
pub mod sensor;
pub mod simulated;

// Re-exports for convenience
pub use controller::{MIN_SAMPLING_PERIOD_US, RangingController, sampling_period};
pub use driver::{DEFAULT_ADDRESS, RangingDriver, RangingMode};
pub use error::Error;
pub use messages::{RangingResponse, StartRangingRequest};
pub use sample::{RangeSample, RangeSettings, SamplePublisher};
pub use sensor::SensorHandle;

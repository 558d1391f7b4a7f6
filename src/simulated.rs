// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Simulated time-of-flight sensor.
//!
//! Provides a [`RangingDriver`] for bench testing and unit tests without
//! hardware. The driver is a cheap handle over shared state, so a test can
//! keep a clone to inject faults and inspect call counts while the
//! controller owns another.
//!
//! Every call marks the device busy for its duration. A call arriving while
//! another is in flight is counted as a reentrancy violation, which tests
//! use to prove that device access is serialized.

use std::{
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};
use thiserror::Error;

use crate::driver::{RangingDriver, RangingMode};

/// Errors reported by the simulated device.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimulatedError {
    /// No device answered at the requested address.
    #[error("no device at address {0:#04x}")]
    Absent(u8),
    /// Injected or protocol bus failure.
    #[error("bus error during {0}")]
    Bus(&'static str),
}

#[derive(Debug, Default)]
struct State {
    address: Mutex<Option<u8>>,
    mode: Mutex<Option<RangingMode>>,
    timing_us: AtomicU32,
    distance_mm: AtomicU32,
    call_delay: Mutex<Duration>,
    read_delay: Mutex<Duration>,

    fail_configure: AtomicBool,
    fail_start: AtomicBool,
    fail_stop: AtomicBool,
    fail_timing: AtomicBool,
    fail_read: AtomicBool,

    busy: AtomicBool,
    violations: AtomicUsize,
    starts: AtomicUsize,
    stops: AtomicUsize,
    reads: AtomicUsize,
}

/// Simulated VL53L0X-class sensor.
#[derive(Debug, Clone)]
pub struct SimulatedDriver {
    state: Arc<State>,
}

impl Default for SimulatedDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedDriver {
    /// Timing budget reported by default, in microseconds.
    pub const DEFAULT_TIMING_US: u32 = 33_000;
    /// Distance reported by default, in millimeters.
    pub const DEFAULT_DISTANCE_MM: u16 = 500;

    pub fn new() -> Self {
        let state = State::default();
        state
            .timing_us
            .store(Self::DEFAULT_TIMING_US, Ordering::SeqCst);
        state
            .distance_mm
            .store(Self::DEFAULT_DISTANCE_MM.into(), Ordering::SeqCst);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn with_timing_us(self, timing_us: u32) -> Self {
        self.set_timing_us(timing_us);
        self
    }

    pub fn with_distance_mm(self, distance_mm: u16) -> Self {
        self.set_distance_mm(distance_mm);
        self
    }

    pub fn set_timing_us(&self, timing_us: u32) {
        self.state.timing_us.store(timing_us, Ordering::SeqCst);
    }

    pub fn set_distance_mm(&self, distance_mm: u16) {
        self.state
            .distance_mm
            .store(distance_mm.into(), Ordering::SeqCst);
    }

    /// Time every device call holds the bus.
    pub fn set_call_delay(&self, delay: Duration) {
        *self
            .state
            .call_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = delay;
    }

    /// Extra time a distance read holds the bus.
    pub fn set_read_delay(&self, delay: Duration) {
        *self
            .state
            .read_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = delay;
    }

    pub fn fail_configure(&self, fail: bool) {
        self.state.fail_configure.store(fail, Ordering::SeqCst);
    }

    pub fn fail_start(&self, fail: bool) {
        self.state.fail_start.store(fail, Ordering::SeqCst);
    }

    pub fn fail_stop(&self, fail: bool) {
        self.state.fail_stop.store(fail, Ordering::SeqCst);
    }

    pub fn fail_timing(&self, fail: bool) {
        self.state.fail_timing.store(fail, Ordering::SeqCst);
    }

    pub fn fail_read(&self, fail: bool) {
        self.state.fail_read.store(fail, Ordering::SeqCst);
    }

    pub fn configured_address(&self) -> Option<u8> {
        *self
            .state
            .address
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Mode the device is ranging in, `None` when idle.
    pub fn active_mode(&self) -> Option<RangingMode> {
        *self
            .state
            .mode
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_ranging(&self) -> bool {
        self.active_mode().is_some()
    }

    /// Number of overlapping calls and reads issued while idle.
    pub fn violations(&self) -> usize {
        self.state.violations.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> usize {
        self.state.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.state.stops.load(Ordering::SeqCst)
    }

    /// Number of distance reads started, failed ones included.
    pub fn reads(&self) -> usize {
        self.state.reads.load(Ordering::SeqCst)
    }

    fn call<T>(
        &self,
        extra: Duration,
        f: impl FnOnce(&State) -> Result<T, SimulatedError>,
    ) -> Result<T, SimulatedError> {
        if self.state.busy.swap(true, Ordering::SeqCst) {
            self.state.violations.fetch_add(1, Ordering::SeqCst);
        }

        let delay = *self
            .state
            .call_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            + extra;
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let result = f(&self.state);
        self.state.busy.store(false, Ordering::SeqCst);
        result
    }

    fn set_mode(state: &State, mode: Option<RangingMode>) {
        *state.mode.lock().unwrap_or_else(PoisonError::into_inner) = mode;
    }
}

impl RangingDriver for SimulatedDriver {
    type Error = SimulatedError;

    fn configure(&mut self, address: u8) -> Result<(), Self::Error> {
        self.call(Duration::ZERO, |state| {
            if state.fail_configure.load(Ordering::SeqCst) {
                return Err(SimulatedError::Absent(address));
            }
            *state.address.lock().unwrap_or_else(PoisonError::into_inner) = Some(address);
            Ok(())
        })
    }

    fn start_ranging(&mut self, mode: RangingMode) -> Result<(), Self::Error> {
        self.call(Duration::ZERO, |state| {
            if state.fail_start.load(Ordering::SeqCst) {
                return Err(SimulatedError::Bus("start"));
            }
            state.starts.fetch_add(1, Ordering::SeqCst);
            Self::set_mode(state, Some(mode));
            Ok(())
        })
    }

    fn stop_ranging(&mut self) -> Result<(), Self::Error> {
        self.call(Duration::ZERO, |state| {
            if state.fail_stop.load(Ordering::SeqCst) {
                return Err(SimulatedError::Bus("stop"));
            }
            let mut mode = state.mode.lock().unwrap_or_else(PoisonError::into_inner);
            if mode.is_none() {
                return Err(SimulatedError::Bus("stop while idle"));
            }
            *mode = None;
            state.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn timing_micros(&mut self) -> Result<u32, Self::Error> {
        self.call(Duration::ZERO, |state| {
            if state.fail_timing.load(Ordering::SeqCst) {
                return Err(SimulatedError::Bus("timing"));
            }
            Ok(state.timing_us.load(Ordering::SeqCst))
        })
    }

    fn distance_mm(&mut self) -> Result<u16, Self::Error> {
        let extra = *self
            .state
            .read_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.state.reads.fetch_add(1, Ordering::SeqCst);
        self.call(extra, |state| {
            if state
                .mode
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_none()
            {
                state.violations.fetch_add(1, Ordering::SeqCst);
                return Err(SimulatedError::Bus("read while idle"));
            }
            if state.fail_read.load(Ordering::SeqCst) {
                return Err(SimulatedError::Bus("read"));
            }
            // Stored from a u16, cannot truncate.
            Ok(state.distance_mm.load(Ordering::SeqCst) as u16)
        })
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Ranging lifecycle controller.
//!
//! The controller owns the [`SensorHandle`] behind a single mutex together
//! with the lifecycle state, so every device call and every state
//! transition happens in one critical section:
//!
//! ```text
//!   start(mode)            stop()                 sampler thread
//!       │                     │                         │
//!       ▼                     ▼                         ▼
//! ┌───────────────────────────────────────────────────────────────┐
//! │ Mutex<Inner> { sensor: SensorHandle, state: Stopped|Ranging } │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! While ranging a named sampler thread ticks at the sampling period. Each
//! tick locks, checks it still belongs to the current start generation,
//! reads the distance, unlocks and hands the sample to the
//! [`SamplePublisher`]. `stop` transitions under the lock and then joins the
//! sampler, so once it returns no further sample is published.

use kanal::{ReceiveErrorTimeout, Receiver, Sender};
use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::{
    driver::{RangingDriver, RangingMode},
    error::Error,
    sample::{RangeSettings, SamplePublisher, timestamp},
    sensor::SensorHandle,
};

/// Shortest sampling period, the device's minimum reliable
/// inter-measurement interval.
pub const MIN_SAMPLING_PERIOD_US: u32 = 20_000;

/// Sampling period for a device-reported timing budget in microseconds.
pub fn sampling_period(timing_us: u32) -> Duration {
    Duration::from_micros(timing_us.max(MIN_SAMPLING_PERIOD_US).into())
}

enum State {
    Stopped,
    Ranging {
        mode: RangingMode,
        period: Duration,
        generation: u64,
        sampler: Sampler,
    },
}

struct Inner<D> {
    sensor: SensorHandle<D>,
    state: State,
    generation: u64,
}

struct Shared<D> {
    inner: Mutex<Inner<D>>,
    settings: RangeSettings,
    publisher: Box<dyn SamplePublisher>,
}

impl<D: RangingDriver> Shared<D> {
    fn lock(&self) -> MutexGuard<'_, Inner<D>> {
        // A panicking publisher must not wedge the controller.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// One periodic tick. Returns `false` once the generation is stale.
    fn sample_once(&self, generation: u64) -> bool {
        // Stamped at the tick, a slow read must not shift it.
        let stamp = timestamp();
        let reading = {
            let mut inner = self.lock();
            match inner.state {
                State::Ranging {
                    generation: current,
                    ..
                } if current == generation => {}
                _ => return false,
            }
            inner.sensor.distance_mm()
        };

        match (reading, stamp) {
            (Ok(distance_mm), Ok(stamp)) => {
                let sample = self.settings.sample(distance_mm, stamp);
                trace!("range {:.3} m", sample.range);
                self.publisher.publish(sample);
            }
            (Err(e), _) => warn!("{}", e),
            (Ok(_), Err(e)) => warn!("dropping sample, clock read failed: {}", e),
        }

        true
    }
}

/// Handle to the periodic sampler thread.
struct Sampler {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl Sampler {
    fn spawn<D: RangingDriver>(
        shared: Arc<Shared<D>>,
        generation: u64,
        period: Duration,
    ) -> Result<Self, Error> {
        let (stop, stop_rx) = kanal::bounded(1);
        let handle = thread::Builder::new()
            .name("tof_sampler".to_string())
            .spawn(move || sampler_loop(shared, generation, period, stop_rx))?;
        Ok(Self { stop, handle })
    }

    /// Signal the thread and wait for it to exit, including any in-flight
    /// read.
    fn shutdown(self) {
        let _ = self.stop.try_send(());
        drop(self.stop);
        if self.handle.join().is_err() {
            error!("sampler thread panicked");
        }
    }
}

fn sampler_loop<D: RangingDriver>(
    shared: Arc<Shared<D>>,
    generation: u64,
    period: Duration,
    stop: Receiver<()>,
) {
    debug!("sampler {} started at {:?}", generation, period);
    let mut target_time = Instant::now() + period;

    loop {
        let wait = target_time.saturating_duration_since(Instant::now());
        match stop.recv_timeout(wait) {
            Err(ReceiveErrorTimeout::Timeout) => {}
            _ => break,
        }

        if !shared.sample_once(generation) {
            break;
        }

        target_time += period;
        // A slow read delays the next tick instead of queueing a burst.
        let now = Instant::now();
        if target_time < now {
            target_time = now + period;
        }
    }

    debug!("sampler {} stopped", generation);
}

/// Controls the ranging lifecycle of one sensor.
///
/// Created in the stopped state. [`RangingController::start`] and
/// [`RangingController::stop`] may be called from any thread.
pub struct RangingController<D: RangingDriver> {
    shared: Arc<Shared<D>>,
}

impl<D: RangingDriver> RangingController<D> {
    pub fn new(
        sensor: SensorHandle<D>,
        settings: RangeSettings,
        publisher: impl SamplePublisher,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    sensor,
                    state: State::Stopped,
                    generation: 0,
                }),
                settings,
                publisher: Box::new(publisher),
            }),
        }
    }

    /// Start ranging and arm the periodic sampler.
    ///
    /// Fails with [`Error::AlreadyRanging`] if ranging. The check and the
    /// transition share one critical section, so two concurrent starts
    /// cannot both succeed. On device failure the controller stays stopped.
    #[instrument(skip(self))]
    pub fn start(&self, mode: RangingMode) -> Result<(), Error> {
        let mut inner = self.shared.lock();
        if matches!(inner.state, State::Ranging { .. }) {
            return Err(Error::AlreadyRanging);
        }

        inner.sensor.start_ranging(mode)?;

        let timing_us = match inner.sensor.timing_micros() {
            Ok(v) => v,
            Err(e) => {
                rollback(&mut inner.sensor);
                return Err(e);
            }
        };
        let period = sampling_period(timing_us);
        info!(
            "ranging in {} mode, device timing {} us, polling at {:?}",
            mode, timing_us, period
        );

        let generation = inner.generation.wrapping_add(1);
        let sampler = match Sampler::spawn(self.shared.clone(), generation, period) {
            Ok(v) => v,
            Err(e) => {
                rollback(&mut inner.sensor);
                return Err(e);
            }
        };

        inner.generation = generation;
        inner.state = State::Ranging {
            mode,
            period,
            generation,
            sampler,
        };
        Ok(())
    }

    /// Stop ranging.
    ///
    /// Returns only after the sampler thread has exited. Fails with
    /// [`Error::NotRanging`] if stopped. On device failure the controller
    /// keeps ranging.
    #[instrument(skip(self))]
    pub fn stop(&self) -> Result<(), Error> {
        let sampler = {
            let mut inner = self.shared.lock();
            match std::mem::replace(&mut inner.state, State::Stopped) {
                State::Stopped => return Err(Error::NotRanging),
                State::Ranging {
                    mode,
                    period,
                    generation,
                    sampler,
                } => {
                    if let Err(e) = inner.sensor.stop_ranging() {
                        inner.state = State::Ranging {
                            mode,
                            period,
                            generation,
                            sampler,
                        };
                        return Err(e);
                    }
                    sampler
                }
            }
        };

        // Joined outside the lock, an in-flight tick needs it to finish.
        sampler.shutdown();
        info!("ranging stopped");
        Ok(())
    }

    /// Stop ranging if active. Used on teardown.
    pub fn shutdown(&self) {
        match self.stop() {
            Ok(()) | Err(Error::NotRanging) => {}
            Err(e) => error!("failed to stop ranging on shutdown: {}", e),
        }
    }

    pub fn is_ranging(&self) -> bool {
        matches!(self.shared.lock().state, State::Ranging { .. })
    }

    /// Active mode, `None` while stopped.
    pub fn mode(&self) -> Option<RangingMode> {
        match self.shared.lock().state {
            State::Ranging { mode, .. } => Some(mode),
            State::Stopped => None,
        }
    }

    /// Active sampling period, `None` while stopped.
    pub fn sampling_period(&self) -> Option<Duration> {
        match self.shared.lock().state {
            State::Ranging { period, .. } => Some(period),
            State::Stopped => None,
        }
    }
}

impl<D: RangingDriver> Drop for RangingController<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn rollback<D: RangingDriver>(sensor: &mut SensorHandle<D>) {
    if let Err(e) = sensor.stop_ranging() {
        error!("failed to roll back device start: {}", e);
    }
}

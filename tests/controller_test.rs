// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Lifecycle and concurrency tests for the ranging controller, run against
//! the simulated sensor.

use edgefirst_schemas::builtin_interfaces::Time;
use edgefirst_tofpub::{
    Error, RangeSample, RangeSettings, RangingController, RangingMode, SensorHandle,
    sample::timestamp,
    simulated::SimulatedDriver,
};
use kanal::Receiver;
use std::{
    sync::{Arc, Barrier},
    thread,
    time::{Duration, Instant},
};

fn setup(
    driver: SimulatedDriver,
) -> (
    Arc<RangingController<SimulatedDriver>>,
    Receiver<RangeSample>,
) {
    let (tx, rx) = kanal::unbounded();
    let sensor = SensorHandle::configure(driver, None).expect("configure simulated sensor");
    let controller = RangingController::new(sensor, RangeSettings::default(), tx);
    (Arc::new(controller), rx)
}

fn nanos(t: &Time) -> i64 {
    i64::from(t.sec) * 1_000_000_000 + i64::from(t.nanosec)
}

fn drain(rx: &Receiver<RangeSample>) -> usize {
    let mut n = 0;
    while let Ok(Some(_)) = rx.try_recv() {
        n += 1;
    }
    n
}

#[test]
fn test_first_sample_after_timing_budget() {
    let probe = SimulatedDriver::new()
        .with_timing_us(33_000)
        .with_distance_mm(1234);
    let (ctl, rx) = setup(probe.clone());
    assert_eq!(probe.configured_address(), Some(0x29));

    let start = Instant::now();
    ctl.start(RangingMode::BetterAccuracy).unwrap();
    assert_eq!(ctl.sampling_period(), Some(Duration::from_millis(33)));

    let sample = rx
        .recv_timeout(Duration::from_secs(2))
        .expect("no sample published");
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_millis(30), "{:?}", elapsed);
    assert!(elapsed < Duration::from_millis(500), "{:?}", elapsed);
    assert_eq!(sample.range, 1.234);
    assert_eq!(sample.header.frame_id, "range_finder");

    ctl.stop().unwrap();
}

#[test]
fn test_stamp_taken_at_tick() {
    let probe = SimulatedDriver::new().with_timing_us(20_000);
    probe.set_read_delay(Duration::from_millis(150));
    let (ctl, rx) = setup(probe.clone());

    let before = timestamp().unwrap();
    ctl.start(RangingMode::HighSpeed).unwrap();
    let sample = rx
        .recv_timeout(Duration::from_secs(2))
        .expect("no sample published");
    ctl.stop().unwrap();

    // Tick at 20 ms, the read finishes around 170 ms.
    let offset = Duration::from_nanos((nanos(&sample.header.stamp) - nanos(&before)) as u64);
    assert!(offset >= Duration::from_millis(15), "{:?}", offset);
    assert!(offset < Duration::from_millis(120), "{:?}", offset);
}

#[test]
fn test_no_samples_outside_ranging() {
    let probe = SimulatedDriver::new().with_timing_us(20_000);
    let (ctl, rx) = setup(probe.clone());

    thread::sleep(Duration::from_millis(60));
    assert_eq!(drain(&rx), 0);
    assert_eq!(probe.reads(), 0);

    ctl.start(RangingMode::HighSpeed).unwrap();
    thread::sleep(Duration::from_millis(110));
    ctl.stop().unwrap();

    assert!(drain(&rx) >= 2);
    let reads = probe.reads();

    thread::sleep(Duration::from_millis(100));
    assert_eq!(drain(&rx), 0);
    assert_eq!(probe.reads(), reads);
    assert_eq!(probe.violations(), 0);
}

#[test]
fn test_stop_waits_for_in_flight_read() {
    let probe = SimulatedDriver::new().with_timing_us(20_000);
    probe.set_read_delay(Duration::from_millis(200));
    let (ctl, rx) = setup(probe.clone());

    ctl.start(RangingMode::HighSpeed).unwrap();
    // First tick fires at 20 ms and holds the device for 200 ms.
    thread::sleep(Duration::from_millis(40));
    assert_eq!(probe.reads(), 1);

    let begin = Instant::now();
    ctl.stop().unwrap();
    let elapsed = begin.elapsed();

    assert!(elapsed >= Duration::from_millis(100), "{:?}", elapsed);
    // The in-flight read completed and was published before stop returned.
    assert_eq!(drain(&rx), 1);
    assert_eq!(probe.reads(), 1);

    thread::sleep(Duration::from_millis(60));
    assert_eq!(probe.reads(), 1);
    assert_eq!(probe.violations(), 0);
}

#[test]
fn test_double_start_keeps_sampler() {
    let probe = SimulatedDriver::new().with_timing_us(20_000);
    let (ctl, rx) = setup(probe.clone());

    ctl.start(RangingMode::BetterAccuracy).unwrap();
    let err = ctl.start(RangingMode::LongRange).unwrap_err();
    assert!(matches!(err, Error::AlreadyRanging));
    assert_eq!(err.to_string(), "Already Ranging");
    assert_eq!(probe.starts(), 1);
    assert_eq!(probe.active_mode(), Some(RangingMode::BetterAccuracy));

    for _ in 0..3 {
        rx.recv_timeout(Duration::from_secs(1))
            .expect("sampler stopped after rejected start");
    }

    ctl.stop().unwrap();
}

#[test]
fn test_stop_while_stopped() {
    let probe = SimulatedDriver::new();
    let (ctl, _rx) = setup(probe.clone());

    let err = ctl.stop().unwrap_err();
    assert!(matches!(err, Error::NotRanging));
    assert_eq!(err.to_string(), "Not Ranging");
    assert_eq!(probe.stops(), 0);
    assert!(!ctl.is_ranging());
}

#[test]
fn test_missed_samples_do_not_stop_sampler() {
    let probe = SimulatedDriver::new().with_timing_us(20_000);
    let (ctl, rx) = setup(probe.clone());

    probe.fail_read(true);
    ctl.start(RangingMode::HighSpeed).unwrap();
    thread::sleep(Duration::from_millis(110));

    assert!(probe.reads() >= 2);
    assert_eq!(drain(&rx), 0);
    assert!(ctl.is_ranging());

    probe.fail_read(false);
    rx.recv_timeout(Duration::from_secs(1))
        .expect("sampler did not recover after missed samples");

    ctl.stop().unwrap();
}

#[test]
fn test_restart_uses_new_period() {
    let probe = SimulatedDriver::new().with_timing_us(50_000);
    let (ctl, rx) = setup(probe.clone());

    ctl.start(RangingMode::BestAccuracy).unwrap();
    assert_eq!(ctl.sampling_period(), Some(Duration::from_millis(50)));
    ctl.stop().unwrap();

    probe.set_timing_us(5_000);
    ctl.start(RangingMode::HighSpeed).unwrap();
    assert_eq!(ctl.sampling_period(), Some(Duration::from_millis(20)));
    rx.recv_timeout(Duration::from_secs(1)).unwrap();
    ctl.stop().unwrap();

    assert_eq!(probe.starts(), 2);
    assert_eq!(probe.stops(), 2);
    assert_eq!(probe.violations(), 0);
}

#[test]
fn test_concurrent_starts_single_winner() {
    let probe = SimulatedDriver::new();
    probe.set_call_delay(Duration::from_millis(5));
    let (ctl, _rx) = setup(probe.clone());

    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ctl = ctl.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                ctl.start(RangingMode::BetterAccuracy)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, Error::AlreadyRanging))
    );
    assert_eq!(probe.starts(), 1);

    ctl.stop().unwrap();
    assert_eq!(probe.violations(), 0);
}

#[test]
fn test_device_access_never_overlaps() {
    let probe = SimulatedDriver::new().with_timing_us(20_000);
    probe.set_call_delay(Duration::from_millis(1));
    probe.set_read_delay(Duration::from_millis(3));
    let (ctl, rx) = setup(probe.clone());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let ctl = ctl.clone();
            thread::spawn(move || {
                for n in 0..40 {
                    if (i + n) % 2 == 0 {
                        let _ = ctl.start(RangingMode::HighSpeed);
                    } else {
                        let _ = ctl.stop();
                    }
                    thread::sleep(Duration::from_millis((i as u64 * 3 + n as u64) % 7));
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    ctl.shutdown();
    assert!(!ctl.is_ranging());
    assert!(!probe.is_ranging());
    assert_eq!(probe.starts(), probe.stops());
    assert_eq!(probe.violations(), 0);

    // Nothing arrives once the final stop has returned.
    drain(&rx);
    thread::sleep(Duration::from_millis(60));
    assert_eq!(drain(&rx), 0);
}

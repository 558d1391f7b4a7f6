// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Range samples and the publish boundary.

use edgefirst_schemas::{builtin_interfaces::Time, std_msgs::Header};
use serde::Serialize;

/// `sensor_msgs/msg/Range` radiation type for infrared sensors.
pub const INFRARED: u8 = 1;

/// Schema name used when publishing samples.
pub const RANGE_SCHEMA: &str = "sensor_msgs/msg/Range";

/// One distance measurement, laid out as `sensor_msgs/msg/Range` so it can
/// be CDR encoded directly.
#[derive(Clone, Debug, Serialize)]
pub struct RangeSample {
    pub header: Header,
    pub radiation_type: u8,
    /// Field of view in radians.
    pub field_of_view: f32,
    /// Minimum valid range in meters.
    pub min_range: f32,
    /// Maximum valid range in meters.
    pub max_range: f32,
    /// Measured distance in meters.
    pub range: f32,
}

/// Descriptive metadata attached to every sample, fixed at startup.
#[derive(Clone, Debug, PartialEq)]
pub struct RangeSettings {
    pub frame_id: String,
    /// Field of view in radians.
    pub field_of_view: f32,
    /// Meters.
    pub min_range: f32,
    /// Meters.
    pub max_range: f32,
}

impl Default for RangeSettings {
    fn default() -> Self {
        Self {
            frame_id: String::from("range_finder"),
            field_of_view: 25.0_f32.to_radians(),
            min_range: 0.005,
            max_range: 2.0,
        }
    }
}

impl RangeSettings {
    /// Build a sample from a raw millimeter reading.
    ///
    /// Sentinel readings are converted like any other value.
    pub fn sample(&self, distance_mm: u16, stamp: Time) -> RangeSample {
        RangeSample {
            header: Header {
                stamp,
                frame_id: self.frame_id.clone(),
            },
            radiation_type: INFRARED,
            field_of_view: self.field_of_view,
            min_range: self.min_range,
            max_range: self.max_range,
            range: f32::from(distance_mm) / 1000.0,
        }
    }
}

/// Receiver of samples produced by the periodic sampler.
///
/// Called from the sampler thread, outside the device lock. Implementations
/// must not block for long since they delay the next tick.
pub trait SamplePublisher: Send + Sync + 'static {
    fn publish(&self, sample: RangeSample);
}

/// Hands samples to an async consumer, dropping them when the channel is
/// full.
impl SamplePublisher for kanal::Sender<RangeSample> {
    fn publish(&self, sample: RangeSample) {
        match self.try_send(sample) {
            Ok(true) => {}
            Ok(false) => tracing::trace!("sample channel full, dropping sample"),
            Err(e) => tracing::debug!("sample channel closed: {:?}", e),
        }
    }
}

/// Get the current monotonic timestamp.
///
/// On Linux, uses `CLOCK_MONOTONIC_RAW` like the other EdgeFirst publishers.
#[cfg(target_os = "linux")]
pub fn timestamp() -> Result<Time, std::io::Error> {
    let mut tp = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    let err = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC_RAW, &mut tp) };
    if err != 0 {
        return Err(std::io::Error::last_os_error());
    }

    Ok(Time {
        sec: tp.tv_sec as i32,
        nanosec: tp.tv_nsec as u32,
    })
}

#[cfg(not(target_os = "linux"))]
pub fn timestamp() -> Result<Time, std::io::Error> {
    let duration = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(std::io::Error::other)?;
    Ok(Time {
        sec: duration.as_secs() as i32,
        nanosec: duration.subsec_nanos(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = RangeSettings::default();
        assert_eq!(settings.frame_id, "range_finder");
        assert!((settings.field_of_view - 0.436_332_3).abs() < 1e-6);
        assert_eq!(settings.min_range, 0.005);
        assert_eq!(settings.max_range, 2.0);
    }

    #[test]
    fn test_sample_conversion() {
        let settings = RangeSettings::default();
        let sample = settings.sample(1234, Time { sec: 3, nanosec: 7 });

        assert_eq!(sample.range, 1.234);
        assert_eq!(sample.radiation_type, INFRARED);
        assert_eq!(sample.header.frame_id, "range_finder");
        assert_eq!(sample.header.stamp.sec, 3);
        assert_eq!(sample.header.stamp.nanosec, 7);
    }

    #[test]
    fn test_sentinel_is_not_filtered() {
        let sample = RangeSettings::default().sample(8190, Time { sec: 0, nanosec: 0 });
        assert_eq!(sample.range, 8.19);
        assert!(sample.range > sample.max_range);
    }

    #[test]
    fn test_timestamp_monotonic() {
        let a = timestamp().unwrap();
        let b = timestamp().unwrap();
        assert!((b.sec, b.nanosec) >= (a.sec, a.nanosec));
    }
}

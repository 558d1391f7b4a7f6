// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use edgefirst_tofpub::{Error, RangeSettings, RangingMode, driver::MAX_ADDRESS};
use serde_json::json;
use tracing::level_filters::LevelFilter;
use zenoh::config::{Config, WhatAmI};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Bus address to assign to the sensor, decimal or 0x prefixed hex.
    /// Requires --xshut-gpio.  The factory address 0x29 is used when unset.
    #[arg(long, env, value_parser = parse_address)]
    pub address: Option<u8>,

    /// GPIO connected to the sensor's XSHUT pin, used to reset the sensor
    /// before assigning --address.
    #[arg(long, env)]
    pub xshut_gpio: Option<u32>,

    /// Start ranging as soon as the node is ready.
    #[arg(long, env)]
    pub autostart: bool,

    /// Ranging mode used by --autostart.
    #[arg(long, env, value_enum, default_value = "better-accuracy")]
    pub ranging_mode: RangingMode,

    /// The name of the range finder frame
    #[arg(long, env, default_value = "range_finder")]
    pub frame_id: String,

    /// Sensor field of view in radians.
    #[arg(long, env, default_value = "0.43633232")]
    pub fov: f32,

    /// Minimum valid range in meters.
    #[arg(long, env, default_value = "0.005")]
    pub min_range: f32,

    /// Maximum valid range in meters.
    #[arg(long, env, default_value = "2.0")]
    pub max_range: f32,

    /// Range finder base topic, samples are published on {topic}/range and
    /// the control services are {topic}/start_ranging and
    /// {topic}/stop_ranging.
    #[arg(long, env, default_value = "rt/tof")]
    pub topic: String,

    /// Number of samples buffered for publishing before samples are dropped.
    #[arg(long, env, default_value = "16")]
    pub queue_size: usize,

    /// Timing budget reported by the simulated sensor in microseconds.
    #[arg(long, env, default_value = "33000")]
    pub sim_timing_us: u32,

    /// Distance reported by the simulated sensor in millimeters.
    #[arg(long, env, default_value = "500")]
    pub sim_distance_mm: u16,

    /// Application log level
    #[arg(long, env, default_value = "info")]
    pub rust_log: LevelFilter,

    /// Enable Tracy profiler broadcast
    #[arg(long, env)]
    pub tracy: bool,

    /// zenoh connection mode
    #[arg(long, env, default_value = "peer")]
    mode: WhatAmI,

    /// connect to zenoh endpoints
    #[arg(long, env)]
    connect: Vec<String>,

    /// listen to zenoh endpoints
    #[arg(long, env)]
    listen: Vec<String>,

    /// disable zenoh multicast scouting
    #[arg(long, env)]
    no_multicast_scouting: bool,
}

impl Args {
    /// Explicit address and XSHUT pin, which must be given together.
    pub fn address_setup(&self) -> Result<Option<(u8, u32)>, Error> {
        match (self.address, self.xshut_gpio) {
            (None, None) => Ok(None),
            (Some(address), Some(gpio)) => Ok(Some((address, gpio))),
            (Some(_), None) => Err(Error::config(
                "--address requires --xshut-gpio, the GPIO connected to the XSHUT pin",
            )),
            (None, Some(_)) => Err(Error::config("--xshut-gpio requires --address")),
        }
    }

    pub fn settings(&self) -> RangeSettings {
        RangeSettings {
            frame_id: self.frame_id.clone(),
            field_of_view: self.fov,
            min_range: self.min_range,
            max_range: self.max_range,
        }
    }
}

fn parse_address(s: &str) -> Result<u8, String> {
    let value = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse::<u8>(),
    }
    .map_err(|e| format!("invalid address {}: {}", s, e))?;

    if value > MAX_ADDRESS {
        return Err(format!(
            "address {:#04x} exceeds 7-bit range (max {:#04x})",
            value, MAX_ADDRESS
        ));
    }
    Ok(value)
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        let mut config = Config::default();

        config
            .insert_json5("mode", &json!(args.mode).to_string())
            .unwrap();

        if !args.connect.is_empty() {
            config
                .insert_json5("connect/endpoints", &json!(args.connect).to_string())
                .unwrap();
        }

        if !args.listen.is_empty() {
            config
                .insert_json5("listen/endpoints", &json!(args.listen).to_string())
                .unwrap();
        }

        if args.no_multicast_scouting {
            config
                .insert_json5("scouting/multicast/enabled", &json!(false).to_string())
                .unwrap();
        }

        config
            .insert_json5("scouting/multicast/interface", &json!("lo").to_string())
            .unwrap();

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("tofpub").chain(extra.iter().copied()))
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]).unwrap();
        assert_eq!(args.address_setup().unwrap(), None);
        assert_eq!(args.ranging_mode, RangingMode::BetterAccuracy);
        assert!(!args.autostart);

        let settings = args.settings();
        let defaults = RangeSettings::default();
        assert_eq!(settings.frame_id, defaults.frame_id);
        assert!((settings.field_of_view - defaults.field_of_view).abs() < 1e-6);
        assert_eq!(settings.min_range, defaults.min_range);
        assert_eq!(settings.max_range, defaults.max_range);
    }

    #[test]
    fn test_address_pairing() {
        let args = parse(&["--address", "0x30", "--xshut-gpio", "17"]).unwrap();
        assert_eq!(args.address_setup().unwrap(), Some((0x30, 17)));

        let args = parse(&["--address", "48"]).unwrap();
        assert!(matches!(
            args.address_setup(),
            Err(Error::Configuration(_))
        ));

        let args = parse(&["--xshut-gpio", "17"]).unwrap();
        assert!(matches!(
            args.address_setup(),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_address_range() {
        assert_eq!(parse_address("0x29"), Ok(0x29));
        assert_eq!(parse_address("41"), Ok(41));
        assert!(parse_address("0x80").is_err());
        assert!(parse_address("0x1ff").is_err());
        assert!(parse_address("address").is_err());
    }

    #[test]
    fn test_autostart_mode() {
        let args = parse(&["--autostart", "--ranging-mode", "long-range"]).unwrap();
        assert!(args.autostart);
        assert_eq!(args.ranging_mode, RangingMode::LongRange);
    }
}

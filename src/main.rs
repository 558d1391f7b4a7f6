// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

mod args;
mod service;

use args::Args;
use clap::Parser as _;
use edgefirst_tofpub::{
    RangeSample, RangingController, SensorHandle,
    reset::{StdDelay, SysfsPin, assign_address},
    simulated::SimulatedDriver,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{Layer as _, layer::SubscriberExt as _, util::SubscriberInitExt as _};
use zenoh::qos::{CongestionControl, Priority};

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let stdout_log = tracing_subscriber::fmt::layer().with_filter(args.rust_log);
    let tracy = args.tracy.then(tracing_tracy::TracyLayer::default);
    tracing_subscriber::registry()
        .with(stdout_log)
        .with(tracy)
        .init();

    // Configuration errors abort startup before the device is touched.
    let address = match args.address_setup()? {
        Some((address, gpio)) => {
            info!("Configuring address to {:#04x}", address);
            let mut xshut = SysfsPin::export(gpio)?;
            assign_address(&mut xshut, &mut StdDelay).map_err(std::io::Error::from)?;
            Some(address)
        }
        None => None,
    };

    warn!("no hardware driver linked, using the simulated sensor");
    let driver = SimulatedDriver::new()
        .with_timing_us(args.sim_timing_us)
        .with_distance_mm(args.sim_distance_mm);
    let sensor = SensorHandle::configure(driver, address)?;

    let (tx, rx) = kanal::bounded::<RangeSample>(args.queue_size);
    let controller = Arc::new(RangingController::new(sensor, args.settings(), tx));

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(run(args, controller, rx.to_async()))
}

async fn run(
    args: Args,
    controller: Arc<RangingController<SimulatedDriver>>,
    rx: kanal::AsyncReceiver<RangeSample>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let session = zenoh::open(zenoh::config::Config::from(args.clone())).await?;

    let range_topic = format!("{}/range", args.topic);
    let publisher = match session
        .declare_publisher(range_topic.clone())
        .priority(Priority::DataHigh)
        .congestion_control(CongestionControl::Drop)
        .await
    {
        Ok(v) => v,
        Err(e) => {
            error!("Failed to create publisher {}: {:?}", range_topic, e);
            return Err(e);
        }
    };
    tokio::spawn(service::publish_samples(rx, publisher));

    if args.autostart {
        let ctl = controller.clone();
        let mode = args.ranging_mode;
        tokio::task::spawn_blocking(move || service::autostart(&ctl, mode)).await?;
    }

    tokio::select! {
        res = service::serve_control(&session, &args.topic, controller.clone()) => res?,
        res = tokio::signal::ctrl_c() => {
            res?;
            info!("interrupted, shutting down");
        }
    }

    tokio::task::spawn_blocking(move || controller.shutdown()).await?;
    session.close().await?;
    Ok(())
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use edgefirst_tofpub::{
    RangeSample, RangingController, RangingDriver, RangingMode, RangingResponse,
    StartRangingRequest,
    messages::{RANGING_RESPONSE_SCHEMA, encode},
    sample::RANGE_SCHEMA,
};
use kanal::AsyncReceiver;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, trace};
use zenoh::{
    Session,
    bytes::{Encoding, ZBytes},
    pubsub::Publisher,
    query::Query,
};

/// Forward samples from the sampler thread to zenoh.
pub async fn publish_samples(rx: AsyncReceiver<RangeSample>, publ: Publisher<'_>) {
    while let Ok(sample) = rx.recv().await {
        let msg = match encode(&sample) {
            Ok(v) => ZBytes::from(v),
            Err(e) => {
                error!("Could not encode range sample: {:?}", e);
                continue;
            }
        };
        let enc = Encoding::APPLICATION_CDR.with_schema(RANGE_SCHEMA);

        match publ.put(msg).encoding(enc).await {
            Ok(_) => trace!("{} message sent", publ.key_expr()),
            Err(e) => error!("{} message error: {:?}", publ.key_expr(), e),
        }
    }
    debug!("sample channel closed");
}

/// Serve the `start_ranging` and `stop_ranging` queryables until the session
/// closes.
pub async fn serve_control<D: RangingDriver>(
    session: &Session,
    topic: &str,
    controller: Arc<RangingController<D>>,
) -> Result<(), zenoh::Error> {
    let start_key = format!("{}/start_ranging", topic);
    let stop_key = format!("{}/stop_ranging", topic);
    let start = session.declare_queryable(&start_key).await?;
    let stop = session.declare_queryable(&stop_key).await?;
    info!("serving {} and {}", start_key, stop_key);

    loop {
        tokio::select! {
            query = start.recv_async() => {
                let Ok(query) = query else { break };
                let payload = query
                    .payload()
                    .map(|p| p.to_bytes().into_owned())
                    .unwrap_or_default();
                let controller = controller.clone();
                let response = run_blocking(move || start_request(&controller, &payload)).await;
                reply(&query, response).await;
            }
            query = stop.recv_async() => {
                let Ok(query) = query else { break };
                let controller = controller.clone();
                let response = run_blocking(move || stop_request(&controller)).await;
                reply(&query, response).await;
            }
        }
    }

    Ok(())
}

/// Start ranging once at startup. A failure is logged and the service keeps
/// running stopped.
pub fn autostart<D: RangingDriver>(controller: &RangingController<D>, mode: RangingMode) {
    info!("Autostarting ranging in mode {}", mode);
    if let Err(e) = controller.start(mode) {
        error!("Failed to automatically start ranging: {}", e);
    }
}

/// Handle a start request payload.
#[instrument(skip_all)]
pub fn start_request<D: RangingDriver>(
    controller: &RangingController<D>,
    payload: &[u8],
) -> RangingResponse {
    let result = StartRangingRequest::decode_mode(payload).and_then(|mode| controller.start(mode));
    if let Err(e) = &result {
        info!("start_ranging rejected: {}", e);
    }
    RangingResponse::from(result)
}

#[instrument(skip_all)]
pub fn stop_request<D: RangingDriver>(controller: &RangingController<D>) -> RangingResponse {
    let result = controller.stop();
    if let Err(e) = &result {
        info!("stop_ranging rejected: {}", e);
    }
    RangingResponse::from(result)
}

// Controller calls block on the device and on the sampler join.
async fn run_blocking<F>(f: F) -> RangingResponse
where
    F: FnOnce() -> RangingResponse + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(v) => v,
        Err(e) => RangingResponse::failure(format!("controller task failed: {}", e)),
    }
}

async fn reply(query: &Query, response: RangingResponse) {
    let msg = match encode(&response) {
        Ok(v) => ZBytes::from(v),
        Err(e) => {
            error!("Could not encode response: {:?}", e);
            return;
        }
    };
    let enc = Encoding::APPLICATION_CDR.with_schema(RANGING_RESPONSE_SCHEMA);

    if let Err(e) = query
        .reply(query.key_expr().clone(), msg)
        .encoding(enc)
        .await
    {
        error!("{} reply error: {:?}", query.key_expr(), e);
    }
}

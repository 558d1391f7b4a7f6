// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Control service messages.
//!
//! Requests and replies are CDR little-endian encoded, matching the layout
//! of the ROS 2 `StartRanging` and `std_srvs/srv/Trigger` services.

use cdr::{CdrLe, Infinite};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{driver::RangingMode, error::Error};

/// Schema name of control replies.
pub const RANGING_RESPONSE_SCHEMA: &str = "std_srvs/srv/Trigger_Response";

/// Body of a `start_ranging` request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRangingRequest {
    pub mode: u8,
}

impl StartRangingRequest {
    pub fn new(mode: RangingMode) -> Self {
        Self { mode: mode.into() }
    }

    /// Decode a request payload. An empty payload selects the default mode.
    pub fn decode_mode(payload: &[u8]) -> Result<RangingMode, Error> {
        if payload.is_empty() {
            return Ok(RangingMode::default());
        }
        let req: StartRangingRequest = decode(payload)?;
        RangingMode::try_from(req.mode)
    }
}

/// Reply to `start_ranging` and `stop_ranging`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangingResponse {
    pub success: bool,
    pub message: String,
}

impl RangingResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: String::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

impl From<Result<(), Error>> for RangingResponse {
    fn from(result: Result<(), Error>) -> Self {
        match result {
            Ok(()) => RangingResponse::ok(),
            Err(e) => RangingResponse::failure(e.to_string()),
        }
    }
}

pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, Error> {
    Ok(cdr::serialize::<_, _, CdrLe>(msg, Infinite)?)
}

pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, Error> {
    Ok(cdr::deserialize::<T>(payload)?)
}

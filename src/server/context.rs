// Copyright 2026 The Backuper Developers. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use tokio::time::Instant;
use tonic::metadata::MetadataMap;

const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";

// tonic's server times the call out on the same header and answers with
// `Cancelled`, so the handler's own deadline has to fire first.
const DEADLINE_HEADROOM_MAX: Duration = Duration::from_millis(250);

/// Per call state the receive loop consults besides the stream itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallContext {
    pub deadline: Option<Instant>,
}

impl CallContext {
    pub fn new(deadline: Option<Instant>) -> Self {
        Self { deadline }
    }

    pub fn from_metadata(metadata: &MetadataMap) -> Self {
        let timeout = metadata
            .get(GRPC_TIMEOUT_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_grpc_timeout);
        Self {
            deadline: timeout.map(|timeout| Instant::now() + with_headroom(timeout)),
        }
    }
}

/// Shortens `timeout` by a tenth, at most `DEADLINE_HEADROOM_MAX`.
pub fn with_headroom(timeout: Duration) -> Duration {
    timeout.saturating_sub((timeout / 10).min(DEADLINE_HEADROOM_MAX))
}

// grpc-timeout is at most 8 ascii digits followed by one unit character.
pub fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    if value.len() < 2 || value.len() > 9 || !value.is_ascii() {
        return None;
    }
    let (digits, unit) = value.split_at(value.len() - 1);
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;
    match unit {
        "H" => Some(Duration::from_secs(amount * 60 * 60)),
        "M" => Some(Duration::from_secs(amount * 60)),
        "S" => Some(Duration::from_secs(amount)),
        "m" => Some(Duration::from_millis(amount)),
        "u" => Some(Duration::from_micros(amount)),
        "n" => Some(Duration::from_nanos(amount)),
        _ => None,
    }
}

// Copyright 2026 The Backuper Developers. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0

pub mod client;
pub mod common;
pub mod server;

pub mod upload_service {
    tonic::include_proto!("upload");
}

// Copyright 2026 The Backuper Developers. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0

pub mod config;
pub mod errors;
pub mod path;

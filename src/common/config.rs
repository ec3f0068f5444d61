// Copyright 2026 The Backuper Developers. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0

use std::fs;

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SERVER_CONFIG: &str = include_str!("../../config/server.yaml");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Properties {
    pub address: String,
    pub storage_path: String,
    #[serde(default = "default_max_pending_bytes")]
    pub max_pending_bytes: usize,
}

fn default_max_pending_bytes() -> usize {
    4 << 20
}

impl Properties {
    pub fn from_yaml(yaml_str: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(yaml_str)?)
    }

    // without a config file, fall back to the embedded defaults.
    pub fn load(config_file: Option<&str>) -> anyhow::Result<Self> {
        match config_file {
            None => Self::from_yaml(DEFAULT_SERVER_CONFIG),
            Some(path) => {
                let yaml_str = fs::read_to_string(path)
                    .with_context(|| format!("couldn't read config file {}", path))?;
                Self::from_yaml(&yaml_str).with_context(|| format!("{} is malformed", path))
            }
        }
    }
}

// Copyright 2026 The Backuper Developers. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0

use backuper::{common::config::Properties, server};
use clap::Parser;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    storage_path: Option<String>,
    #[arg(long)]
    max_pending_bytes: Option<usize>,
    #[arg(long)]
    config_file: Option<String>,
    #[arg(long, default_value = "info")]
    log_level: log::LevelFilter,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut builder = env_logger::Builder::from_default_env();
    builder.format_timestamp(None).filter(None, args.log_level);
    builder.init();

    // if the user provides the config file, use it instead of the embedded one.
    let mut properties = Properties::load(args.config_file.as_deref())?;
    if let Some(address) = args.address {
        properties.address = address;
    }
    if let Some(storage_path) = args.storage_path {
        properties.storage_path = storage_path;
    }
    if let Some(max_pending_bytes) = args.max_pending_bytes {
        properties.max_pending_bytes = max_pending_bytes;
    }

    info!("Start Server");
    server::run(properties).await
}

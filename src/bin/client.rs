// Copyright 2026 The Backuper Developers. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0

use std::{path::PathBuf, time::Duration};

use backuper::client::{self, UploadOptions, DEFAULT_CHUNK_SIZE};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Local file to upload.
    file: PathBuf,
    #[arg(long, default_value = "127.0.0.1:9000")]
    address: String,
    /// Name to store the file under, defaults to the local file name.
    #[arg(long)]
    name: Option<String>,
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,
    /// Call deadline in seconds.
    #[arg(long)]
    timeout: Option<u64>,
    #[arg(long, default_value = "warn")]
    log_level: log::LevelFilter,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut builder = env_logger::Builder::from_default_env();
    builder.format_timestamp(None).filter(None, args.log_level);
    builder.init();

    let options = UploadOptions {
        remote_name: args.name,
        chunk_size: args.chunk_size,
        timeout: args.timeout.map(Duration::from_secs),
    };
    let response = client::upload_file(&args.address, &args.file, options).await?;
    println!("saved file: {}, size: {}", response.file_name, response.size);
    Ok(())
}

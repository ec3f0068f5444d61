// Copyright 2026 The Backuper Developers. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0

use std::{path::Path, time::Duration};

use anyhow::Context;
use log::{debug, info};
use tokio::{fs::File, io::AsyncReadExt, sync::mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tonic::Request;

use crate::upload_service::{
    file_service_client::FileServiceClient, FileUploadRequest, FileUploadResponse,
};

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Name announced to the server, the local base name when unset.
    pub remote_name: Option<String>,
    pub chunk_size: usize,
    pub timeout: Option<Duration>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            remote_name: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout: None,
        }
    }
}

/// Streams the file at `path` to the upload service at `address`.
pub async fn upload_file(
    address: &str,
    path: &Path,
    options: UploadOptions,
) -> anyhow::Result<FileUploadResponse> {
    anyhow::ensure!(options.chunk_size > 0, "chunk size must be positive");
    let remote_name = match options.remote_name {
        Some(name) => name,
        None => path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .with_context(|| format!("{:?} has no usable file name", path))?,
    };
    let file = File::open(path)
        .await
        .with_context(|| format!("couldn't open {:?}", path))?;

    let endpoint = if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    };
    info!("Connect to upload server {}", endpoint);
    let mut client = FileServiceClient::connect(endpoint).await?;

    let (sender, receiver) = mpsc::channel(4);
    let reader = tokio::spawn(send_chunks(file, remote_name, options.chunk_size, sender));

    let mut request = Request::new(ReceiverStream::new(receiver));
    if let Some(timeout) = options.timeout {
        request.set_timeout(timeout);
    }
    let response = client.upload(request).await;
    let sent = reader.await?;

    let response = response.context("upload rejected")?.into_inner();
    // a local read failure truncates the stream, so the server's answer is not the whole file.
    let sent = sent?;
    debug!("sent {} bytes, server stored {}", sent, response.size);
    Ok(response)
}

async fn send_chunks(
    mut file: File,
    remote_name: String,
    chunk_size: usize,
    sender: mpsc::Sender<FileUploadRequest>,
) -> anyhow::Result<u64> {
    let mut file_name = Some(remote_name);
    let mut sent = 0u64;
    loop {
        let mut chunk = vec![0u8; chunk_size];
        let n = file.read(&mut chunk).await?;
        // the first message always goes out so an empty file is still named.
        if n == 0 && file_name.is_none() {
            break;
        }
        chunk.truncate(n);
        let request = FileUploadRequest {
            file_name: file_name.take().unwrap_or_default(),
            chunk,
        };
        if sender.send(request).await.is_err() {
            anyhow::bail!("upload stream closed by the server after {} bytes", sent);
        }
        sent += n as u64;
        if n == 0 {
            break;
        }
    }
    Ok(sent)
}

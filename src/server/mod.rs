// Copyright 2026 The Backuper Developers. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0

pub mod assembler;
pub mod context;
pub mod receiver;

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use log::{error, info};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{transport::Server, Request, Response, Status, Streaming};

use crate::{
    common::config::Properties,
    upload_service::{
        file_service_server::{FileService, FileServiceServer},
        FileUploadRequest, FileUploadResponse,
    },
};
use assembler::FileAssembler;
use context::CallContext;
use receiver::receive_upload;

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub storage_root: PathBuf,
    pub max_pending_bytes: usize,
}

impl From<&Properties> for UploadSettings {
    fn from(properties: &Properties) -> Self {
        Self {
            storage_root: PathBuf::from(&properties.storage_path),
            max_pending_bytes: properties.max_pending_bytes,
        }
    }
}

pub struct UploadService {
    settings: Arc<UploadSettings>,
}

impl UploadService {
    pub fn new(settings: UploadSettings) -> Self {
        Self {
            settings: Arc::new(settings),
        }
    }
}

#[async_trait]
impl FileService for UploadService {
    async fn upload(
        &self,
        request: Request<Streaming<FileUploadRequest>>,
    ) -> Result<Response<FileUploadResponse>, Status> {
        let peer = request.remote_addr();
        let context = CallContext::from_metadata(request.metadata());
        let assembler = FileAssembler::new(
            &self.settings.storage_root,
            self.settings.max_pending_bytes,
        );
        match receive_upload(request.into_inner(), context, assembler).await {
            Ok((file_name, size)) => {
                info!("saved file: {}, size: {}, peer: {:?}", file_name, size, peer);
                Ok(Response::new(FileUploadResponse { file_name, size }))
            }
            Err(e) => {
                error!("upload from {:?} failed: {}", peer, e);
                Err(e.into())
            }
        }
    }
}

pub async fn run(properties: Properties) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&properties.address).await?;
    info!("Listening on {}", listener.local_addr()?);
    serve(listener, UploadSettings::from(&properties)).await
}

pub async fn serve(listener: TcpListener, settings: UploadSettings) -> anyhow::Result<()> {
    info!("storing uploads under {:?}", settings.storage_root);
    Server::builder()
        .add_service(FileServiceServer::new(UploadService::new(settings)))
        .serve_with_incoming(TcpListenerStream::new(listener))
        .await?;
    Ok(())
}

/// Binds an ephemeral port on localhost and serves on a background task.
pub async fn spawn_local(settings: UploadSettings) -> anyhow::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = serve(listener, settings).await {
            error!("upload server stopped: {}", e);
        }
    });
    Ok(address)
}

// Copyright 2026 The Backuper Developers. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0

use log::{debug, error};
use tokio_stream::{Stream, StreamExt};
use tonic::Status;

use super::{assembler::FileAssembler, context::CallContext};
use crate::{common::errors::UploadError, upload_service::FileUploadRequest};

/// Pulls chunk messages off one upload stream.
pub struct ChunkReceiver<S> {
    stream: S,
    context: CallContext,
    received: u64,
}

impl<S> ChunkReceiver<S>
where
    S: Stream<Item = Result<FileUploadRequest, Status>> + Unpin,
{
    pub fn new(stream: S, context: CallContext) -> Self {
        Self {
            stream,
            context,
            received: 0,
        }
    }

    /// `Ok(None)` once the sender closed the stream.
    pub async fn next_chunk(&mut self) -> Result<Option<FileUploadRequest>, UploadError> {
        let next = match self.context.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, self.stream.next())
                .await
                .map_err(|_| UploadError::DeadlineExceeded)?,
            None => self.stream.next().await,
        };
        match next {
            None => Ok(None),
            Some(Ok(request)) => {
                self.received += 1;
                Ok(Some(request))
            }
            Some(Err(status)) => Err(UploadError::from_receive(status)),
        }
    }

    pub fn received(&self) -> u64 {
        self.received
    }
}

/// Drives one upload stream into `assembler` and returns the base name and
/// size of the assembled file.
///
/// The file is closed on every return path, and synced to disk when the
/// stream ended cleanly. A failure to close the file is only reported when
/// nothing else went wrong first.
pub async fn receive_upload<S>(
    stream: S,
    context: CallContext,
    mut assembler: FileAssembler,
) -> Result<(String, u32), UploadError>
where
    S: Stream<Item = Result<FileUploadRequest, Status>> + Unpin,
{
    let mut receiver = ChunkReceiver::new(stream, context);
    let outcome = assemble(&mut receiver, &mut assembler).await;
    // a failed call skips the sync so the status goes out before the caller's deadline.
    let closed = match outcome {
        Ok(()) => assembler.finalize().await,
        Err(_) => assembler.close().await,
    };
    match (outcome, closed) {
        (Err(e), Err(close_error)) => {
            error!("closing upload after failure: {}", close_error);
            Err(e)
        }
        (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
        (Ok(()), Ok(())) => {
            debug!("upload stream ended after {} messages", receiver.received());
            assembler.result()
        }
    }
}

async fn assemble<S>(
    receiver: &mut ChunkReceiver<S>,
    assembler: &mut FileAssembler,
) -> Result<(), UploadError>
where
    S: Stream<Item = Result<FileUploadRequest, Status>> + Unpin,
{
    while let Some(request) = receiver.next_chunk().await? {
        assembler.ensure_open(&request.file_name).await?;
        assembler.write(&request.chunk).await?;
        debug!(
            "received a chunk of {} bytes, {} bytes so far",
            request.chunk.len(),
            assembler.bytes_written()
        );
    }
    Ok(())
}

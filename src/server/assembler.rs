// Copyright 2026 The Backuper Developers. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use log::{debug, warn};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};

use crate::common::{
    errors::UploadError,
    path::{base_name, resolve_destination},
};

enum State {
    Empty,
    Open(File),
    Closed,
}

/// Builds one destination file out of the chunks of one upload stream.
///
/// The file is opened when the first non-empty file name shows up. Payloads
/// that arrive before that are held in memory, up to `max_pending_bytes`,
/// and written first once the file exists.
pub struct FileAssembler {
    root: PathBuf,
    max_pending_bytes: usize,
    state: State,
    file_name: Option<String>,
    destination: Option<PathBuf>,
    pending: Vec<u8>,
    bytes_written: u64,
}

impl FileAssembler {
    pub fn new(root: impl Into<PathBuf>, max_pending_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_pending_bytes,
            state: State::Empty,
            file_name: None,
            destination: None,
            pending: Vec::new(),
            bytes_written: 0,
        }
    }

    pub async fn ensure_open(&mut self, file_name: &str) -> Result<(), UploadError> {
        if file_name.is_empty() {
            return Ok(());
        }
        if let Some(first) = &self.file_name {
            if first != file_name {
                warn!(
                    "ignoring file name {:?}, upload already targets {:?}",
                    file_name, first
                );
            }
            return Ok(());
        }
        if !matches!(self.state, State::Empty) {
            return Ok(());
        }

        let destination = resolve_destination(&self.root, file_name)?;
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
        }
        let file = File::create(&destination).await?;
        debug!("opened {:?} for upload", destination);

        self.file_name = Some(file_name.to_string());
        self.destination = Some(destination);
        self.state = State::Open(file);

        if !self.pending.is_empty() {
            let pending = std::mem::take(&mut self.pending);
            debug!("flushing {} bytes received before the file name", pending.len());
            self.write(&pending).await?;
        }
        Ok(())
    }

    pub async fn write(&mut self, payload: &[u8]) -> Result<(), UploadError> {
        match &mut self.state {
            State::Empty => {
                let held = self.pending.len() + payload.len();
                if held > self.max_pending_bytes {
                    return Err(UploadError::PendingOverflow(held, self.max_pending_bytes));
                }
                self.pending.extend_from_slice(payload);
            }
            State::Open(file) => {
                let total = self.bytes_written + payload.len() as u64;
                if total > u64::from(u32::MAX) {
                    return Err(UploadError::TooLarge);
                }
                file.write_all(payload).await?;
                self.bytes_written = total;
            }
            State::Closed => return Err(UploadError::Finalized),
        }
        Ok(())
    }

    /// Flushes, syncs and closes the file. Calling it again is a no-op.
    pub async fn finalize(&mut self) -> Result<(), UploadError> {
        self.shutdown(true).await
    }

    /// Closes the file without waiting for it to reach the disk, for uploads
    /// that already failed.
    pub async fn close(&mut self) -> Result<(), UploadError> {
        self.shutdown(false).await
    }

    async fn shutdown(&mut self, sync: bool) -> Result<(), UploadError> {
        match std::mem::replace(&mut self.state, State::Closed) {
            State::Open(mut file) => {
                file.flush().await?;
                if sync {
                    file.sync_all().await?;
                }
                debug!(
                    "closed {:?} after {} bytes",
                    self.destination, self.bytes_written
                );
            }
            State::Empty if !self.pending.is_empty() => {
                warn!(
                    "discarding {} bytes, upload never named a file",
                    self.pending.len()
                );
                self.pending.clear();
            }
            _ => {}
        }
        Ok(())
    }

    /// Base name of the destination and the number of bytes written to it.
    pub fn result(&self) -> Result<(String, u32), UploadError> {
        let destination = self
            .destination
            .as_ref()
            .ok_or(UploadError::MissingFileName)?;
        let size = u32::try_from(self.bytes_written).map_err(|_| UploadError::TooLarge)?;
        Ok((base_name(destination), size))
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, State::Open(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }
}

impl Drop for FileAssembler {
    fn drop(&mut self) {
        if let State::Open(_) = self.state {
            warn!(
                "upload to {:?} abandoned after {} bytes",
                self.destination, self.bytes_written
            );
            self.state = State::Closed;
        }
    }
}

#[cfg(test)]
mod tests {
    use tonic::Code;

    use super::FileAssembler;
    use crate::common::errors::UploadError;

    #[tokio::test]
    async fn test_assemble_in_order() {
        let root = tempfile::tempdir().unwrap();
        let mut assembler = FileAssembler::new(root.path(), 1024);
        assembler.ensure_open("a.bin").await.unwrap();
        assembler.write(&[0x01, 0x02]).await.unwrap();
        assembler.ensure_open("").await.unwrap();
        assembler.write(&[]).await.unwrap();
        assembler.write(&[0x03]).await.unwrap();
        assembler.finalize().await.unwrap();

        assert_eq!(assembler.result().unwrap(), ("a.bin".to_string(), 3));
        let data = std::fs::read(root.path().join("a.bin")).unwrap();
        assert_eq!(data, vec![0x01, 0x02, 0x03]);
    }

    #[tokio::test]
    async fn test_create_missing_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("storage").join("files");
        let mut assembler = FileAssembler::new(&root, 1024);
        assembler.ensure_open("backups/b.bin").await.unwrap();
        assembler.write(b"payload").await.unwrap();
        assembler.finalize().await.unwrap();

        assert_eq!(assembler.result().unwrap(), ("b.bin".to_string(), 7));
        assert!(root.is_dir());
        assert_eq!(std::fs::read(root.join("backups/b.bin")).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_truncate_existing_file() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("c.bin"), b"stale contents").unwrap();
        let mut assembler = FileAssembler::new(root.path(), 1024);
        assembler.ensure_open("c.bin").await.unwrap();
        assembler.write(b"new").await.unwrap();
        assembler.finalize().await.unwrap();
        assert_eq!(std::fs::read(root.path().join("c.bin")).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_flush_pending_payload() {
        let root = tempfile::tempdir().unwrap();
        let mut assembler = FileAssembler::new(root.path(), 1024);
        assembler.write(b"early ").await.unwrap();
        assert!(!assembler.is_open());
        assembler.ensure_open("d.txt").await.unwrap();
        assembler.write(b"late").await.unwrap();
        assembler.finalize().await.unwrap();

        assert_eq!(assembler.bytes_written(), 10);
        assert_eq!(std::fs::read(root.path().join("d.txt")).unwrap(), b"early late");
    }

    #[tokio::test]
    async fn test_pending_overflow() {
        let root = tempfile::tempdir().unwrap();
        let mut assembler = FileAssembler::new(root.path(), 4);
        assembler.write(&[0; 3]).await.unwrap();
        assert!(matches!(
            assembler.write(&[0; 2]).await,
            Err(UploadError::PendingOverflow(5, 4))
        ));
    }

    #[tokio::test]
    async fn test_missing_file_name() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("never-created");
        let mut assembler = FileAssembler::new(&root, 1024);
        assembler.write(b"orphan").await.unwrap();
        assembler.finalize().await.unwrap();

        assert!(assembler.is_closed());
        assert!(matches!(assembler.result(), Err(UploadError::MissingFileName)));
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_first_name_wins() {
        let root = tempfile::tempdir().unwrap();
        let mut assembler = FileAssembler::new(root.path(), 1024);
        assembler.ensure_open("first.bin").await.unwrap();
        assembler.write(b"1").await.unwrap();
        assembler.ensure_open("second.bin").await.unwrap();
        assembler.write(b"2").await.unwrap();
        assembler.finalize().await.unwrap();

        assert_eq!(assembler.result().unwrap(), ("first.bin".to_string(), 2));
        assert!(!root.path().join("second.bin").exists());
    }

    #[tokio::test]
    async fn test_reject_traversal() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("root");
        let mut assembler = FileAssembler::new(&root, 1024);
        assert!(matches!(
            assembler.ensure_open("../escape.bin").await,
            Err(UploadError::InvalidFileName(_))
        ));
        assert!(!assembler.is_open());
        assert!(!tmp.path().join("escape.bin").exists());
    }

    #[tokio::test]
    async fn test_finalize_twice() {
        let root = tempfile::tempdir().unwrap();
        let mut assembler = FileAssembler::new(root.path(), 1024);
        assembler.ensure_open("e.bin").await.unwrap();
        assembler.write(b"abc").await.unwrap();
        assembler.finalize().await.unwrap();
        assembler.finalize().await.unwrap();

        assert!(assembler.is_closed());
        assert!(matches!(
            assembler.write(b"d").await,
            Err(UploadError::Finalized)
        ));
        assert_eq!(assembler.result().unwrap(), ("e.bin".to_string(), 3));
    }

    #[tokio::test]
    async fn test_size_cap() {
        let root = tempfile::tempdir().unwrap();
        let mut assembler = FileAssembler::new(root.path(), 1024);
        assembler.ensure_open("huge.bin").await.unwrap();
        assembler.bytes_written = u64::from(u32::MAX) - 2;

        assert!(matches!(
            assembler.write(b"abc").await,
            Err(UploadError::TooLarge)
        ));
        assert_eq!(assembler.bytes_written(), u64::from(u32::MAX) - 2);

        assembler.write(b"ab").await.unwrap();
        assert_eq!(assembler.bytes_written(), u64::from(u32::MAX));
        assembler.close().await.unwrap();
        assert_eq!(assembler.result().unwrap(), ("huge.bin".to_string(), u32::MAX));
        assert_eq!(std::fs::read(root.path().join("huge.bin")).unwrap(), b"ab");
    }

    #[tokio::test]
    async fn test_unwritable_storage_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("occupied");
        std::fs::write(&root, b"a regular file").unwrap();
        let mut assembler = FileAssembler::new(&root, 1024);

        match assembler.ensure_open("a.bin").await {
            Err(e @ UploadError::StdIo(_)) => assert_eq!(e.code(), Code::Internal),
            other => panic!("unexpected result {:?}", other),
        }
        assert!(!assembler.is_open());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_write_failure() {
        // writes to /dev/full fail with ENOSPC.
        if !std::path::Path::new("/dev/full").exists() {
            return;
        }
        let mut assembler = FileAssembler::new("/dev", 1024);
        assembler.ensure_open("full").await.unwrap();
        let written = assembler.write(&[0u8; 8192]).await;
        let closed = assembler.finalize().await;
        let error = written.and(closed).unwrap_err();

        assert!(matches!(error, UploadError::StdIo(_)));
        assert_eq!(error.code(), Code::Internal);
        assert!(assembler.is_closed());
    }
}

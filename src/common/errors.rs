// Copyright 2026 The Backuper Developers. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0

use tonic::{Code, Status};

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("invalid file name: {0}")]
    InvalidFileName(String),

    #[error("upload stream carried no file name")]
    MissingFileName,

    #[error("{0} bytes arrived before the file name, limit is {1}")]
    PendingOverflow(usize, usize),

    #[error("upload exceeds the maximum reportable size of {} bytes", u32::MAX)]
    TooLarge,

    #[error("write after the upload was finalized")]
    Finalized,

    #[error("request is canceled")]
    Canceled,

    #[error("deadline is exceeded")]
    DeadlineExceeded,

    #[error("receive failed: {0}")]
    Receive(String),

    #[error(transparent)]
    StdIo(#[from] std::io::Error),
}

impl UploadError {
    /// Classifies a failed receive by the code the transport attached to it.
    pub fn from_receive(status: Status) -> Self {
        match status.code() {
            Code::Cancelled => UploadError::Canceled,
            Code::DeadlineExceeded => UploadError::DeadlineExceeded,
            _ => UploadError::Receive(status.message().to_string()),
        }
    }

    pub fn code(&self) -> Code {
        match self {
            UploadError::InvalidFileName(_)
            | UploadError::MissingFileName
            | UploadError::PendingOverflow(..) => Code::InvalidArgument,
            UploadError::TooLarge => Code::OutOfRange,
            UploadError::Canceled => Code::Cancelled,
            UploadError::DeadlineExceeded => Code::DeadlineExceeded,
            UploadError::Finalized | UploadError::Receive(_) | UploadError::StdIo(_) => {
                Code::Internal
            }
        }
    }
}

impl From<UploadError> for Status {
    fn from(error: UploadError) -> Self {
        Status::new(error.code(), error.to_string())
    }
}

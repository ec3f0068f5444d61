// Copyright 2026 The Backuper Developers. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0

use std::path::{Component, Path, PathBuf};

use super::errors::UploadError;

/// Joins a client supplied file name onto the storage root.
///
/// The name is untrusted: absolute paths, `..` segments and NUL bytes are
/// rejected, `.` segments are dropped. Intermediate directories are allowed,
/// so `backups/a.bin` lands in `<root>/backups/a.bin`.
pub fn resolve_destination(root: &Path, file_name: &str) -> Result<PathBuf, UploadError> {
    if file_name.contains('\0') {
        return Err(UploadError::InvalidFileName(file_name.escape_default().to_string()));
    }
    let mut relative = PathBuf::new();
    for component in Path::new(file_name).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(UploadError::InvalidFileName(file_name.to_string()));
            }
        }
    }
    if relative.as_os_str().is_empty() {
        return Err(UploadError::InvalidFileName(file_name.to_string()));
    }
    Ok(root.join(relative))
}

/// Final path component, as reported back to the sender.
pub fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

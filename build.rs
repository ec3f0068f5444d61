// Copyright 2026 The Backuper Developers. All rights reserved.
//
// SPDX-License-Identifier: Apache-2.0

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tonic_build::compile_protos("proto/upload.proto")?;
    Ok(())
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Re-encrypted keyring and firmware files.
//!
//! Each file is an 8-byte little-endian length followed by exactly that many
//! bytes of payload.

use anyhow::{bail, Context, Result};
use std::path::Path;

const LEN_SIZE: usize = std::mem::size_of::<u64>();

pub fn encode(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(LEN_SIZE + payload.len());
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

pub fn decode(data: &[u8]) -> Result<&[u8]> {
    let Some((len, payload)) = data.split_first_chunk::<LEN_SIZE>() else {
        bail!("artifact is {} bytes, too short for its length", data.len());
    };
    let len = u64::from_le_bytes(*len);
    if len != payload.len() as u64 {
        bail!(
            "artifact claims {len} bytes of payload but carries {}",
            payload.len()
        );
    }
    Ok(payload)
}

pub fn save(path: &Path, payload: &[u8]) -> Result<()> {
    std::fs::write(path, encode(payload))
        .with_context(|| format!("failed to write {}", path.display()))
}

pub fn load(path: &Path) -> Result<Vec<u8>> {
    let data = std::fs::read(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let payload = decode(&data)
        .with_context(|| format!("bad artifact {}", path.display()))?;
    Ok(payload.to_vec())
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Batch re-encryption of individual keyring and firmware files, ahead of
//! packaging them into a FIP.

use crate::artifact;
use crate::config::FilePair;
use anyhow::{anyhow, bail, Context, Result};
use drv_tsip_api::{
    reencrypted_len, FirmwareSlot, Tsip, TsipError, TsipSession,
    KEYRING_INPUT_SIZE, KEYRING_OUTPUT_SIZE, MAX_FIRMWARE_SLOTS,
};
use std::path::{Path, PathBuf};

/// Re-encrypts the keyring named by `pair`, returning the path written.
///
/// A keyring file shorter than the service's input is zero-padded; a longer
/// one is refused.
pub fn keyring_session<T: Tsip>(
    tsip: &mut T,
    dir: &Path,
    pair: &FilePair,
) -> Result<PathBuf> {
    let input_path = dir.join(&pair.input);
    println!("Load temporary encrypted keyring");
    println!("\t{}", input_path.display());
    let data = std::fs::read(&input_path)
        .with_context(|| format!("failed to read {}", input_path.display()))?;
    if data.len() > KEYRING_INPUT_SIZE {
        bail!(
            "{} is {} bytes; a keyring is at most {KEYRING_INPUT_SIZE}",
            input_path.display(),
            data.len()
        );
    }
    let mut input = [0u8; KEYRING_INPUT_SIZE];
    input[..data.len()].copy_from_slice(&data);

    println!("Update keyring session");
    let mut output = [0u8; KEYRING_OUTPUT_SIZE];
    let mut session = tsip.open_session().map_err(tsip_failed)?;
    session
        .update_keyring(&input, &mut output)
        .map_err(tsip_failed)?;
    drop(session);

    println!("Save the updated keyring to file");
    let output_path = dir.join(&pair.output);
    artifact::save(&output_path, &output)?;
    println!("\t{} ({} bytes)", output_path.display(), output.len() + 8);
    Ok(output_path)
}

/// Re-encrypts every firmware file named by `pairs` in a single request,
/// returning the paths written.
///
/// A missing input file is skipped: its slot stays empty, keeping the
/// others in position, and no output is written for it.
pub fn firmware_session<T: Tsip>(
    tsip: &mut T,
    dir: &Path,
    pairs: &[FilePair],
) -> Result<Vec<PathBuf>> {
    if pairs.len() > MAX_FIRMWARE_SLOTS {
        bail!(
            "{} firmware files, at most {MAX_FIRMWARE_SLOTS} per session",
            pairs.len()
        );
    }

    println!("Load temporary encrypted firmware");
    let mut inputs = Vec::with_capacity(pairs.len());
    for pair in pairs {
        let path = dir.join(&pair.input);
        if !path.exists() {
            println!("\tSkip => {} not found", path.display());
            inputs.push(None);
            continue;
        }
        println!("\t{}", path.display());
        let data = std::fs::read(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        inputs.push(Some(data));
    }

    let mut outputs = inputs
        .iter()
        .enumerate()
        .map(|(slot, input)| match input {
            None => Ok(vec![]),
            Some(data) => reencrypted_len(slot, data.len())
                .map(|len| vec![0; len])
                .context("firmware image too large"),
        })
        .collect::<Result<Vec<_>>>()?;

    println!("Update firmware session");
    let mut slots = inputs
        .iter()
        .zip(outputs.iter_mut())
        .map(|(input, output)| FirmwareSlot {
            input: input.as_deref().unwrap_or_default(),
            output,
        })
        .collect::<Vec<_>>();
    let mut session = tsip.open_session().map_err(tsip_failed)?;
    session.update_firmware(&mut slots).map_err(tsip_failed)?;
    drop(session);
    drop(slots);

    println!("Save the updated firmware to file");
    let mut written = vec![];
    for ((pair, input), output) in pairs.iter().zip(&inputs).zip(&outputs) {
        if input.is_none() {
            continue;
        }
        let path = dir.join(&pair.output);
        artifact::save(&path, output)?;
        println!("\t{} ({} bytes)", path.display(), output.len() + 8);
        written.push(path);
    }
    Ok(written)
}

fn tsip_failed(e: TsipError) -> anyhow::Error {
    anyhow!("TSIP request failed: {e:?}")
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host side of a firmware update.
//!
//! [`update`] drives the two-phase protocol against an FWU engine: size the
//! work area, then transcode and write. The [`prepare`] sessions produce the
//! re-encrypted keyring and firmware files that go into an update package.

pub mod artifact;
pub mod config;
pub mod prepare;

use anyhow::{Context, Result};
use drv_fwu_api::Fwu;
use std::path::Path;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The image held nothing to write.
    NothingToUpdate,
    /// `bytes` were written to the package region.
    Updated { bytes: usize },
}

/// Applies the update package `image`.
///
/// Both phases are handed the same `image`. On error nothing is known to
/// have reached flash; the update can be retried from the start.
pub fn update<F: Fwu>(fwu: &mut F, image: &[u8]) -> Result<Outcome> {
    let size = fwu
        .calc_work_size(image)
        .context("failed to size the work area")?;
    if size == 0 {
        println!("Nothing to update");
        return Ok(Outcome::NothingToUpdate);
    }

    let mut work = vec![0u8; size];
    fwu.firmware_update(image, &mut work)
        .context("firmware update failed")?;

    println!("Update package written ({size} bytes)");
    println!("Reset the system to complete the firmware update");
    Ok(Outcome::Updated { bytes: size })
}

/// Reads an update package from `path` and applies it.
pub fn update_file<F: Fwu>(fwu: &mut F, path: &Path) -> Result<Outcome> {
    let image = std::fs::read(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    update(fwu, &image)
}

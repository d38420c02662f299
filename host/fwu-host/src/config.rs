// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::{bail, Context, Result};
use drv_tsip_api::MAX_FIRMWARE_SLOTS;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// A `machine.toml` file: which temporarily encrypted files a board's
/// update is prepared from, and where the re-encrypted results go. Relative
/// paths are resolved against the directory handed to the preparation
/// sessions.
///
/// ```toml
/// name = "ek874"
///
/// [keyring]
/// input = "Keyring-ek874_Enc.bin"
/// output = "Keyring-ek874_fwu.bin"
///
/// [[firmware]]
/// input = "bl31-ek874_Enc.bin"
/// output = "bl31-ek874_fwu.bin"
/// ```
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Machine {
    pub name: String,
    pub keyring: FilePair,
    /// In slot order.
    #[serde(default)]
    pub firmware: Vec<FilePair>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FilePair {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl Machine {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        contents
            .parse()
            .with_context(|| format!("bad machine file {}", path.display()))
    }
}

impl std::str::FromStr for Machine {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let machine: Self = toml::from_str(s)?;
        if machine.firmware.len() > MAX_FIRMWARE_SLOTS {
            bail!(
                "{} firmware files listed, at most {MAX_FIRMWARE_SLOTS} fit in \
                 one session",
                machine.firmware.len()
            );
        }
        Ok(machine)
    }
}

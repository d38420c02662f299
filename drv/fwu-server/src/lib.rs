// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Firmware update engine.
//!
//! Transcodes a chain of FIP blobs (plain, keyring and encrypted firmware
//! containers) into their device-bound form, re-encrypting through the TSIP,
//! and writes the result to the FWU package region of SPI flash.
//!
//! The engine keeps no state between requests: each call parses its input
//! afresh. Re-encryption and flash sessions are opened for a single call
//! and closed straight after.

#![cfg_attr(not(test), no_std)]

mod chain;
mod config;
mod container;
mod gate;
mod transcode;

pub use config::FlashRegion;
pub use container::{BlobSize, Container, FIRMWARE_LEN_PREFIX};

use drv_fwu_api::{Fwu, FwuError};
use drv_spi_flash_api::SpiFlash;
use drv_tsip_api::Tsip;
use ringbuf::{ringbuf, ringbuf_entry_root};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Trace {
    None,
    WorkSize(usize),
    Blob {
        container: Container,
        load_size: usize,
        out_size: usize,
    },
    EndOfFile,
    KeyringReencrypted {
        index: usize,
    },
    FirmwareBatch {
        slots: usize,
    },
    FlashWrite {
        offset: u32,
        len: usize,
    },
    Failed(FwuError),
}

ringbuf!(Trace, 32, Trace::None);

pub struct FwuServer<T, F> {
    tsip: T,
    flash: F,
    region: FlashRegion,
}

impl<T: Tsip, F: SpiFlash> FwuServer<T, F> {
    pub fn new(tsip: T, flash: F) -> Self {
        Self {
            tsip,
            flash,
            region: FlashRegion::FWU_PACKAGE,
        }
    }

    pub fn with_region(mut self, region: FlashRegion) -> Self {
        self.region = region;
        self
    }

    pub fn region(&self) -> FlashRegion {
        self.region
    }

    pub fn tsip(&self) -> &T {
        &self.tsip
    }

    pub fn flash(&self) -> &F {
        &self.flash
    }

    pub fn into_parts(self) -> (T, F) {
        (self.tsip, self.flash)
    }

    fn update(
        &mut self,
        input: &[u8],
        work: &mut [u8],
    ) -> Result<(), FwuError> {
        if input.is_empty() || work.is_empty() {
            return Err(FwuError::BadParameters);
        }
        let len = chain::transcode(input, work, &mut self.tsip)?;
        let image = work.get(..len).ok_or(FwuError::WorkAreaTooSmall)?;
        gate::write_package(&mut self.flash, self.region, image)
    }
}

impl<T: Tsip, F: SpiFlash> Fwu for FwuServer<T, F> {
    fn calc_work_size(&mut self, input: &[u8]) -> Result<usize, FwuError> {
        match chain::calc_work_size(input) {
            Ok(size) => {
                ringbuf_entry_root!(Trace::WorkSize(size));
                Ok(size)
            }
            Err(e) => {
                ringbuf_entry_root!(Trace::Failed(e));
                Err(e)
            }
        }
    }

    fn firmware_update(
        &mut self,
        input: &[u8],
        work: &mut [u8],
    ) -> Result<(), FwuError> {
        self.update(input, work).inspect_err(|&e| {
            ringbuf_entry_root!(Trace::Failed(e));
        })
    }
}

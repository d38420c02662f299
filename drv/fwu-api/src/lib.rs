// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! API for the firmware update (FWU) engine.
//!
//! An update is two requests against the same input image:
//!
//! 1. [`Fwu::calc_work_size`] walks every FIP blob in the image and returns
//!    the exact size of the transcoded output. Zero means there is nothing
//!    to update.
//! 2. [`Fwu::firmware_update`] transcodes the image into a work area of that
//!    size and, only if every blob succeeded, writes the result to flash.
//!
//! Any error aborts the whole update. Flash is never written after a
//! failure, so its previous contents remain authoritative.

#![cfg_attr(not(test), no_std)]

use core::fmt;

pub use drv_spi_flash_api::FlashError;
pub use drv_tsip_api::TsipError;
pub use fip::FormatError;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FwuError {
    /// Empty input image or work area.
    BadParameters,
    /// Malformed table of contents.
    Format(FormatError),
    /// TOC header `name` that selects no known container kind.
    UnknownContainer(u32),
    /// Non-empty keyring payload shorter than the service's input size.
    BadKeyringSize,
    /// More firmware entries in one blob than fit in a single request.
    TooManyFirmwareEntries,
    /// Output does not fit in the caller's work area.
    WorkAreaTooSmall,
    /// Output size is not representable.
    SizeOverflow,
    /// Output does not fit in the flash region.
    FlashRegionExceeded,
    Tsip(TsipError),
    Flash(FlashError),
}

/// Broad classes of [`FwuError`]. None of them is retried by the engine.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// The input image is not a valid update package.
    Structural,
    /// The output would not fit where it must go.
    Capacity,
    /// A collaborating service reported failure.
    Service,
}

impl FwuError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BadParameters
            | Self::Format(_)
            | Self::UnknownContainer(_)
            | Self::BadKeyringSize
            | Self::TooManyFirmwareEntries => ErrorKind::Structural,
            Self::WorkAreaTooSmall
            | Self::SizeOverflow
            | Self::FlashRegionExceeded => ErrorKind::Capacity,
            Self::Tsip(_) | Self::Flash(_) => ErrorKind::Service,
        }
    }
}

impl From<FormatError> for FwuError {
    fn from(e: FormatError) -> Self {
        Self::Format(e)
    }
}

impl From<TsipError> for FwuError {
    fn from(e: TsipError) -> Self {
        Self::Tsip(e)
    }
}

impl From<FlashError> for FwuError {
    fn from(e: FlashError) -> Self {
        Self::Flash(e)
    }
}

impl fmt::Display for FwuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadParameters => write!(f, "empty input or work area"),
            Self::Format(e) => write!(f, "malformed FIP: {e:?}"),
            Self::UnknownContainer(name) => {
                write!(f, "unknown FIP name {name:#010x}")
            }
            Self::BadKeyringSize => write!(f, "keyring payload too short"),
            Self::TooManyFirmwareEntries => {
                write!(f, "too many firmware entries in one FIP")
            }
            Self::WorkAreaTooSmall => write!(f, "work area too small"),
            Self::SizeOverflow => write!(f, "output size overflows"),
            Self::FlashRegionExceeded => {
                write!(f, "output exceeds the flash region")
            }
            Self::Tsip(e) => write!(f, "re-encryption failed: {e:?}"),
            Self::Flash(e) => write!(f, "flash write failed: {e:?}"),
        }
    }
}

impl core::error::Error for FwuError {}

/// The two-phase update protocol.
pub trait Fwu {
    /// Returns the number of bytes [`Fwu::firmware_update`] will produce
    /// for `input`.
    fn calc_work_size(&mut self, input: &[u8]) -> Result<usize, FwuError>;

    /// Transcodes `input` into `work` and writes the result to flash.
    ///
    /// `work` must be at least as long as `calc_work_size` reported for the
    /// same `input`. On error its contents are unspecified.
    fn firmware_update(
        &mut self,
        input: &[u8],
        work: &mut [u8],
    ) -> Result<(), FwuError>;
}

impl<T: Fwu + ?Sized> Fwu for &mut T {
    fn calc_work_size(&mut self, input: &[u8]) -> Result<usize, FwuError> {
        (**self).calc_work_size(input)
    }

    fn firmware_update(
        &mut self,
        input: &[u8],
        work: &mut [u8],
    ) -> Result<(), FwuError> {
        (**self).firmware_update(input, work)
    }
}

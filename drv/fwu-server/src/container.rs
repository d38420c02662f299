// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Container kinds and their output layouts.
//!
//! The size pass and the transform pass both run [`Container::lay_out`];
//! the size pass simply discards the placements. That keeps the two in
//! lock-step: whatever size is reported is exactly what gets written.

use core::ops::Range;
use drv_fwu_api::FwuError;
use drv_tsip_api::{
    reencrypted_len, KEYRING_INPUT_SIZE, KEYRING_OUTPUT_SIZE,
    MAX_FIRMWARE_SLOTS,
};
use fip::{name, toc_len, Toc, TocEntry, TocHeader};

/// Bytes in front of each re-encrypted firmware image holding its length.
pub const FIRMWARE_LEN_PREFIX: usize = core::mem::size_of::<u64>();

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Container {
    /// Copied through byte for byte.
    Plain,
    /// Each entry re-encrypted on its own.
    Keyring,
    /// Entries re-encrypted together in one batch.
    Firmware,
}

impl Container {
    pub fn from_name(name: u32) -> Result<Self, FwuError> {
        match name {
            name::PLAIN => Ok(Self::Plain),
            name::KEYRING => Ok(Self::Keyring),
            name::BOOT_FW | name::NS_BL2U => Ok(Self::Firmware),
            other => Err(FwuError::UnknownContainer(other)),
        }
    }

    /// Works out where every entry of `toc` lands in the output blob,
    /// handing each to `place` in TOC order.
    ///
    /// Everything that makes a blob invalid is detected before the first
    /// call to `place`.
    pub fn lay_out(
        self,
        toc: &Toc<'_>,
        mut place: impl FnMut(Placement) -> Result<(), FwuError>,
    ) -> Result<BlobSize, FwuError> {
        let blob_len = toc.blob().len();
        match self {
            Self::Plain => {
                // Validate everything before placing anything.
                for entry in toc.entries() {
                    entry.payload(blob_len)?;
                }
                for (index, entry) in toc.entries().enumerate() {
                    let source = entry.payload(blob_len)?;
                    place(Placement {
                        index,
                        record: record_offset(index),
                        entry,
                        output: source.clone(),
                        source,
                    })?;
                }
                Ok(BlobSize {
                    load_size: blob_len,
                    out_size: blob_len,
                    toc_len: toc_len(toc.len()),
                })
            }

            Self::Keyring => {
                // Empty entries carry no keyring and are left out of the
                // output table altogether.
                let mut kept = 0;
                for entry in toc.entries() {
                    if entry.payload(blob_len)?.is_some() {
                        if entry.size.get() < KEYRING_INPUT_SIZE as u64 {
                            return Err(FwuError::BadKeyringSize);
                        }
                        kept += 1;
                    }
                }

                let toc_len = toc_len(kept);
                let mut cursor = toc_len;
                let mut record = 0;
                for (index, entry) in toc.entries().enumerate() {
                    let Some(payload) = entry.payload(blob_len)? else {
                        continue;
                    };
                    let source =
                        payload.start..payload.start + KEYRING_INPUT_SIZE;
                    let output = span(cursor, KEYRING_OUTPUT_SIZE)?;
                    cursor = output.end;
                    place(Placement {
                        index,
                        record: record_offset(record),
                        entry: entry.relocated(&output),
                        source: Some(source),
                        output: Some(output),
                    })?;
                    record += 1;
                }
                Ok(BlobSize {
                    load_size: blob_len,
                    out_size: cursor,
                    toc_len,
                })
            }

            Self::Firmware => {
                if toc.len() > MAX_FIRMWARE_SLOTS {
                    return Err(FwuError::TooManyFirmwareEntries);
                }
                for entry in toc.entries() {
                    entry.payload(blob_len)?;
                }

                // Every entry keeps its slot, empty or not, so that slot
                // numbers line up with TOC order.
                let toc_len = toc_len(toc.len());
                let mut cursor = toc_len;
                for (index, entry) in toc.entries().enumerate() {
                    let source = entry.payload(blob_len)?;
                    let (entry, output) = match &source {
                        None => (entry, None),
                        Some(payload) => {
                            let len = reencrypted_len(index, payload.len())
                                .and_then(|n| {
                                    n.checked_add(FIRMWARE_LEN_PREFIX)
                                })
                                .ok_or(FwuError::SizeOverflow)?;
                            let output = span(cursor, len)?;
                            cursor = output.end;
                            (entry.relocated(&output), Some(output))
                        }
                    };
                    place(Placement {
                        index,
                        record: record_offset(index),
                        entry,
                        source,
                        output,
                    })?;
                }
                Ok(BlobSize {
                    load_size: blob_len,
                    out_size: cursor,
                    toc_len,
                })
            }
        }
    }
}

/// Where one TOC entry goes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Placement {
    /// Position of the entry in the input TOC.
    pub index: usize,
    /// Offset of the entry's record in the output blob.
    pub record: usize,
    /// The record as it appears in the output.
    pub entry: TocEntry,
    /// Bytes of the input blob to transcode, if any.
    pub source: Option<Range<usize>>,
    /// Bytes of the output blob they turn into. For firmware this includes
    /// the length prefix.
    pub output: Option<Range<usize>>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BlobSize {
    /// Bytes of input consumed.
    pub load_size: usize,
    /// Bytes of output produced.
    pub out_size: usize,
    /// Bytes of the output taken up by the header, records and terminator.
    pub toc_len: usize,
}

impl BlobSize {
    /// Offset of the terminator record in the output blob.
    pub fn terminator(&self) -> usize {
        self.toc_len - TocEntry::SIZE
    }
}

fn record_offset(index: usize) -> usize {
    TocHeader::SIZE + index * TocEntry::SIZE
}

fn span(start: usize, len: usize) -> Result<Range<usize>, FwuError> {
    let end = start.checked_add(len).ok_or(FwuError::SizeOverflow)?;
    Ok(start..end)
}

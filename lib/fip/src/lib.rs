// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Firmware Image Package (FIP) table-of-contents format.
//!
//! A FIP blob is laid out as:
//!
//! ```text
//! +-----------+---------+---------+-----+------------+----------------+
//! | TocHeader | TocEntry| TocEntry| ... | terminator | payload region |
//! +-----------+---------+---------+-----+------------+----------------+
//! ```
//!
//! The terminator is an entry whose UUID is all zeroes. Its `offset_address`
//! is the length of the whole blob, which is how a reader finds the start of
//! the next blob when several are concatenated. Only the header's end-of-file
//! flag says that no further blob follows.
//!
//! Everything in here treats its input as untrusted: nothing is indexed
//! without a bounds check, and a malformed table is rejected rather than
//! truncated.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

use core::ops::Range;
use static_assertions::const_assert_eq;
use zerocopy::byteorder::little_endian::{U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

#[cfg(any(test, feature = "std"))]
mod builder;
#[cfg(any(test, feature = "std"))]
pub use builder::FipBuilder;

/// Values of [`TocHeader::name`], which select how a blob is transcoded.
pub mod name {
    /// Payloads are copied through untouched.
    pub const PLAIN: u32 = 0xaa64_0001;
    /// Payloads are temporarily encrypted keyrings.
    pub const KEYRING: u32 = 0xaa64_0011;
    /// Payloads are temporarily encrypted boot firmware (BL31, TEE, ...).
    pub const BOOT_FW: u32 = 0xaa64_0021;
    /// Payloads are temporarily encrypted non-secure BL2U firmware.
    pub const NS_BL2U: u32 = 0xaa64_0031;
}

/// Set in [`TocHeader::flags`] on the last blob of a chain.
pub const FLAGS_END_OF_FILE: u64 = 0x8000 << 32;

/// Errors produced while walking a table of contents.
#[derive(Copy, Clone, Debug, Eq, PartialEq, num_derive::FromPrimitive)]
#[repr(u32)]
pub enum FormatError {
    /// Not enough bytes remain for a TOC header.
    Truncated = 1,
    /// No terminator entry before the end of the input.
    MissingTerminator,
    /// The terminator's length is shorter than the TOC itself or runs past
    /// the end of the input.
    BadBlobLength,
    /// An entry's payload does not lie within its blob.
    EntryOutOfBounds,
}

#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    Eq,
    PartialEq,
    FromBytes,
    IntoBytes,
    Immutable,
    KnownLayout,
    Unaligned,
)]
#[repr(C)]
pub struct TocHeader {
    pub name: U32,
    pub serial_number: U32,
    pub flags: U64,
}

impl TocHeader {
    pub const SIZE: usize = core::mem::size_of::<Self>();

    pub fn name(&self) -> u32 {
        self.name.get()
    }

    pub fn is_end_of_file(&self) -> bool {
        self.flags.get() & FLAGS_END_OF_FILE != 0
    }
}

#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    Eq,
    PartialEq,
    FromBytes,
    IntoBytes,
    Immutable,
    KnownLayout,
    Unaligned,
)]
#[repr(transparent)]
pub struct Uuid(pub [u8; 16]);

impl Uuid {
    /// Reserved for the terminator entry.
    pub const NULL: Self = Self([0; 16]);

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }
}

#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    Eq,
    PartialEq,
    FromBytes,
    IntoBytes,
    Immutable,
    KnownLayout,
    Unaligned,
)]
#[repr(C)]
pub struct TocEntry {
    pub uuid: Uuid,
    /// Payload offset from the start of the blob. On the terminator, the
    /// length of the whole blob.
    pub offset_address: U64,
    /// Payload length; zero means the entry carries no payload.
    pub size: U64,
    pub flags: U64,
}

const_assert_eq!(TocHeader::SIZE, 16);
const_assert_eq!(TocEntry::SIZE, 40);

impl TocEntry {
    pub const SIZE: usize = core::mem::size_of::<Self>();

    pub fn is_terminator(&self) -> bool {
        self.uuid.is_null()
    }

    /// Returns a copy of this entry pointing at `range` instead.
    pub fn relocated(&self, range: &Range<usize>) -> Self {
        Self {
            offset_address: U64::new(range.start as u64),
            size: U64::new(range.len() as u64),
            ..*self
        }
    }

    /// Byte range of this entry's payload within a blob of `blob_len` bytes,
    /// or `None` if the entry is empty.
    pub fn payload(
        &self,
        blob_len: usize,
    ) -> Result<Option<Range<usize>>, FormatError> {
        if self.size.get() == 0 {
            return Ok(None);
        }
        let start = usize::try_from(self.offset_address.get())
            .map_err(|_| FormatError::EntryOutOfBounds)?;
        let len = usize::try_from(self.size.get())
            .map_err(|_| FormatError::EntryOutOfBounds)?;
        match start.checked_add(len) {
            Some(end) if end <= blob_len => Ok(Some(start..end)),
            _ => Err(FormatError::EntryOutOfBounds),
        }
    }
}

/// Length of a TOC holding `entries` entries plus the terminator.
pub const fn toc_len(entries: usize) -> usize {
    TocHeader::SIZE + (entries + 1) * TocEntry::SIZE
}

/// A validated table of contents for the blob at the front of some input.
#[derive(Copy, Clone, Debug)]
pub struct Toc<'a> {
    header: TocHeader,
    /// The entry records, not including the terminator.
    entries: &'a [u8],
    terminator: TocEntry,
    blob: &'a [u8],
}

impl<'a> Toc<'a> {
    /// Walks the TOC at the start of `data`.
    ///
    /// `data` may run past the end of this blob (into the blobs chained after
    /// it); entries and the blob itself are bounded by `data.len()`.
    pub fn parse(data: &'a [u8]) -> Result<Self, FormatError> {
        let (header, mut rest) = TocHeader::read_from_prefix(data)
            .map_err(|_| FormatError::Truncated)?;

        let mut count = 0;
        let terminator = loop {
            // A record that would read past the end of the input means we
            // ran out of room before finding the terminator.
            let (entry, next) = TocEntry::read_from_prefix(rest)
                .map_err(|_| FormatError::MissingTerminator)?;
            if entry.is_terminator() {
                break entry;
            }
            count += 1;
            rest = next;
        };

        let blob_len = usize::try_from(terminator.offset_address.get())
            .map_err(|_| FormatError::BadBlobLength)?;
        if blob_len < toc_len(count) || blob_len > data.len() {
            return Err(FormatError::BadBlobLength);
        }

        let entries_end = TocHeader::SIZE + count * TocEntry::SIZE;
        Ok(Self {
            header,
            entries: &data[TocHeader::SIZE..entries_end],
            terminator,
            blob: &data[..blob_len],
        })
    }

    pub fn header(&self) -> &TocHeader {
        &self.header
    }

    pub fn terminator(&self) -> &TocEntry {
        &self.terminator
    }

    /// Number of entries, not counting the terminator.
    pub fn len(&self) -> usize {
        self.entries.len() / TocEntry::SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The whole blob: TOC and payload region. Its length is the
    /// terminator's `offset_address`.
    pub fn blob(&self) -> &'a [u8] {
        self.blob
    }

    /// Entries in TOC order, not including the terminator.
    pub fn entries(&self) -> impl Iterator<Item = TocEntry> + 'a {
        self.entries
            .chunks_exact(TocEntry::SIZE)
            .filter_map(|record| TocEntry::read_from_bytes(record).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: Uuid = Uuid([0xa; 16]);
    const B: Uuid = Uuid([0xb; 16]);

    #[test]
    fn walks_to_terminator() {
        let fip = FipBuilder::new(name::PLAIN)
            .entry(A, b"hello".to_vec())
            .entry(B, Vec::new())
            .build();

        let toc = Toc::parse(&fip).unwrap();
        assert_eq!(toc.len(), 2);
        assert_eq!(toc.header().name(), name::PLAIN);
        assert_eq!(toc.blob().len(), fip.len());
        assert_eq!(toc.terminator().offset_address.get(), fip.len() as u64);

        let entries: Vec<_> = toc.entries().collect();
        assert_eq!(entries[0].uuid, A);
        let payload = entries[0].payload(fip.len()).unwrap().unwrap();
        assert_eq!(&fip[payload], b"hello");

        // An empty entry still occupies a slot but has no payload.
        assert_eq!(entries[1].uuid, B);
        assert_eq!(entries[1].payload(fip.len()), Ok(None));
    }

    #[test]
    fn blob_is_bounded_by_terminator() {
        let first = FipBuilder::new(name::PLAIN).entry(A, vec![1; 8]).build();
        let second = FipBuilder::new(name::PLAIN).end_of_file().build();
        let chain = [first.clone(), second].concat();

        let toc = Toc::parse(&chain).unwrap();
        assert_eq!(toc.blob(), &first[..]);
        assert!(!toc.header().is_end_of_file());

        let toc = Toc::parse(&chain[first.len()..]).unwrap();
        assert!(toc.is_empty());
        assert!(toc.header().is_end_of_file());
    }

    #[test]
    fn rejects_short_header() {
        assert_eq!(
            Toc::parse(&[0u8; TocHeader::SIZE - 1]).unwrap_err(),
            FormatError::Truncated
        );
    }

    #[test]
    fn rejects_missing_terminator() {
        let fip = FipBuilder::new(name::PLAIN).entry(A, vec![0; 4]).build();

        // Chop the table off part way through the terminator record.
        let cut = toc_len(1) - 1;
        assert_eq!(
            Toc::parse(&fip[..cut]).unwrap_err(),
            FormatError::MissingTerminator
        );

        // Header followed by nothing but non-null records.
        let mut bogus = vec![0u8; TocHeader::SIZE];
        bogus.extend_from_slice(&[0xff; TocEntry::SIZE * 3]);
        assert_eq!(
            Toc::parse(&bogus).unwrap_err(),
            FormatError::MissingTerminator
        );
    }

    #[test]
    fn rejects_bad_blob_length() {
        let mut fip = FipBuilder::new(name::PLAIN).entry(A, vec![0; 4]).build();
        let at = TocHeader::SIZE + TocEntry::SIZE + 16;

        // Shorter than the table itself; would stall a chained walk.
        fip[at..at + 8].copy_from_slice(&0u64.to_le_bytes());
        assert_eq!(
            Toc::parse(&fip).unwrap_err(),
            FormatError::BadBlobLength
        );

        // Longer than the input.
        let past = fip.len() as u64 + 1;
        fip[at..at + 8].copy_from_slice(&past.to_le_bytes());
        assert_eq!(
            Toc::parse(&fip).unwrap_err(),
            FormatError::BadBlobLength
        );
    }

    #[test]
    fn payload_must_fit_in_blob() {
        let entry = TocEntry {
            uuid: A,
            offset_address: U64::new(100),
            size: U64::new(28),
            flags: U64::new(0),
        };
        assert_eq!(entry.payload(128), Ok(Some(100..128)));
        assert_eq!(entry.payload(127), Err(FormatError::EntryOutOfBounds));

        let huge = TocEntry {
            size: U64::new(u64::MAX),
            ..entry
        };
        assert_eq!(huge.payload(128), Err(FormatError::EntryOutOfBounds));
    }

    #[test]
    fn end_of_file_flag_lives_in_upper_word() {
        let header = TocHeader {
            flags: U64::new(0x8000),
            ..TocHeader::default()
        };
        assert!(!header.is_end_of_file());
        let header = TocHeader {
            flags: U64::new(FLAGS_END_OF_FILE),
            ..header
        };
        assert!(header.is_end_of_file());
    }
}

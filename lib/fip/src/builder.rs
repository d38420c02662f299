// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Assembles FIP blobs, for tests and host-side tooling.

use crate::{toc_len, TocEntry, TocHeader, Uuid, FLAGS_END_OF_FILE};
use zerocopy::byteorder::little_endian::{U32, U64};
use zerocopy::IntoBytes;

#[derive(Clone, Debug)]
pub struct FipBuilder {
    header: TocHeader,
    entries: Vec<(Uuid, Vec<u8>)>,
}

impl FipBuilder {
    pub fn new(name: u32) -> Self {
        Self {
            header: TocHeader {
                name: U32::new(name),
                serial_number: U32::new(0),
                flags: U64::new(0),
            },
            entries: Vec::new(),
        }
    }

    pub fn serial_number(mut self, serial: u32) -> Self {
        self.header.serial_number = U32::new(serial);
        self
    }

    /// Marks this as the last blob in a chain.
    pub fn end_of_file(mut self) -> Self {
        let flags = self.header.flags.get() | FLAGS_END_OF_FILE;
        self.header.flags = U64::new(flags);
        self
    }

    /// Appends an entry. An empty `payload` produces an entry with size 0.
    pub fn entry(mut self, uuid: Uuid, payload: Vec<u8>) -> Self {
        assert!(!uuid.is_null(), "the null UUID marks the terminator");
        self.entries.push((uuid, payload));
        self
    }

    /// Lays out the TOC followed by each non-empty payload, in order and
    /// without padding.
    pub fn build(&self) -> Vec<u8> {
        let mut toc = Vec::new();
        toc.extend_from_slice(self.header.as_bytes());

        let mut payloads = Vec::new();
        let base = toc_len(self.entries.len());
        for (uuid, payload) in &self.entries {
            let offset = if payload.is_empty() {
                0
            } else {
                base + payloads.len()
            };
            let entry = TocEntry {
                uuid: *uuid,
                offset_address: U64::new(offset as u64),
                size: U64::new(payload.len() as u64),
                flags: U64::new(0),
            };
            toc.extend_from_slice(entry.as_bytes());
            payloads.extend_from_slice(payload);
        }

        let terminator = TocEntry {
            uuid: Uuid::NULL,
            offset_address: U64::new((base + payloads.len()) as u64),
            ..TocEntry::default()
        };
        toc.extend_from_slice(terminator.as_bytes());
        toc.extend_from_slice(&payloads);
        toc
    }
}

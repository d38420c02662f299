// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Walking a chain of concatenated FIP blobs.

use crate::container::{BlobSize, Container};
use crate::transcode::transcode_blob;
use crate::Trace;
use drv_fwu_api::FwuError;
use drv_tsip_api::Tsip;
use fip::Toc;
use ringbuf::ringbuf_entry_root;

/// Iterates over the blobs at the front of an input image.
///
/// Stops after a blob whose header carries the end-of-file flag, when the
/// input is used up, or after yielding an error.
pub struct Blobs<'a> {
    rest: &'a [u8],
    done: bool,
}

impl<'a> Blobs<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            rest: input,
            done: input.is_empty(),
        }
    }
}

impl<'a> Iterator for Blobs<'a> {
    type Item = Result<(Container, Toc<'a>), FwuError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let r = Toc::parse(self.rest)
            .map_err(FwuError::from)
            .and_then(|toc| {
                let kind = Container::from_name(toc.header().name())?;
                Ok((kind, toc))
            });
        match &r {
            Ok((_, toc)) => {
                // A TOC is never empty, so this always makes progress.
                self.rest = &self.rest[toc.blob().len()..];
                if toc.header().is_end_of_file() {
                    ringbuf_entry_root!(Trace::EndOfFile);
                    self.done = true;
                } else {
                    self.done = self.rest.is_empty();
                }
            }
            Err(_) => self.done = true,
        }
        Some(r)
    }
}

/// Size pass: total bytes the transform pass will produce for `input`.
pub fn calc_work_size(input: &[u8]) -> Result<usize, FwuError> {
    let mut total = 0usize;
    for blob in Blobs::new(input) {
        let (container, toc) = blob?;
        let size = container.lay_out(&toc, |_| Ok(()))?;
        trace_blob(container, &size);
        total = total
            .checked_add(size.out_size)
            .ok_or(FwuError::SizeOverflow)?;
    }
    Ok(total)
}

/// Transform pass: transcodes every blob of `input` into `work`, back to
/// back, returning the number of bytes written.
pub fn transcode<T: Tsip>(
    input: &[u8],
    work: &mut [u8],
    tsip: &mut T,
) -> Result<usize, FwuError> {
    let mut written = 0usize;
    for blob in Blobs::new(input) {
        let (container, toc) = blob?;
        let out = work
            .get_mut(written..)
            .ok_or(FwuError::WorkAreaTooSmall)?;
        let size = transcode_blob(container, &toc, out, tsip)?;
        trace_blob(container, &size);
        written = written
            .checked_add(size.out_size)
            .ok_or(FwuError::SizeOverflow)?;
    }
    Ok(written)
}

fn trace_blob(container: Container, size: &BlobSize) {
    ringbuf_entry_root!(Trace::Blob {
        container,
        load_size: size.load_size,
        out_size: size.out_size,
    });
}

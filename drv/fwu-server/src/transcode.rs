// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transcoding of a single FIP blob into the work area.

use crate::container::{BlobSize, Container, Placement, FIRMWARE_LEN_PREFIX};
use crate::Trace;
use core::ops::Range;
use drv_fwu_api::FwuError;
use drv_tsip_api::{
    FirmwareSlot, Tsip, TsipSession, KEYRING_INPUT_SIZE, KEYRING_OUTPUT_SIZE,
    MAX_FIRMWARE_SLOTS,
};
use fip::Toc;
use ringbuf::ringbuf_entry_root;
use zerocopy::byteorder::little_endian::U64;
use zerocopy::IntoBytes;

/// Writes the transcoded form of `toc`'s blob to the front of `out`.
///
/// Fails with `WorkAreaTooSmall` before writing anything if `out` cannot
/// hold the whole result.
pub fn transcode_blob<T: Tsip>(
    container: Container,
    toc: &Toc<'_>,
    out: &mut [u8],
    tsip: &mut T,
) -> Result<BlobSize, FwuError> {
    let size = container.lay_out(toc, |_| Ok(()))?;
    let out = out
        .get_mut(..size.out_size)
        .ok_or(FwuError::WorkAreaTooSmall)?;
    out.fill(0);

    put(out, 0, toc.header().as_bytes())?;
    let blob = toc.blob();
    match container {
        Container::Plain => {
            container.lay_out(toc, |p| {
                put(out, p.record, p.entry.as_bytes())?;
                if let (Some(source), Some(output)) = (p.source, p.output) {
                    put(out, output.start, input(blob, source)?)?;
                }
                Ok(())
            })?;
        }
        Container::Keyring => {
            container.lay_out(toc, |p| {
                put(out, p.record, p.entry.as_bytes())?;
                if let (Some(source), Some(output)) = (p.source, p.output) {
                    let output = out
                        .get_mut(output)
                        .ok_or(FwuError::WorkAreaTooSmall)?;
                    reencrypt_keyring(tsip, input(blob, source)?, output)?;
                    ringbuf_entry_root!(Trace::KeyringReencrypted {
                        index: p.index
                    });
                }
                Ok(())
            })?;
        }
        Container::Firmware => {
            let mut routes: [Option<Route>; MAX_FIRMWARE_SLOTS] =
                Default::default();
            container.lay_out(toc, |p: Placement| {
                put(out, p.record, p.entry.as_bytes())?;
                if let (Some(source), Some(output)) = (p.source, p.output) {
                    let reenc = output.len() - FIRMWARE_LEN_PREFIX;
                    put(out, output.start, U64::new(reenc as u64).as_bytes())?;
                    let route = routes
                        .get_mut(p.index)
                        .ok_or(FwuError::TooManyFirmwareEntries)?;
                    *route = Some(Route {
                        source,
                        output: output.start + FIRMWARE_LEN_PREFIX..output.end,
                    });
                }
                Ok(())
            })?;
            let routes = routes
                .get(..toc.len())
                .ok_or(FwuError::TooManyFirmwareEntries)?;
            reencrypt_firmware(tsip, blob, routes, out)?;
        }
    }

    // The terminator now records how long the transcoded blob is.
    let mut terminator = *toc.terminator();
    terminator.offset_address = U64::new(size.out_size as u64);
    put(out, size.terminator(), terminator.as_bytes())?;

    Ok(size)
}

/// One used firmware slot: where its image comes from in the blob and
/// where its re-encrypted form goes in the output.
#[derive(Clone, Debug)]
struct Route {
    source: Range<usize>,
    output: Range<usize>,
}

fn reencrypt_keyring<T: Tsip>(
    tsip: &mut T,
    input: &[u8],
    output: &mut [u8],
) -> Result<(), FwuError> {
    let input: &[u8; KEYRING_INPUT_SIZE] =
        input.try_into().map_err(|_| FwuError::BadKeyringSize)?;
    let output: &mut [u8; KEYRING_OUTPUT_SIZE] =
        output.try_into().map_err(|_| FwuError::WorkAreaTooSmall)?;

    let mut session = tsip.open_session()?;
    session.update_keyring(input, output)?;
    Ok(())
}

/// Re-encrypts every routed image in a single request, slot `i` being the
/// blob's `i`th entry.
fn reencrypt_firmware<T: Tsip>(
    tsip: &mut T,
    blob: &[u8],
    routes: &[Option<Route>],
    out: &mut [u8],
) -> Result<(), FwuError> {
    let used = routes.iter().flatten().count();
    if used == 0 {
        return Ok(());
    }

    let mut slots: [FirmwareSlot<'_>; MAX_FIRMWARE_SLOTS] = Default::default();

    // Outputs were laid out in slot order, so they can be carved off the
    // work area front to back.
    let mut rest = out;
    let mut base = 0;
    for (slot, route) in slots.iter_mut().zip(routes) {
        let Some(route) = route else {
            continue;
        };
        let skip = route
            .output
            .start
            .checked_sub(base)
            .ok_or(FwuError::WorkAreaTooSmall)?;
        let (_, tail) = core::mem::take(&mut rest)
            .split_at_mut_checked(skip)
            .ok_or(FwuError::WorkAreaTooSmall)?;
        let (output, tail) = tail
            .split_at_mut_checked(route.output.len())
            .ok_or(FwuError::WorkAreaTooSmall)?;
        slot.input = input(blob, route.source.clone())?;
        slot.output = output;
        rest = tail;
        base = route.output.end;
    }

    let slots = slots
        .get_mut(..routes.len())
        .ok_or(FwuError::TooManyFirmwareEntries)?;
    let mut session = tsip.open_session()?;
    session.update_firmware(slots)?;
    ringbuf_entry_root!(Trace::FirmwareBatch { slots: used });
    Ok(())
}

fn input(blob: &[u8], range: Range<usize>) -> Result<&[u8], FwuError> {
    blob.get(range)
        .ok_or(FwuError::Format(fip::FormatError::EntryOutOfBounds))
}

fn put(out: &mut [u8], at: usize, bytes: &[u8]) -> Result<(), FwuError> {
    let end = at
        .checked_add(bytes.len())
        .ok_or(FwuError::WorkAreaTooSmall)?;
    out.get_mut(at..end)
        .ok_or(FwuError::WorkAreaTooSmall)?
        .copy_from_slice(bytes);
    Ok(())
}

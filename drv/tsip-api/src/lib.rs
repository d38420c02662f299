// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client API for the TSIP re-encryption service.
//!
//! Update packages arrive temporarily encrypted; the TSIP converts each
//! keyring or firmware payload into its final, device-bound encryption.
//! Every call happens inside a session obtained from [`Tsip::open_session`],
//! which is closed when the session value is dropped.

#![cfg_attr(not(test), no_std)]

use num_derive::FromPrimitive;

/// Bytes of a temporarily encrypted keyring consumed by the service.
pub const KEYRING_INPUT_SIZE: usize = 0x2b0;

/// Bytes of a re-encrypted keyring produced by the service.
pub const KEYRING_OUTPUT_SIZE: usize = 0x510;

/// Most firmware images that can be re-encrypted in one request.
pub const MAX_FIRMWARE_SLOTS: usize = 16;

/// Expansion of the image in slot 0: boot header (48) plus MAC (16).
pub const FIRST_SLOT_OVERHEAD: usize = 64;

/// Expansion of an image in any other slot: MAC only.
pub const SLOT_OVERHEAD: usize = 16;

/// Length of the re-encrypted form of a `len`-byte image placed in `slot`,
/// or `None` on overflow.
pub fn reencrypted_len(slot: usize, len: usize) -> Option<usize> {
    let overhead = if slot == 0 {
        FIRST_SLOT_OVERHEAD
    } else {
        SLOT_OVERHEAD
    };
    len.checked_add(overhead)
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive)]
#[repr(u32)]
pub enum TsipError {
    /// No session could be opened with the service.
    SessionUnavailable = 1,
    /// The request was malformed (bad slot count or buffer length).
    BadParameters = 2,
    /// The payload failed authentication or decryption.
    DecryptFailed = 3,
    /// The service could not produce the re-encrypted form.
    EncryptFailed = 4,
    Busy = 5,
}

/// One firmware image in a batched request.
///
/// An empty `input` marks an unused slot; the service leaves its `output`
/// (also empty) alone. For a used slot, `output` is exactly
/// `reencrypted_len(index, input.len())` bytes.
#[derive(Debug, Default)]
pub struct FirmwareSlot<'a> {
    pub input: &'a [u8],
    pub output: &'a mut [u8],
}

impl FirmwareSlot<'_> {
    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }
}

/// Opens sessions with the re-encryption service.
pub trait Tsip {
    type Session: TsipSession;

    fn open_session(&mut self) -> Result<Self::Session, TsipError>;
}

/// An open session. Dropping it closes the session.
pub trait TsipSession {
    /// Re-encrypts one keyring.
    fn update_keyring(
        &mut self,
        input: &[u8; KEYRING_INPUT_SIZE],
        output: &mut [u8; KEYRING_OUTPUT_SIZE],
    ) -> Result<(), TsipError>;

    /// Re-encrypts up to [`MAX_FIRMWARE_SLOTS`] images in one request. Slot
    /// position matters: slot 0 carries the larger expansion.
    fn update_firmware(
        &mut self,
        slots: &mut [FirmwareSlot<'_>],
    ) -> Result<(), TsipError>;
}

/// Checks that `slots` is a well-formed firmware request.
///
/// Services and fakes alike use this before touching any buffer.
pub fn validate_slots(slots: &[FirmwareSlot<'_>]) -> Result<(), TsipError> {
    if slots.len() > MAX_FIRMWARE_SLOTS {
        return Err(TsipError::BadParameters);
    }
    for (index, slot) in slots.iter().enumerate() {
        let expected = if slot.is_empty() {
            Some(0)
        } else {
            reencrypted_len(index, slot.input.len())
        };
        if expected != Some(slot.output.len()) {
            return Err(TsipError::BadParameters);
        }
    }
    Ok(())
}

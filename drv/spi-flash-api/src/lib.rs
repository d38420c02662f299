// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client API for the SPI flash write service.

#![cfg_attr(not(test), no_std)]

use num_derive::FromPrimitive;

#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive)]
#[repr(u32)]
pub enum FlashError {
    SessionUnavailable = 1,
    /// Offset or length falls outside the device.
    OutOfBounds = 2,
    EraseFailed = 3,
    WriteFailed = 4,
    /// Read-back after programming did not match.
    VerifyFailed = 5,
}

/// Opens sessions with the flash service.
pub trait SpiFlash {
    type Session: FlashSession;

    fn open_session(&mut self) -> Result<Self::Session, FlashError>;
}

/// An open session. Dropping it closes the session.
pub trait FlashSession {
    /// Erases and programs `data` starting at the device offset `offset`.
    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), FlashError>;
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory stand-ins for the TSIP and flash services.

#![allow(dead_code)]

use drv_fwu_server::FwuServer;
use drv_spi_flash_api::{FlashError, FlashSession, SpiFlash};
use drv_tsip_api::{
    validate_slots, FirmwareSlot, Tsip, TsipError, TsipSession,
    KEYRING_INPUT_SIZE, KEYRING_OUTPUT_SIZE,
};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Default)]
pub struct TsipLog {
    pub opened: usize,
    pub closed: usize,
    pub keyrings: usize,
    /// Number of used slots in each firmware request.
    pub batches: Vec<usize>,
}

/// Re-encrypts deterministically: every input byte is inverted, and any
/// room left in an output is filled with its slot number.
#[derive(Clone, Default)]
pub struct FakeTsip {
    pub log: Rc<RefCell<TsipLog>>,
    pub fail: Option<TsipError>,
}

impl FakeTsip {
    pub fn failing(e: TsipError) -> Self {
        Self {
            fail: Some(e),
            ..Self::default()
        }
    }
}

pub struct FakeTsipSession {
    log: Rc<RefCell<TsipLog>>,
    fail: Option<TsipError>,
}

impl Tsip for FakeTsip {
    type Session = FakeTsipSession;

    fn open_session(&mut self) -> Result<FakeTsipSession, TsipError> {
        self.log.borrow_mut().opened += 1;
        Ok(FakeTsipSession {
            log: self.log.clone(),
            fail: self.fail,
        })
    }
}

impl Drop for FakeTsipSession {
    fn drop(&mut self) {
        self.log.borrow_mut().closed += 1;
    }
}

pub fn invert_into(input: &[u8], output: &mut [u8], fill: u8) {
    let (head, tail) = output.split_at_mut(input.len());
    for (o, i) in head.iter_mut().zip(input) {
        *o = !*i;
    }
    tail.fill(fill);
}

impl TsipSession for FakeTsipSession {
    fn update_keyring(
        &mut self,
        input: &[u8; KEYRING_INPUT_SIZE],
        output: &mut [u8; KEYRING_OUTPUT_SIZE],
    ) -> Result<(), TsipError> {
        if let Some(e) = self.fail {
            return Err(e);
        }
        self.log.borrow_mut().keyrings += 1;
        invert_into(input, output, 0xee);
        Ok(())
    }

    fn update_firmware(
        &mut self,
        slots: &mut [FirmwareSlot<'_>],
    ) -> Result<(), TsipError> {
        if let Some(e) = self.fail {
            return Err(e);
        }
        validate_slots(slots)?;
        let used = slots.iter().filter(|s| !s.is_empty()).count();
        self.log.borrow_mut().batches.push(used);
        for (i, slot) in slots.iter_mut().enumerate() {
            invert_into(slot.input, slot.output, i as u8);
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FlashLog {
    pub opened: usize,
    pub writes: Vec<(u32, Vec<u8>)>,
}

/// Records every write it is handed.
#[derive(Clone, Default)]
pub struct SpyFlash {
    pub log: Rc<RefCell<FlashLog>>,
    pub fail: Option<FlashError>,
}

pub struct SpyFlashSession {
    log: Rc<RefCell<FlashLog>>,
    fail: Option<FlashError>,
}

impl SpiFlash for SpyFlash {
    type Session = SpyFlashSession;

    fn open_session(&mut self) -> Result<SpyFlashSession, FlashError> {
        self.log.borrow_mut().opened += 1;
        Ok(SpyFlashSession {
            log: self.log.clone(),
            fail: self.fail,
        })
    }
}

impl FlashSession for SpyFlashSession {
    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), FlashError> {
        if let Some(e) = self.fail {
            return Err(e);
        }
        self.log.borrow_mut().writes.push((offset, data.to_vec()));
        Ok(())
    }
}

pub type Server = FwuServer<FakeTsip, SpyFlash>;

pub fn server() -> Server {
    FwuServer::new(FakeTsip::default(), SpyFlash::default())
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::config::FlashRegion;
use crate::Trace;
use drv_fwu_api::FwuError;
use drv_spi_flash_api::{FlashSession, SpiFlash};
use ringbuf::ringbuf_entry_root;

/// Writes a transcoded package to the start of `region`.
///
/// The region check happens before a flash session is opened, so an
/// oversized package never reaches the device.
pub fn write_package<F: SpiFlash>(
    flash: &mut F,
    region: FlashRegion,
    image: &[u8],
) -> Result<(), FwuError> {
    region.check(image.len())?;

    let mut session = flash.open_session()?;
    session.write(region.base, image)?;
    ringbuf_entry_root!(Trace::FlashWrite {
        offset: region.base,
        len: image.len(),
    });
    Ok(())
}

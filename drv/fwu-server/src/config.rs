// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use drv_fwu_api::FwuError;

/// The span of flash, as device offsets, that an update package may occupy.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FlashRegion {
    /// Where the package is written.
    pub base: u32,
    /// First offset past the region.
    pub end: u32,
}

impl FlashRegion {
    /// Region reserved for the FWU package on the SPI flash.
    pub const FWU_PACKAGE: Self = Self {
        base: 0x0300_0000,
        end: 0x0400_0000,
    };

    pub fn capacity(&self) -> usize {
        self.end.saturating_sub(self.base) as usize
    }

    /// Checks that `len` bytes written at `base` stay within the region.
    pub fn check(&self, len: usize) -> Result<(), FwuError> {
        let end = u32::try_from(len)
            .ok()
            .and_then(|len| self.base.checked_add(len));
        match end {
            Some(end) if end <= self.end => Ok(()),
            _ => Err(FwuError::FlashRegionExceeded),
        }
    }
}

impl Default for FlashRegion {
    fn default() -> Self {
        Self::FWU_PACKAGE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_region_bounds() {
        let r = FlashRegion::FWU_PACKAGE;
        assert_eq!(r.capacity(), 0x0100_0000);
        assert_eq!(r.check(0), Ok(()));
        assert_eq!(r.check(0x0100_0000), Ok(()));
        assert_eq!(r.check(0x0100_0001), Err(FwuError::FlashRegionExceeded));
        assert_eq!(r.check(usize::MAX), Err(FwuError::FlashRegionExceeded));
    }

    #[test]
    fn no_wraparound() {
        let r = FlashRegion {
            base: u32::MAX - 4,
            end: u32::MAX,
        };
        assert_eq!(r.check(4), Ok(()));
        assert_eq!(r.check(8), Err(FwuError::FlashRegionExceeded));
    }
}

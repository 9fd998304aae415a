// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! The PCI address used to target a device function.

use hubpack::SerializedSize;
use serde::Deserialize;
use serde::Serialize;

const BUS_SHIFT: u32 = 16;
const DEV_SHIFT: u32 = 8;

/// A PCI domain and bus / device / function, as carried on the wire.
///
/// `bdf_id` packs the function in bits 0-7, the device in bits 8-15 and the
/// bus in bits 16-23.
#[derive(Clone, Copy, Default, Deserialize, Eq, PartialEq, Serialize, SerializedSize)]
pub struct Bdf {
    pub domain: u32,
    pub bdf_id: u32,
}

impl core::fmt::Debug for Bdf {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "Bdf({self})")
    }
}

impl core::fmt::Display for Bdf {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "{:04x}:{:02x}:{:02x}.{}",
            self.domain,
            self.bus(),
            self.dev(),
            self.fun()
        )
    }
}

/// Attempt to build an out-of-range PCI address.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, SerializedSize)]
#[cfg_attr(any(test, feature = "std"), derive(thiserror::Error))]
pub struct InvalidBdf {
    pub domain: u32,
    pub bus: u32,
    pub dev: u32,
    pub fun: u32,
}

impl core::fmt::Display for InvalidBdf {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "Invalid PCI address: {:x}:{:x}:{:x}.{}",
            self.domain, self.bus, self.dev, self.fun
        )
    }
}

impl Bdf {
    pub const MAX_DOMAIN: u32 = 0xffff;
    pub const MAX_BUS: u32 = 0xff;
    pub const MAX_DEV: u32 = 0x1f;
    pub const MAX_FUN: u32 = 0x7;

    /// Build an address, checking each field against its PCI width.
    ///
    /// Bus 0 never hosts a NIC function and is rejected as well.
    pub const fn new(domain: u32, bus: u32, dev: u32, fun: u32) -> Result<Self, InvalidBdf> {
        if domain > Self::MAX_DOMAIN
            || bus == 0
            || bus > Self::MAX_BUS
            || dev > Self::MAX_DEV
            || fun > Self::MAX_FUN
        {
            return Err(InvalidBdf {
                domain,
                bus,
                dev,
                fun,
            });
        }
        Ok(Self {
            domain,
            bdf_id: fun | dev << DEV_SHIFT | bus << BUS_SHIFT,
        })
    }

    pub const fn bus(&self) -> u8 {
        (self.bdf_id >> BUS_SHIFT) as u8
    }

    pub const fn dev(&self) -> u8 {
        (self.bdf_id >> DEV_SHIFT) as u8
    }

    pub const fn fun(&self) -> u8 {
        self.bdf_id as u8
    }
}

#[cfg(test)]
mod tests {
    use super::Bdf;
    use hubpack::SerializedSize;

    #[test]
    fn test_bdf_packing() {
        let bdf = Bdf::new(0, 0xbd, 0x1, 3).unwrap();
        assert_eq!(bdf.bdf_id, 0x00bd_0103);
        assert_eq!(bdf.bus(), 0xbd);
        assert_eq!(bdf.dev(), 1);
        assert_eq!(bdf.fun(), 3);
        assert_eq!(bdf.to_string(), "0000:bd:01.3");
        assert_eq!(Bdf::MAX_SIZE, 8);
    }

    #[test]
    fn test_bdf_out_of_range() {
        assert!(Bdf::new(0x1_0000, 1, 0, 0).is_err());
        assert!(Bdf::new(0, 0, 0, 0).is_err());
        assert!(Bdf::new(0, 0x100, 0, 0).is_err());
        assert!(Bdf::new(0, 1, 0x20, 0).is_err());
        assert!(Bdf::new(0, 1, 0, 8).is_err());
        assert!(Bdf::new(0xffff, 0xff, 0x1f, 7).is_ok());
    }
}

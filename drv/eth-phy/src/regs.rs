// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Register map for the GXL copper PHY family.
//!
//! Registers 0-10 are the IEEE 802.3 clause 22 set and are page-independent
//! in practice, but we address everything through the page register (31) to
//! keep the access path uniform; the vendor pages hold the resolved-status,
//! polarity, EEE, and temperature registers.

/// A paged PHY register address. The page is selected by writing register
/// 31, which the [`crate::Phy`] handle caches.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PhyReg {
    pub page: u16,
    pub addr: u8,
}

/// Register 31 on every page selects the active page.
pub const PAGE_ADDR: u8 = 31;

pub mod standard {
    use super::PhyReg;

    pub const MODE_CONTROL: PhyReg = PhyReg { page: 0, addr: 0 };
    pub const MODE_STATUS: PhyReg = PhyReg { page: 0, addr: 1 };
    pub const IDENTIFIER_1: PhyReg = PhyReg { page: 0, addr: 2 };
    pub const IDENTIFIER_2: PhyReg = PhyReg { page: 0, addr: 3 };
    pub const ANEG_ADVERTISE: PhyReg = PhyReg { page: 0, addr: 4 };
    pub const ANEG_LP_ABILITY: PhyReg = PhyReg { page: 0, addr: 5 };
    pub const GBIT_CONTROL: PhyReg = PhyReg { page: 0, addr: 9 };
    pub const GBIT_STATUS: PhyReg = PhyReg { page: 0, addr: 10 };
    /// Vendor: autonegotiation result (speed/duplex) after resolution.
    pub const AUX_STATUS: PhyReg = PhyReg { page: 0, addr: 28 };

    // MODE_CONTROL bits
    pub const SW_RESET: u16 = 1 << 15;
    pub const SPEED_LSB: u16 = 1 << 13;
    pub const ANEG_ENA: u16 = 1 << 12;
    pub const LOW_POWER: u16 = 1 << 11;
    pub const ANEG_RESTART: u16 = 1 << 9;
    pub const DUPLEX_FULL: u16 = 1 << 8;
    pub const SPEED_MSB: u16 = 1 << 6;

    // MODE_STATUS bits
    pub const ANEG_DONE: u16 = 1 << 5;
    pub const LINK_UP: u16 = 1 << 2;

    // ANEG_ADVERTISE / ANEG_LP_ABILITY bits
    pub const ADV_ASYM_PAUSE: u16 = 1 << 11;
    pub const ADV_PAUSE: u16 = 1 << 10;
    pub const ADV_100_FULL: u16 = 1 << 8;
    pub const ADV_100_HALF: u16 = 1 << 7;
    pub const ADV_10_FULL: u16 = 1 << 6;
    pub const ADV_10_HALF: u16 = 1 << 5;

    // GBIT_CONTROL / GBIT_STATUS bits
    pub const ADV_1000_FULL: u16 = 1 << 9;
    pub const LP_1000_FULL: u16 = 1 << 11;

    // AUX_STATUS fields
    pub const AUX_RESOLVED: u16 = 1 << 11;
    pub const AUX_DUPLEX_FULL: u16 = 1 << 5;
    pub const AUX_SPEED_MASK: u16 = 0b11 << 3;
    pub const AUX_SPEED_10: u16 = 0b00 << 3;
    pub const AUX_SPEED_100: u16 = 0b01 << 3;
    pub const AUX_SPEED_1000: u16 = 0b10 << 3;
}

pub mod extended {
    use super::PhyReg;

    /// Media polarity override control.
    pub const POLARITY_CTRL: PhyReg = PhyReg { page: 1, addr: 23 };

    /// Forces the MDI pair-polarity correction the silicon mis-detects at
    /// 1G full duplex. Valid for that mode only.
    pub const POLARITY_HOLD: u16 = 1 << 4;
}

pub mod vendor {
    use super::PhyReg;

    /// EEE advertisement (mirrors MMD 7.60).
    pub const EEE_ADV: PhyReg = PhyReg { page: 2, addr: 16 };
    /// EEE resolution after autonegotiation.
    pub const EEE_RESOLVE: PhyReg = PhyReg { page: 2, addr: 17 };
    pub const EEE_1000: u16 = 1 << 2;
    pub const EEE_100: u16 = 1 << 1;

    /// Die temperature sensor control.
    pub const TEMP_CTRL: PhyReg = PhyReg { page: 2, addr: 26 };
    /// Die temperature sensor data.
    pub const TEMP_DATA: PhyReg = PhyReg { page: 2, addr: 27 };

    pub const TEMP_ENA: u16 = 1 << 15;
    /// One-shot sample trigger (GXL8110 only; the 8312 free-runs).
    pub const TEMP_SAMPLE: u16 = 1 << 14;
    pub const TEMP_VALID: u16 = 1 << 15;
    pub const TEMP_MASK: u16 = 0xff;
    /// Raw reading offset: degrees C = raw - 40.
    pub const TEMP_OFFSET: i16 = 40;
}

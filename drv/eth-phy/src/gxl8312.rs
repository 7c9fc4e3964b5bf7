// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::regs::{vendor, standard};
use crate::{Phy, PhyRw, Trace};
use drv_link_err::LinkError;
use embedded_hal::blocking::delay::DelayMs;
use ringbuf::ringbuf_entry_root as ringbuf_entry;

/// The GXL8312 is a 12-port gigabit copper PHY.  Its temperature sensor
/// free-runs once enabled, so reads never block.
pub struct Gxl8312Phy<'a, 'b, P> {
    pub phy: &'b Phy<'a, P>,
}

impl<P: PhyRw> Gxl8312Phy<'_, '_, P> {
    /// Resets and configures the PHY.  Autonegotiation is left stopped;
    /// the caller programs an advertisement and restarts it.
    pub fn init<D: DelayMs<u32>>(
        &self,
        delay: &mut D,
    ) -> Result<(), LinkError> {
        ringbuf_entry!(Trace::Gxl8312Init(self.phy.port));

        // Revisions before 2 need a firmware patch we don't carry.
        let rev = (self.phy.read_id()? & 0xf) as u16;
        if rev < 2 {
            return Err(LinkError::BadPhyRev(rev));
        }

        self.phy.software_reset(delay)?;

        // Make sure autonegotiation is not running on a stale
        // advertisement from before the reset.
        self.phy.modify(standard::MODE_CONTROL, |r| {
            *r &= !standard::ANEG_ENA;
        })?;

        // Free-running temperature sensor.
        self.phy.modify(vendor::TEMP_CTRL, |r| {
            *r |= vendor::TEMP_ENA;
        })
    }

    /// Reads the die temperature in degrees Celsius.
    pub fn read_temperature(&self) -> Result<i16, LinkError> {
        let data = self.phy.read(vendor::TEMP_DATA)?;
        if data & vendor::TEMP_VALID == 0 {
            // The sensor was not enabled, or the first conversion after
            // enable has not landed yet.
            return Err(LinkError::PhyInitTimeout);
        }
        Ok((data & vendor::TEMP_MASK) as i16 - vendor::TEMP_OFFSET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{FakeBus, NoDelay};

    #[test]
    fn init_rejects_old_revision() {
        let mut bus = FakeBus::default();
        bus.set(standard::IDENTIFIER_1, (crate::GXL8312_ID >> 16) as u16);
        bus.set(
            standard::IDENTIFIER_2,
            (crate::GXL8312_ID & 0xffff) as u16 | 0x1,
        );
        let phy = Phy::new(0, &mut bus);
        let r = Gxl8312Phy { phy: &phy }.init(&mut NoDelay);
        assert_eq!(r, Err(LinkError::BadPhyRev(1)));
    }

    #[test]
    fn init_enables_temp_sensor() {
        let mut bus = FakeBus::default();
        bus.set(standard::IDENTIFIER_1, (crate::GXL8312_ID >> 16) as u16);
        bus.set(
            standard::IDENTIFIER_2,
            (crate::GXL8312_ID & 0xffff) as u16 | 0x3,
        );
        let phy = Phy::new(0, &mut bus);
        Gxl8312Phy { phy: &phy }.init(&mut NoDelay).unwrap();
        assert_ne!(phy.rw.get(vendor::TEMP_CTRL) & vendor::TEMP_ENA, 0);
        assert_eq!(
            phy.rw.get(standard::MODE_CONTROL) & standard::ANEG_ENA,
            0
        );
    }

    #[test]
    fn temperature_applies_offset() {
        let mut bus = FakeBus::default();
        bus.set(vendor::TEMP_DATA, vendor::TEMP_VALID | 125);
        let phy = Phy::new(0, &mut bus);
        let t = Gxl8312Phy { phy: &phy }.read_temperature().unwrap();
        assert_eq!(t, 85);
    }

    #[test]
    fn temperature_requires_valid_bit() {
        let mut bus = FakeBus::default();
        bus.set(vendor::TEMP_DATA, 125);
        let phy = Phy::new(0, &mut bus);
        let r = Gxl8312Phy { phy: &phy }.read_temperature();
        assert_eq!(r, Err(LinkError::PhyInitTimeout));
    }
}

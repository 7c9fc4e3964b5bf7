// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::regs::{standard, vendor};
use crate::{Phy, PhyRw, Trace};
use drv_link_err::LinkError;
use embedded_hal::blocking::delay::DelayMs;
use ringbuf::ringbuf_entry_root as ringbuf_entry;

/// The GXL8110 is a single-port gigabit copper PHY.  Unlike the 8312, its
/// temperature sensor is one-shot: each reading is triggered explicitly and
/// polled for completion.
pub struct Gxl8110Phy<'a, 'b, P> {
    pub phy: &'b Phy<'a, P>,
}

impl<P: PhyRw> Gxl8110Phy<'_, '_, P> {
    pub fn init<D: DelayMs<u32>>(
        &self,
        delay: &mut D,
    ) -> Result<(), LinkError> {
        ringbuf_entry!(Trace::Gxl8110Init(self.phy.port));

        self.phy.software_reset(delay)?;

        self.phy.modify(standard::MODE_CONTROL, |r| {
            *r &= !standard::ANEG_ENA;
        })?;

        self.phy.modify(vendor::TEMP_CTRL, |r| {
            *r |= vendor::TEMP_ENA;
        })
    }

    /// Triggers a conversion, waits for it to land, and reads the result in
    /// degrees Celsius.
    pub fn read_temperature<D: DelayMs<u32>>(
        &self,
        delay: &mut D,
    ) -> Result<i16, LinkError> {
        self.phy.modify(vendor::TEMP_CTRL, |r| {
            *r |= vendor::TEMP_SAMPLE;
        })?;
        self.phy.wait_timeout(vendor::TEMP_DATA, delay, |r| {
            r & vendor::TEMP_VALID != 0
        })?;
        let data = self.phy.read(vendor::TEMP_DATA)?;
        // The sample bit self-clears in hardware; clear our copy so the next
        // trigger is a fresh edge on parts where it doesn't.
        self.phy.modify(vendor::TEMP_CTRL, |r| {
            *r &= !vendor::TEMP_SAMPLE;
        })?;
        Ok((data & vendor::TEMP_MASK) as i16 - vendor::TEMP_OFFSET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{FakeBus, NoDelay};

    #[test]
    fn one_shot_temperature() {
        let mut bus = FakeBus::default();
        bus.set(vendor::TEMP_DATA, vendor::TEMP_VALID | 70);
        let phy = Phy::new(0, &mut bus);
        let t = Gxl8110Phy { phy: &phy }
            .read_temperature(&mut NoDelay)
            .unwrap();
        assert_eq!(t, 30);
        // Sample trigger was cleared again afterwards.
        assert_eq!(phy.rw.get(vendor::TEMP_CTRL) & vendor::TEMP_SAMPLE, 0);
    }

    #[test]
    fn temperature_times_out_without_valid() {
        let mut bus = FakeBus::default();
        bus.set(vendor::TEMP_DATA, 70);
        let phy = Phy::new(0, &mut bus);
        let r = Gxl8110Phy { phy: &phy }.read_temperature(&mut NoDelay);
        assert_eq!(r, Err(LinkError::PhyInitTimeout));
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Thermal protection.
//!
//! Once a second the hottest PHY die is compared against the shed
//! threshold. Overshoot disables a step of ports (more ports the hotter it
//! runs), split evenly between the two halves of the port range so the
//! load drop isn't concentrated on one side of the board. Shed ports are
//! held off until the temperature has stayed below the threshold for
//! [`HOLD_SECS`]; the operator can re-enable a shed port early, and the
//! controller won't fight them over it.

use embedded_hal::blocking::delay::DelayMs;
use ringbuf::ringbuf_entry_root as ringbuf_entry;

use drv_eth_phy::{Phy, PhyRw};
use drv_fabric::FabricBackend;
use drv_xcvr::ModuleBus;

use crate::config::{Attach, NUM_PORTS};
use crate::{LinkMgr, LinkNotify, Trace};

/// Die temperature at which shedding starts.
const SHED_THRESHOLD_C: i16 = 85;

/// How long the last overshoot keeps ports shed.
const HOLD_SECS: u32 = 60;

/// Cumulative shed target as a step function of overshoot.
fn shed_step(overshoot: i16) -> u8 {
    if overshoot >= 10 {
        16
    } else if overshoot >= 5 {
        8
    } else {
        4
    }
}

impl<P, F, M, D, N> LinkMgr<'_, P, F, M, D, N>
where
    P: PhyRw,
    F: FabricBackend,
    M: ModuleBus,
    D: DelayMs<u32>,
    N: LinkNotify,
{
    pub(crate) fn thermal_second(&mut self) {
        let max_temp = self.sample_max_temp();
        self.thermal.last_temp = max_temp;

        match max_temp {
            Some(t) if t >= SHED_THRESHOLD_C => {
                // Still hot: restart the hold and deepen the shed if the
                // overshoot asks for more than we've already taken.
                self.thermal.hold_secs = HOLD_SECS;
                let target = shed_step(t - SHED_THRESHOLD_C);
                if target > self.thermal.shed_target {
                    self.thermal.shed_target = target;
                    self.shed_to_target(target);
                }
            }
            _ => {
                if self.thermal.hold_secs > 0 {
                    self.thermal.hold_secs -= 1;
                    if self.thermal.hold_secs == 0 {
                        self.restore_shed_ports();
                    }
                }
            }
        }
    }

    /// Reads every copper PHY's die temperature and keeps the hottest.
    /// Sensors that fail to read are skipped; one bad PHY doesn't blind
    /// the controller to the rest.
    fn sample_max_temp(&mut self) -> Option<i16> {
        let mut max_temp: Option<i16> = None;
        for p in 0..NUM_PORTS as u8 {
            let Some(Attach::Phy { addr }) = self.map.port_config(p)
            else {
                continue;
            };
            let Some(family) = self.families[usize::from(p)] else {
                continue;
            };
            let Self { phy_bus, delay, .. } = self;
            let phy = Phy::new(addr, phy_bus);
            match family.read_temperature(&phy, delay) {
                Ok(t) => {
                    max_temp = Some(max_temp.map_or(t, |m| m.max(t)))
                }
                Err(err) => {
                    ringbuf_entry!(Trace::PhyError { port: p, err })
                }
            }
        }
        if let Some(max_temp) = max_temp {
            ringbuf_entry!(Trace::ThermalSample { max_temp });
        }
        max_temp
    }

    /// Sheds ports until `target` of them are off, half from each side of
    /// the port range, picking the highest-numbered eligible ports first.
    fn shed_to_target(&mut self, target: u8) {
        let per_half = target / 2;
        for (lo, hi) in [(0, NUM_PORTS / 2), (NUM_PORTS / 2, NUM_PORTS)] {
            let mut shed = (lo..hi)
                .filter(|&i| self.ports[i].thermal_shed)
                .count() as u8;
            for i in (lo..hi).rev() {
                if shed >= per_half {
                    break;
                }
                let p = i as u8;
                if self.map.port_config(p).is_none() {
                    continue;
                }
                if !self.ports[i].enabled || self.ports[i].thermal_shed {
                    continue;
                }
                ringbuf_entry!(Trace::ThermalShed { port: p });
                if let Err(err) = self.set_port_enabled(p, false) {
                    ringbuf_entry!(Trace::PhyError { port: p, err });
                }
                self.ports[i].thermal_shed = true;
                shed += 1;
            }
        }
    }

    fn restore_shed_ports(&mut self) {
        self.thermal.shed_target = 0;
        for p in 0..NUM_PORTS as u8 {
            if !self.ports[usize::from(p)].thermal_shed {
                continue;
            }
            ringbuf_entry!(Trace::ThermalRestore { port: p });
            if let Err(err) = self.set_port_enabled(p, true) {
                ringbuf_entry!(Trace::PhyError { port: p, err });
            }
        }
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Poll-pass state machine for copper (PHY-attached) ports.

use embedded_hal::blocking::delay::DelayMs;
use ringbuf::ringbuf_entry_root as ringbuf_entry;

use drv_eth_phy::{Phy, PhyRw};
use drv_fabric::FabricBackend;
use drv_link_config::{Duplex, LinkMode, LinkParams, Speed};
use drv_link_err::LinkError;
use drv_xcvr::ModuleBus;

use crate::{debounce, Fsm, LinkMgr, LinkNotify, Trace, FLAP_LIMIT};

/// Confirmed-down polls in `WaitingForLink` before we assume the partner
/// is forced to 100BASE-TX and give parallel detection a kick.
const NUDGE_POLLS: u8 = 10;

impl<P, F, M, D, N> LinkMgr<'_, P, F, M, D, N>
where
    P: PhyRw,
    F: FabricBackend,
    M: ModuleBus,
    D: DelayMs<u32>,
    N: LinkNotify,
{
    pub(crate) fn copper_step(&mut self, p: u8, addr: u8, poll_edge: bool) {
        let fsm = self.ports[usize::from(p)].fsm;
        // Link sampling is paced by the poll edge; setup states advance on
        // every dispatch pass.
        if !poll_edge && matches!(fsm, Fsm::WaitingForLink | Fsm::LinkUp) {
            return;
        }
        match fsm {
            Fsm::Disabled => (),

            Fsm::SetupSpeedMode => {
                let state = self.ports[usize::from(p)];
                let phy = Phy::new(addr, &mut self.phy_bus);
                let r = phy
                    .set_advertisement(state.fc, state.eee_admin)
                    .and_then(|()| phy.restart_aneg());
                match r {
                    Ok(()) => {
                        let state = &mut self.ports[usize::from(p)];
                        state.fsm = Fsm::WaitingForLink;
                        state.stuck_polls = 0;
                    }
                    // Stay; the advertisement is reprogrammed from scratch
                    // on the next pass.
                    Err(err) => {
                        ringbuf_entry!(Trace::PhyError { port: p, err })
                    }
                }
            }

            Fsm::WaitingForLink => match self.sample_copper(addr) {
                Ok(Some(LinkMode::Up(params))) => {
                    self.apply_polarity_hold(p, addr, params);
                    self.propagate_up(p, params);
                    self.ports[usize::from(p)].fsm = Fsm::LinkUp;
                }
                Ok(Some(LinkMode::Down)) => {
                    let state = &mut self.ports[usize::from(p)];
                    state.stuck_polls = state.stuck_polls.saturating_add(1);
                    if state.stuck_polls >= NUDGE_POLLS {
                        state.stuck_polls = 0;
                        ringbuf_entry!(Trace::Nudge { port: p });
                        let phy = Phy::new(addr, &mut self.phy_bus);
                        if let Err(err) = phy.nudge_forced_100tx() {
                            ringbuf_entry!(Trace::PhyError {
                                port: p,
                                err
                            });
                        }
                    }
                }
                // The two samples disagreed; the link is still settling.
                Ok(None) => (),
                Err(err) => {
                    ringbuf_entry!(Trace::PhyError { port: p, err })
                }
            },

            Fsm::LinkUp => match self.sample_copper(addr) {
                Ok(Some(mode)) => {
                    if mode == self.ports[usize::from(p)].link_mode {
                        self.ports[usize::from(p)].flaps = 0;
                    } else {
                        // Down, or up with different parameters: either
                        // way the old link is gone.
                        self.copper_drop(p, addr);
                    }
                }
                Ok(None) => self.copper_flap(p, addr),
                Err(err) => {
                    ringbuf_entry!(Trace::PhyError { port: p, err })
                }
            },

            // Module-only states; a copper port can't reach these.
            Fsm::SignalSetup | Fsm::SetupMode => (),
        }
    }

    fn sample_copper(
        &mut self,
        addr: u8,
    ) -> Result<Option<LinkMode>, LinkError> {
        let Self { phy_bus, delay, .. } = self;
        let phy = Phy::new(addr, phy_bus);
        debounce::sample_agreeing(delay, || phy.read_link_mode())
    }

    /// The silicon mis-detects MDI pair polarity at 1 Gb/s full duplex;
    /// hold it for exactly that resolved mode and release it otherwise.
    fn apply_polarity_hold(&mut self, p: u8, addr: u8, params: LinkParams) {
        let want = params.speed == Speed::Speed1G
            && params.duplex == Duplex::Full;
        if self.ports[usize::from(p)].polarity_hold == want {
            return;
        }
        let phy = Phy::new(addr, &mut self.phy_bus);
        match phy.set_polarity_hold(want) {
            Ok(()) => self.ports[usize::from(p)].polarity_hold = want,
            Err(err) => ringbuf_entry!(Trace::PhyError { port: p, err }),
        }
    }

    /// A sample on an up link disagreed with itself.
    fn copper_flap(&mut self, p: u8, addr: u8) {
        ringbuf_entry!(Trace::Flap { port: p });
        let state = &mut self.ports[usize::from(p)];
        state.flaps = state.flaps.saturating_add(1);
        if state.flaps >= FLAP_LIMIT {
            ringbuf_entry!(Trace::FlapLimit { port: p });
            self.copper_drop(p, addr);
        }
    }

    /// Tears an up copper link back down to `WaitingForLink`.
    fn copper_drop(&mut self, p: u8, addr: u8) {
        if self.ports[usize::from(p)].polarity_hold {
            let phy = Phy::new(addr, &mut self.phy_bus);
            if let Err(err) = phy.set_polarity_hold(false) {
                ringbuf_entry!(Trace::PhyError { port: p, err });
            }
            self.ports[usize::from(p)].polarity_hold = false;
        }
        self.propagate_down(p);
        let state = &mut self.ports[usize::from(p)];
        state.fsm = Fsm::WaitingForLink;
        state.flaps = 0;
        state.stuck_polls = 0;
    }
}

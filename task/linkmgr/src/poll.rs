// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Poll-edge generation and the dispatch pass.
//!
//! A fixed-period timer drives [`LinkMgr::tick`], which only counts and
//! latches edges. The main loop runs much more often than the tick and
//! calls [`LinkMgr::dispatch`], which consumes each edge for exactly one
//! batch of work. That decouples "enough wall-clock time has passed to
//! re-sample" from how often the loop happens to spin.

use embedded_hal::blocking::delay::DelayMs;
use ringbuf::ringbuf_entry_root as ringbuf_entry;

use drv_eth_phy::PhyRw;
use drv_fabric::FabricBackend;
use drv_xcvr::ModuleBus;

use crate::config::{Attach, NUM_PORTS};
use crate::{LinkMgr, LinkNotify, Trace, POLL_TICKS, TICKS_PER_SEC};

impl<P, F, M, D, N> LinkMgr<'_, P, F, M, D, N>
where
    P: PhyRw,
    F: FabricBackend,
    M: ModuleBus,
    D: DelayMs<u32>,
    N: LinkNotify,
{
    /// Advances time by one tick. Edges latch into pending flags that the
    /// next [`dispatch`](Self::dispatch) consumes, so a main loop that
    /// overruns its slot runs one pass, not one per missed edge.
    pub fn tick(&mut self) {
        self.ticks = self.ticks.wrapping_add(1);
        if self.ticks % POLL_TICKS == 0 {
            self.poll_pending = true;
        }
        if self.ticks % TICKS_PER_SEC == 0 {
            self.thermal_pending = true;
        }
    }

    /// Runs one pass over all ports, plus at most one thermal sample.
    ///
    /// Setup-type states advance on every pass, so a freshly enabled or
    /// reconfigured port doesn't idle until the next edge. Link sampling
    /// in `WaitingForLink` and `LinkUp` happens only when a poll edge is
    /// pending, and each edge is consumed by exactly one pass.
    pub fn dispatch(&mut self) {
        let poll_edge = self.poll_pending;
        self.poll_pending = false;
        self.poll_pass(poll_edge);
        if self.thermal_pending {
            self.thermal_pending = false;
            self.thermal_second();
        }
    }

    fn poll_pass(&mut self, poll_edge: bool) {
        if poll_edge {
            ringbuf_entry!(Trace::PollPass);
        }
        for p in 0..NUM_PORTS as u8 {
            match self.map.port_config(p) {
                None => (),
                Some(Attach::Phy { addr }) => {
                    self.copper_step(p, addr, poll_edge)
                }
                Some(Attach::Lane { lane, default_media }) => {
                    self.module_step(p, lane, default_media, poll_edge)
                }
            }
        }
    }
}

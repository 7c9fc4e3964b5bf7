// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Drivers for the ESW6800 and ESW6900 switch fabrics.
//!
//! The two generations share their serdes lanes, PCS, queue system, and
//! analyzer; they differ in how the per-port MAC learns speed, duplex, and
//! pause. [`FabricRw`] abstracts the register transport (memory-mapped or
//! over SPI); [`FabricBackend`] is the generation-independent surface the
//! link manager drives.
#![cfg_attr(not(test), no_std)]

pub mod regs;

mod pcs;
mod port;
mod serdes;

pub mod esw6800;
pub mod esw6900;

pub use esw6800::Esw6800;
pub use esw6900::Esw6900;

use embedded_hal::blocking::delay::DelayMs;
use ringbuf::*;

use drv_link_config::{LinkMode, LinkParams, MediaType, PcsMode};
pub use drv_link_err::LinkError;

/// The fabrics we support expose at most this many serdes lanes.
pub const MAX_LANES: usize = 8;

/// This trait abstracts over various ways of talking to the switch fabric.
pub trait FabricRw {
    fn read(&self, addr: u32) -> Result<u32, LinkError>;
    fn write(&self, addr: u32, value: u32) -> Result<(), LinkError>;

    /// Performs a read-modify-write operation on a fabric register.
    fn modify<F>(&self, addr: u32, f: F) -> Result<(), LinkError>
    where
        F: Fn(&mut u32),
    {
        let mut data = self.read(addr)?;
        f(&mut data);
        self.write(addr, data)
    }
}

/// Polls `addr` until `mask` reads back clear, sleeping 1 ms between
/// attempts and giving up after `attempts` of them.
pub fn wait_clear<R: FabricRw, D: DelayMs<u32>>(
    v: &R,
    addr: u32,
    mask: u32,
    attempts: u32,
    delay: &mut D,
) -> Result<(), LinkError> {
    for _ in 0..attempts {
        if v.read(addr)? & mask == 0 {
            return Ok(());
        }
        delay.delay_ms(1);
    }
    Err(LinkError::FabricBusyTimeout { addr })
}

////////////////////////////////////////////////////////////////////////////////

/// Generation-independent fabric operations, as the link manager sees them.
///
/// Ports index the per-port MAC and queue resources; lanes index the serdes
/// macros that back the pluggable-module ports.
pub trait FabricBackend {
    /// Checks chip identity and brings the fabric to a known state with all
    /// ports down.
    fn init(&mut self) -> Result<(), LinkError>;

    /// Programs the port MAC for `params` and enables traffic.
    fn port_up(&mut self, port: u8, params: LinkParams)
        -> Result<(), LinkError>;

    /// Stops traffic on the port and drains its queues.
    fn port_down(&mut self, port: u8) -> Result<(), LinkError>;

    /// Drops every learned MAC address pointing at the port.
    fn flush_mac_table(&mut self, port: u8) -> Result<(), LinkError>;

    /// Installs the forwarding member mask: bit N set means port N may
    /// exchange frames with the other members.
    fn update_port_masks(&mut self, mask: u64) -> Result<(), LinkError>;

    /// Starts the lane macro's clocks, waiting for it to come ready.
    fn enable_lane_clock(&mut self, lane: u8) -> Result<(), LinkError>;

    /// Retunes the lane analog settings for the given media.
    fn set_lane_media(
        &mut self,
        lane: u8,
        media: MediaType,
    ) -> Result<(), LinkError>;

    /// Switches the lane's PCS operating mode.
    fn set_pcs_mode(
        &mut self,
        lane: u8,
        mode: PcsMode,
    ) -> Result<(), LinkError>;

    /// Reads the lane's current link state, decoded per its PCS mode.
    fn lane_link_mode(&mut self, lane: u8) -> Result<LinkMode, LinkError>;
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Copy, Clone, Debug, PartialEq)]
enum Trace {
    None,
    Init { part: u32 },
    PortUp { port: u8 },
    PortDown { port: u8 },
    MacTableFlush { port: u8 },
    LaneMedia { lane: u8, media: MediaType },
    PcsMode { lane: u8, mode: PcsMode },
}
ringbuf!(Trace, 32, Trace::None);

////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Word-level fake fabric: a register file plus a log of every write,
    /// in order, for asserting on sequences.
    #[derive(Default)]
    pub(crate) struct FakeFabric {
        pub(crate) regs: RefCell<HashMap<u32, u32>>,
        pub(crate) writes: RefCell<Vec<(u32, u32)>>,
    }

    impl FakeFabric {
        pub(crate) fn set(&self, addr: u32, value: u32) {
            self.regs.borrow_mut().insert(addr, value);
        }

        pub(crate) fn get(&self, addr: u32) -> u32 {
            *self.regs.borrow().get(&addr).unwrap_or(&0)
        }

        pub(crate) fn wrote(&self, addr: u32) -> bool {
            self.writes.borrow().iter().any(|&(a, _)| a == addr)
        }
    }

    impl FabricRw for FakeFabric {
        fn read(&self, addr: u32) -> Result<u32, LinkError> {
            Ok(*self.regs.borrow().get(&addr).unwrap_or(&0))
        }

        fn write(&self, addr: u32, value: u32) -> Result<(), LinkError> {
            self.regs.borrow_mut().insert(addr, value);
            self.writes.borrow_mut().push((addr, value));
            Ok(())
        }
    }

    pub(crate) struct NoDelay;
    impl DelayMs<u32> for NoDelay {
        fn delay_ms(&mut self, _ms: u32) {}
    }

    #[test]
    fn wait_clear_passes_when_clear() {
        let v = FakeFabric::default();
        v.set(0x100, 0x2);
        assert!(wait_clear(&v, 0x100, 0x1, 4, &mut NoDelay).is_ok());
    }

    #[test]
    fn wait_clear_times_out() {
        let v = FakeFabric::default();
        v.set(0x100, 0x1);
        assert_eq!(
            wait_clear(&v, 0x100, 0x1, 4, &mut NoDelay),
            Err(LinkError::FabricBusyTimeout { addr: 0x100 })
        );
    }
}

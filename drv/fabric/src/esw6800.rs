// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Backend for the first-generation ESW6800 fabric.
//!
//! The 6800 takes speed, duplex, and both pause directions in a single
//! MAC_MODE_CFG word per port.

use crate::regs::{self, dev};
use crate::{pcs, port, serdes};
use crate::{FabricBackend, FabricRw, LinkError, Trace, MAX_LANES};
use drv_link_config::{Duplex, LinkMode, LinkParams, MediaType, PcsMode, Speed};
use embedded_hal::blocking::delay::DelayMs;
use ringbuf::ringbuf_entry_root as ringbuf_entry;

// MAC_MODE_CFG layout on this generation.
const SPEED_10: u32 = 0b00;
const SPEED_100: u32 = 0b01;
const SPEED_1000: u32 = 0b10;
const SPEED_2500: u32 = 0b11;
const FDX: u32 = 1 << 2;
const RX_PAUSE: u32 = 1 << 3;
const TX_PAUSE: u32 = 1 << 4;

pub struct Esw6800<R, D> {
    pub rw: R,
    delay: D,
    pcs: [PcsMode; MAX_LANES],
}

impl<R: FabricRw, D: DelayMs<u32>> Esw6800<R, D> {
    pub fn new(rw: R, delay: D) -> Self {
        Self {
            rw,
            delay,
            pcs: [PcsMode::Sgmii; MAX_LANES],
        }
    }
}

impl<R: FabricRw, D: DelayMs<u32>> FabricBackend for Esw6800<R, D> {
    fn init(&mut self) -> Result<(), LinkError> {
        let id = self.rw.read(regs::CHIP_ID)?;
        let part = regs::chip_part(id);
        if part != regs::PART_ESW6800 {
            return Err(LinkError::BadChipId(id));
        }
        ringbuf_entry!(Trace::Init { part });
        // Nothing forwards until links come up.
        port::apply_fwd_masks(&self.rw, 0)
    }

    fn port_up(
        &mut self,
        port: u8,
        params: LinkParams,
    ) -> Result<(), LinkError> {
        ringbuf_entry!(Trace::PortUp { port });
        let mut mode = match params.speed {
            Speed::Speed10M => SPEED_10,
            Speed::Speed100M => SPEED_100,
            Speed::Speed1G => SPEED_1000,
            Speed::Speed2G5 => SPEED_2500,
        };
        if params.duplex == Duplex::Full {
            mode |= FDX;
        }
        if params.pause.rx {
            mode |= RX_PAUSE;
        }
        if params.pause.tx {
            mode |= TX_PAUSE;
        }
        self.rw.write(dev::mac_mode_cfg(port), mode)?;

        // Release the clock-domain resets left over from the last flush.
        self.rw.write(dev::rst_ctrl(port), 0)?;
        self.rw.modify(dev::mac_ena_cfg(port), |r| {
            *r |= dev::RX_ENA | dev::TX_ENA;
        })?;
        port::enable_port_queues(&self.rw, port, params.pause.tx)
    }

    fn port_down(&mut self, p: u8) -> Result<(), LinkError> {
        ringbuf_entry!(Trace::PortDown { port: p });
        port::flush_port(&self.rw, p, &mut self.delay)
    }

    fn flush_mac_table(&mut self, p: u8) -> Result<(), LinkError> {
        ringbuf_entry!(Trace::MacTableFlush { port: p });
        port::flush_mac_table(&self.rw, p, &mut self.delay)
    }

    fn update_port_masks(&mut self, mask: u64) -> Result<(), LinkError> {
        port::apply_fwd_masks(&self.rw, mask)
    }

    fn enable_lane_clock(&mut self, lane: u8) -> Result<(), LinkError> {
        serdes::enable_clock(&self.rw, lane, &mut self.delay)
    }

    fn set_lane_media(
        &mut self,
        lane: u8,
        media: MediaType,
    ) -> Result<(), LinkError> {
        ringbuf_entry!(Trace::LaneMedia { lane, media });
        serdes::set_media(&self.rw, lane, media, &mut self.delay)
    }

    fn set_pcs_mode(
        &mut self,
        lane: u8,
        mode: PcsMode,
    ) -> Result<(), LinkError> {
        ringbuf_entry!(Trace::PcsMode { lane, mode });
        pcs::set_mode(&self.rw, lane, mode)?;
        self.pcs[usize::from(lane)] = mode;
        Ok(())
    }

    fn lane_link_mode(&mut self, lane: u8) -> Result<LinkMode, LinkError> {
        pcs::link_mode(&self.rw, lane, self.pcs[usize::from(lane)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::{ana, qsys};
    use crate::tests::{FakeFabric, NoDelay};
    use drv_link_config::{EeeClass, PauseMode};

    fn chip(part: u32) -> FakeFabric {
        let v = FakeFabric::default();
        v.set(regs::CHIP_ID, part << 12);
        v
    }

    #[test]
    fn init_checks_identity() {
        let mut f = Esw6800::new(chip(regs::PART_ESW6900), NoDelay);
        assert_eq!(
            f.init(),
            Err(LinkError::BadChipId(regs::PART_ESW6900 << 12))
        );

        let mut f = Esw6800::new(chip(regs::PART_ESW6800), NoDelay);
        f.init().unwrap();
        assert!(f.rw.wrote(ana::FWD_MASK_LO));
    }

    #[test]
    fn port_up_packs_one_word() {
        let mut f = Esw6800::new(FakeFabric::default(), NoDelay);
        f.port_up(
            2,
            LinkParams {
                speed: Speed::Speed1G,
                duplex: Duplex::Full,
                pause: PauseMode { rx: true, tx: false },
                eee: EeeClass::None,
            },
        )
        .unwrap();
        assert_eq!(f.rw.get(dev::mac_mode_cfg(2)), SPEED_1000 | FDX | RX_PAUSE);
        assert_eq!(f.rw.get(dev::rst_ctrl(2)), 0);
        assert_eq!(
            f.rw.get(dev::mac_ena_cfg(2)),
            dev::RX_ENA | dev::TX_ENA
        );
        assert_ne!(f.rw.get(qsys::switch_port_mode(2)) & qsys::PORT_ENA, 0);
        // tx pause is off, so no pause generation either.
        assert_eq!(f.rw.get(qsys::pause_cfg(2)) & qsys::PAUSE_ENA, 0);
    }

    #[test]
    fn lane_link_uses_last_pcs_mode() {
        use crate::regs::lane;
        let mut f = Esw6800::new(FakeFabric::default(), NoDelay);
        f.set_pcs_mode(1, PcsMode::Fx100).unwrap();
        f.rw.set(lane::pcs_status(1), lane::LINK_UP);
        match f.lane_link_mode(1).unwrap() {
            LinkMode::Up(p) => assert_eq!(p.speed, Speed::Speed100M),
            LinkMode::Down => panic!("expected link up"),
        }
    }
}

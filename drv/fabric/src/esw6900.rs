// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Backend for the second-generation ESW6900 fabric.
//!
//! Unlike the 6800, the 6900 moved speed selection into the clock-domain
//! reset register and split pause enables into their own MAC_FC_CFG word;
//! everything below the MAC is unchanged.

use crate::regs::{self, dev};
use crate::{pcs, port, serdes};
use crate::{FabricBackend, FabricRw, LinkError, Trace, MAX_LANES};
use drv_link_config::{Duplex, LinkMode, LinkParams, MediaType, PcsMode, Speed};
use embedded_hal::blocking::delay::DelayMs;
use ringbuf::ringbuf_entry_root as ringbuf_entry;

// MAC_MODE_CFG layout on this generation.
const FDX: u32 = 1 << 0;

fn speed_sel(speed: Speed) -> u32 {
    let sel = match speed {
        Speed::Speed10M => 0,
        Speed::Speed100M => 1,
        Speed::Speed1G => 2,
        Speed::Speed2G5 => 3,
    };
    sel << dev::SPEED_SEL_SHIFT
}

pub struct Esw6900<R, D> {
    pub rw: R,
    delay: D,
    pcs: [PcsMode; MAX_LANES],
}

impl<R: FabricRw, D: DelayMs<u32>> Esw6900<R, D> {
    pub fn new(rw: R, delay: D) -> Self {
        Self {
            rw,
            delay,
            pcs: [PcsMode::Sgmii; MAX_LANES],
        }
    }
}

impl<R: FabricRw, D: DelayMs<u32>> FabricBackend for Esw6900<R, D> {
    fn init(&mut self) -> Result<(), LinkError> {
        let id = self.rw.read(regs::CHIP_ID)?;
        let part = regs::chip_part(id);
        if part != regs::PART_ESW6900 {
            return Err(LinkError::BadChipId(id));
        }
        ringbuf_entry!(Trace::Init { part });
        port::apply_fwd_masks(&self.rw, 0)
    }

    fn port_up(
        &mut self,
        port: u8,
        params: LinkParams,
    ) -> Result<(), LinkError> {
        ringbuf_entry!(Trace::PortUp { port });
        // Releasing the resets and selecting the speed is one write here.
        self.rw.write(dev::rst_ctrl(port), speed_sel(params.speed))?;
        self.rw.write(
            dev::mac_mode_cfg(port),
            if params.duplex == Duplex::Full { FDX } else { 0 },
        )?;

        let mut fc = 0;
        if params.pause.rx {
            fc |= dev::FC_RX_ENA;
        }
        if params.pause.tx {
            fc |= dev::FC_TX_ENA;
        }
        self.rw.write(dev::mac_fc_cfg(port), fc)?;

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
    use crate::tests::{FakeFabric, NoDelay};
    use drv_link_config::{EeeClass, PauseMode};

    #[test]
    fn init_checks_identity() {
        let v = FakeFabric::default();
        v.set(regs::CHIP_ID, regs::PART_ESW6800 << 12);
        let mut f = Esw6900::new(v, NoDelay);
        assert_eq!(
            f.init(),
            Err(LinkError::BadChipId(regs::PART_ESW6800 << 12))
        );
    }

    #[test]
    fn port_up_uses_split_registers() {
        let mut f = Esw6900::new(FakeFabric::default(), NoDelay);
        f.port_up(
            7,
            LinkParams {
                speed: Speed::Speed100M,
                duplex: Duplex::Full,
                pause: PauseMode { rx: true, tx: true },
                eee: EeeClass::None,
            },
        )
        .unwrap();
        assert_eq!(
            f.rw.get(dev::rst_ctrl(7)) & dev::SPEED_SEL_MASK,
            1 << dev::SPEED_SEL_SHIFT
        );
        assert_eq!(f.rw.get(dev::mac_mode_cfg(7)), FDX);
        assert_eq!(
            f.rw.get(dev::mac_fc_cfg(7)),
            dev::FC_RX_ENA | dev::FC_TX_ENA
        );
    }
}

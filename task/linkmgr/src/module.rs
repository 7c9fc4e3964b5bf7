// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Poll-pass state machine for module (lane-attached) ports.

use embedded_hal::blocking::delay::DelayMs;
use ringbuf::ringbuf_entry_root as ringbuf_entry;

use drv_eth_phy::PhyRw;
use drv_fabric::FabricBackend;
use drv_link_config::{LinkMode, MediaType};
use drv_link_err::LinkError;
use drv_xcvr::{IdBlock, ModuleBus, ID_BLOCK_LEN};

use crate::{debounce, Fsm, LinkMgr, LinkNotify, Trace, FLAP_LIMIT};

/// Time for a freshly seated module's EEPROM to come up before the ID
/// block is read.
const MODULE_SETTLE_MS: u32 = 100;

impl<P, F, M, D, N> LinkMgr<'_, P, F, M, D, N>
where
    P: PhyRw,
    F: FabricBackend,
    M: ModuleBus,
    D: DelayMs<u32>,
    N: LinkNotify,
{
    pub(crate) fn module_step(
        &mut self,
        p: u8,
        lane: u8,
        default_media: MediaType,
        poll_edge: bool,
    ) {
        let fsm = self.ports[usize::from(p)].fsm;
        // Link sampling is paced by the poll edge; setup states advance on
        // every dispatch pass.
        if !poll_edge && matches!(fsm, Fsm::WaitingForLink | Fsm::LinkUp) {
            return;
        }
        match fsm {
            Fsm::Disabled => (),

            Fsm::SignalSetup => match self.fabric.enable_lane_clock(lane) {
                Ok(()) => {
                    self.ports[usize::from(p)].fsm = Fsm::SetupMode;
                    // No reason to burn a whole poll interval; look for a
                    // module in the same pass.
                    self.module_setup(p, lane, default_media);
                }
                Err(err) => {
                    ringbuf_entry!(Trace::FabricError { port: p, err })
                }
            },

            Fsm::SetupMode => self.module_setup(p, lane, default_media),

            Fsm::WaitingForLink => {
                match self.modules.is_present(lane) {
                    Ok(false) => {
                        self.module_absent(p, lane, default_media);
                        self.ports[usize::from(p)].fsm = Fsm::SetupMode;
                        return;
                    }
                    Ok(true) => (),
                    Err(err) => {
                        ringbuf_entry!(Trace::ModuleError { lane, err });
                        return;
                    }
                }
                if let Err(err) = self.modules.set_tx_enable(lane, true) {
                    ringbuf_entry!(Trace::ModuleError { lane, err });
                    return;
                }
                match self.sample_lane(lane) {
                    Ok(Some(LinkMode::Up(params))) => {
                        self.propagate_up(p, params);
                        self.ports[usize::from(p)].fsm = Fsm::LinkUp;
                    }
                    Ok(Some(LinkMode::Down)) | Ok(None) => (),
                    Err(err) => {
                        ringbuf_entry!(Trace::FabricError { port: p, err })
                    }
                }
            }

            Fsm::LinkUp => {
                // Removal first: a yanked module means the link state the
                // PCS reports is about a cable that's gone.
                match self.modules.is_present(lane) {
                    Ok(false) => {
                        self.module_drop(p);
                        self.module_absent(p, lane, default_media);
                        self.ports[usize::from(p)].fsm = Fsm::SetupMode;
                        return;
                    }
                    Ok(true) => (),
                    Err(err) => {
                        ringbuf_entry!(Trace::ModuleError { lane, err });
                        return;
                    }
                }
                match self.sample_lane(lane) {
                    Ok(Some(mode)) => {
                        if mode == self.ports[usize::from(p)].link_mode {
                            self.ports[usize::from(p)].flaps = 0;
                        } else {
                            self.module_drop(p);
                            self.ports[usize::from(p)].fsm =
                                Fsm::WaitingForLink;
                        }
                    }
                    Ok(None) => {
                        ringbuf_entry!(Trace::Flap { port: p });
                        let state = &mut self.ports[usize::from(p)];
                        state.flaps = state.flaps.saturating_add(1);
                        if state.flaps >= FLAP_LIMIT {
                            ringbuf_entry!(Trace::FlapLimit { port: p });
                            self.module_drop(p);
                            self.ports[usize::from(p)].fsm =
                                Fsm::WaitingForLink;
                        }
                    }
                    Err(err) => {
                        ringbuf_entry!(Trace::FabricError { port: p, err })
                    }
                }
            }

            // Copper-only state; a module port can't reach it.
            Fsm::SetupSpeedMode => (),
        }
    }

    /// Looks for a module in the cage and classifies it. Every failure
    /// leaves the port in `SetupMode` to try again next pass; a module
    /// that never becomes readable never brings the link up.
    fn module_setup(&mut self, p: u8, lane: u8, default_media: MediaType) {
        // Hold the transmitter off until the media is known.
        if let Err(err) = self.modules.set_tx_enable(lane, false) {
            ringbuf_entry!(Trace::ModuleError { lane, err });
            return;
        }

        match self.modules.is_present(lane) {
            Ok(true) => (),
            Ok(false) => {
                self.module_absent(p, lane, default_media);
                return;
            }
            Err(err) => {
                ringbuf_entry!(Trace::ModuleError { lane, err });
                return;
            }
        }

        self.delay.delay_ms(MODULE_SETTLE_MS);

        let media = match self.classify_module(lane) {
            Ok(media) => media,
            Err(err) => {
                ringbuf_entry!(Trace::ModuleError { lane, err });
                return;
            }
        };

        let effective = self.ports[usize::from(p)]
            .media_override
            .unwrap_or(default_media);
        if media != effective {
            ringbuf_entry!(Trace::MediaOverride { lane, media });
            if let Err(err) = self.fabric.set_lane_media(lane, media) {
                ringbuf_entry!(Trace::FabricError { port: p, err });
                return;
            }
            if let Err(err) =
                self.fabric.set_pcs_mode(lane, media.pcs_mode())
            {
                ringbuf_entry!(Trace::FabricError { port: p, err });
                return;
            }
        }
        let state = &mut self.ports[usize::from(p)];
        state.media_override =
            (media != default_media).then_some(media);
        state.fsm = Fsm::WaitingForLink;
    }

    fn classify_module(&mut self, lane: u8) -> Result<MediaType, LinkError> {
        let mut raw = [0u8; ID_BLOCK_LEN];
        self.modules.read_id_block(lane, &mut raw)?;
        IdBlock::parse(&raw)?.media()
    }

    fn sample_lane(
        &mut self,
        lane: u8,
    ) -> Result<Option<LinkMode>, LinkError> {
        let Self { fabric, delay, .. } = self;
        debounce::sample_agreeing(delay, || fabric.lane_link_mode(lane))
    }

    /// Undoes a media override when its module is gone, returning the lane
    /// to the board default.
    fn module_absent(&mut self, p: u8, lane: u8, default_media: MediaType) {
        if self.ports[usize::from(p)].media_override.take().is_none() {
            return;
        }
        if let Err(err) = self.fabric.set_lane_media(lane, default_media) {
            ringbuf_entry!(Trace::FabricError { port: p, err });
        }
        if let Err(err) =
            self.fabric.set_pcs_mode(lane, default_media.pcs_mode())
        {
            ringbuf_entry!(Trace::FabricError { port: p, err });
        }
    }

    /// Tears down an up module link.
    fn module_drop(&mut self, p: u8) {
        self.propagate_down(p);
        let state = &mut self.ports[usize::from(p)];
        state.flaps = 0;
    }
}

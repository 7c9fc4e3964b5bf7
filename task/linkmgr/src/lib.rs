// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Port link management.
//!
//! [`LinkMgr`] owns every front-panel port: it brings up the copper PHYs
//! and module lanes named in the board's [`config::PortMap`], polls them on
//! a fixed cadence, debounces what it sees, and propagates confirmed link
//! transitions into the switch fabric (MAC configuration, MAC table
//! hygiene, and the forwarding member mask). It also watches the PHY die
//! temperatures and sheds ports when the board runs hot.
//!
//! The manager is single-threaded: a fixed-period timer calls
//! [`LinkMgr::tick`] every [`TICK_MS`] milliseconds to latch work edges,
//! and the board's main loop calls [`LinkMgr::dispatch`] once per
//! iteration to run whatever came due. All hardware access happens inside
//! `dispatch`; `tick` only counts.

#![cfg_attr(not(test), no_std)]

pub mod config;

mod copper;
mod debounce;
mod module;
mod poll;
mod thermal;


use embedded_hal::blocking::delay::DelayMs;
use ringbuf::*;

use drv_eth_phy::{Phy, PhyFamily, PhyRw};
use drv_fabric::FabricBackend;
use drv_link_config::{FcPolicy, LinkMode, LinkParams, MediaType};
use drv_link_err::LinkError;
use drv_xcvr::ModuleBus;

use crate::config::{Attach, PortMap, NUM_PORTS};

/// Cadence the board's main loop is expected to call [`LinkMgr::tick`] at.
pub const TICK_MS: u32 = 10;

/// Ticks between poll passes (one pass every 500 ms).
pub const POLL_TICKS: u32 = 50;

/// Ticks per thermal sample (one per second).
pub const TICKS_PER_SEC: u32 = 100;

/// Consecutive disagreeing samples on an up link before we stop believing
/// it and force the port down.
pub(crate) const FLAP_LIMIT: u8 = 8;

/// Observer for confirmed link transitions, e.g. the management daemon.
pub trait LinkNotify {
    fn link_changed(&mut self, port: u8, mode: LinkMode);
}

/// No-op observer.
impl LinkNotify for () {
    fn link_changed(&mut self, _port: u8, _mode: LinkMode) {}
}

/// Per-port state machine position.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Fsm {
    /// Administratively (or thermally) off.
    #[default]
    Disabled,

    // Copper path
    /// Needs its advertisement programmed and autonegotiation restarted.
    SetupSpeedMode,

    // Module path
    /// Needs its lane clocks started.
    SignalSetup,
    /// Waiting for a readable module; classifies media when one appears.
    SetupMode,

    // Shared
    WaitingForLink,
    LinkUp,
}

#[derive(Copy, Clone, Default)]
struct PortState {
    fsm: Fsm,
    link_mode: LinkMode,
    enabled: bool,
    fc: FcPolicy,
    eee_admin: bool,
    /// Media the lane was re-tuned to for the inserted module, when it
    /// differs from the board default.
    media_override: Option<MediaType>,
    flaps: u8,
    /// Confirmed-down polls while waiting for link; drives the
    /// forced-100BASE-TX nudge.
    stuck_polls: u8,
    polarity_hold: bool,
    thermal_shed: bool,
}

#[derive(Copy, Clone, Default)]
struct ThermalState {
    /// Hottest die temperature from the most recent sample, if any sensor
    /// answered.
    last_temp: Option<i16>,
    /// Seconds left before shed ports are restored. Zero means the
    /// controller is idle.
    hold_secs: u32,
    /// Cumulative number of ports the controller wants shed.
    shed_target: u8,
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Trace {
    None,
    PollPass,
    LinkUp { port: u8 },
    LinkDown { port: u8 },
    Flap { port: u8 },
    FlapLimit { port: u8 },
    Nudge { port: u8 },
    MediaOverride { lane: u8, media: MediaType },
    PhyError { port: u8, err: LinkError },
    FabricError { port: u8, err: LinkError },
    ModuleError { lane: u8, err: LinkError },
    ThermalSample { max_temp: i16 },
    ThermalShed { port: u8 },
    ThermalRestore { port: u8 },
    PortEnabled { port: u8, enabled: bool },
}
ringbuf!(Trace, 64, Trace::None);

/// The link manager. Generic over the PHY bus, the fabric generation, the
/// module side-band bus, the delay source, and the transition observer, so
/// the whole thing runs against fakes on the host.
pub struct LinkMgr<'a, P, F, M, D, N> {
    map: &'a PortMap,
    phy_bus: P,
    fabric: F,
    modules: M,
    delay: D,
    notify: N,
    ports: [PortState; NUM_PORTS],
    families: [Option<PhyFamily>; NUM_PORTS],
    link_up: u64,
    ticks: u32,
    poll_pending: bool,
    thermal_pending: bool,
    thermal: ThermalState,
}

impl<'a, P, F, M, D, N> LinkMgr<'a, P, F, M, D, N>
where
    P: PhyRw,
    F: FabricBackend,
    M: ModuleBus,
    D: DelayMs<u32>,
    N: LinkNotify,
{
    /// Initializes the fabric and every configured port. Identification
    /// failures are fatal here: a board where the PHYs don't answer, or
    /// answer as the wrong part, should not limp along.
    pub fn new(
        map: &'a PortMap,
        phy_bus: P,
        fabric: F,
        modules: M,
        delay: D,
        notify: N,
    ) -> Result<Self, LinkError> {
        let mut mgr = Self {
            map,
            phy_bus,
            fabric,
            modules,
            delay,
            notify,
            ports: [PortState::default(); NUM_PORTS],
            families: [None; NUM_PORTS],
            link_up: 0,
            ticks: 0,
            poll_pending: false,
            thermal_pending: false,
            thermal: ThermalState::default(),
        };
        mgr.fabric.init()?;

        for p in 0..NUM_PORTS as u8 {
            match map.port_config(p) {
                None => continue,
                Some(Attach::Phy { addr }) => {
                    let family = {
                        let phy = Phy::new(addr, &mut mgr.phy_bus);
                        let family = PhyFamily::identify(&phy)?;
                        family.init(&phy, &mut mgr.delay)?;
                        family
                    };
                    mgr.families[usize::from(p)] = Some(family);
                    let state = &mut mgr.ports[usize::from(p)];
                    state.enabled = true;
                    state.fsm = Fsm::SetupSpeedMode;
                }
                Some(Attach::Lane { lane, default_media }) => {
                    mgr.fabric.set_lane_media(lane, default_media)?;
                    mgr.fabric
                        .set_pcs_mode(lane, default_media.pcs_mode())?;
                    let state = &mut mgr.ports[usize::from(p)];
                    state.enabled = true;
                    state.fsm = Fsm::SignalSetup;
                }
            }
        }
        Ok(mgr)
    }

    ////////////////////////////////////////////////////////////////////////
    // Link propagation

    /// Publishes a confirmed link-up: MAC parameters, the forwarding mask,
    /// and the observer. Fabric errors are traced but don't unwind the
    /// state machine; the next pass retries from the top.
    fn propagate_up(&mut self, p: u8, params: LinkParams) {
        ringbuf_entry!(Trace::LinkUp { port: p });
        let state = &mut self.ports[usize::from(p)];
        state.link_mode = LinkMode::Up(params);
        state.flaps = 0;
        state.stuck_polls = 0;

        if let Err(err) = self.fabric.port_up(p, params) {
            ringbuf_entry!(Trace::FabricError { port: p, err });
        }
        self.link_up |= 1 << p;
        if let Err(err) = self.fabric.update_port_masks(self.link_up) {
            ringbuf_entry!(Trace::FabricError { port: p, err });
        }
        self.notify.link_changed(p, LinkMode::Up(params));
    }

    /// Publishes a link-down: drains the port, forgets every address
    /// learned behind it, and shrinks the forwarding mask. The observer
    /// only hears about it if the link was actually up.
    fn propagate_down(&mut self, p: u8) {
        let was_up = self.ports[usize::from(p)].link_mode.is_up();
        if was_up {
            ringbuf_entry!(Trace::LinkDown { port: p });
        }
        self.ports[usize::from(p)].link_mode = LinkMode::Down;
        self.link_up &= !(1 << p);

        if let Err(err) = self.fabric.port_down(p) {
            ringbuf_entry!(Trace::FabricError { port: p, err });
        }
        if let Err(err) = self.fabric.flush_mac_table(p) {
            ringbuf_entry!(Trace::FabricError { port: p, err });
        }
        if let Err(err) = self.fabric.update_port_masks(self.link_up) {
            ringbuf_entry!(Trace::FabricError { port: p, err });
        }
        if was_up {
            self.notify.link_changed(p, LinkMode::Down);
        }
    }

    ////////////////////////////////////////////////////////////////////////
    // Administrative interface

    fn port_cfg(&self, p: u8) -> Result<Attach, LinkError> {
        if usize::from(p) >= NUM_PORTS {
            return Err(LinkError::InvalidPort(p));
        }
        self.map.port_config(p).ok_or(LinkError::UnconfiguredPort(p))
    }

    /// Administratively enables or disables a port.
    ///
    /// Enabling always takes effect, including on a port the thermal
    /// controller shed: the operator outranks the controller, and the shed
    /// bookkeeping for that port is dropped.
    pub fn set_port_enabled(
        &mut self,
        p: u8,
        enabled: bool,
    ) -> Result<(), LinkError> {
        let cfg = self.port_cfg(p)?;
        ringbuf_entry!(Trace::PortEnabled { port: p, enabled });
        {
            let state = &mut self.ports[usize::from(p)];
            state.enabled = enabled;
            state.thermal_shed = false;
            state.flaps = 0;
            state.stuck_polls = 0;
        }

        if enabled {
            // Reseeding the FSM abandons any established link; publish the
            // down first so the mask and the observer stay honest.
            if self.ports[usize::from(p)].link_mode.is_up() {
                self.propagate_down(p);
            }
            match cfg {
                Attach::Phy { addr } => {
                    let phy = Phy::new(addr, &mut self.phy_bus);
                    phy.set_low_power(false)?;
                    self.ports[usize::from(p)].fsm = Fsm::SetupSpeedMode;
                }
                Attach::Lane { .. } => {
                    self.ports[usize::from(p)].fsm = Fsm::SignalSetup;
                }
            }
        } else {
            self.ports[usize::from(p)].fsm = Fsm::Disabled;
            match cfg {
                Attach::Phy { addr } => {
                    let hold = self.ports[usize::from(p)].polarity_hold;
                    let phy = Phy::new(addr, &mut self.phy_bus);
                    if hold {
                        phy.set_polarity_hold(false)?;
                    }
                    phy.set_low_power(true)?;
                    self.ports[usize::from(p)].polarity_hold = false;
                }
                Attach::Lane { lane, .. } => {
                    self.modules.set_tx_enable(lane, false)?;
                }
            }
            self.propagate_down(p);
        }
        Ok(())
    }

    /// Changes the port's flow-control policy. On copper this means a new
    /// advertisement, so an established link renegotiates.
    pub fn set_fc_policy(
        &mut self,
        p: u8,
        fc: FcPolicy,
    ) -> Result<(), LinkError> {
        let cfg = self.port_cfg(p)?;
        self.ports[usize::from(p)].fc = fc;
        if let Attach::Phy { .. } = cfg {
            self.renegotiate(p);
        }
        Ok(())
    }

    /// Enables or disables EEE advertisement on a copper port. Ignored (but
    /// stored) for module ports, which have no EEE.
    pub fn set_eee_enabled(
        &mut self,
        p: u8,
        eee: bool,
    ) -> Result<(), LinkError> {
        let cfg = self.port_cfg(p)?;
        self.ports[usize::from(p)].eee_admin = eee;
        if let Attach::Phy { .. } = cfg {
            self.renegotiate(p);
        }
        Ok(())
    }

    /// Kicks an enabled copper port back to advertisement setup.
    fn renegotiate(&mut self, p: u8) {
        match self.ports[usize::from(p)].fsm {
            Fsm::Disabled => (),
            Fsm::LinkUp => {
                self.propagate_down(p);
                self.ports[usize::from(p)].fsm = Fsm::SetupSpeedMode;
            }
            _ => self.ports[usize::from(p)].fsm = Fsm::SetupSpeedMode,
        }
    }

    pub fn port_enabled(&self, p: u8) -> Result<bool, LinkError> {
        self.port_cfg(p)?;
        Ok(self.ports[usize::from(p)].enabled)
    }

    pub fn fc_policy(&self, p: u8) -> Result<FcPolicy, LinkError> {
        self.port_cfg(p)?;
        Ok(self.ports[usize::from(p)].fc)
    }

    pub fn eee_enabled(&self, p: u8) -> Result<bool, LinkError> {
        self.port_cfg(p)?;
        Ok(self.ports[usize::from(p)].eee_admin)
    }

    pub fn link_mode(&self, p: u8) -> Result<LinkMode, LinkError> {
        self.port_cfg(p)?;
        Ok(self.ports[usize::from(p)].link_mode)
    }

    pub fn is_link_up(&self, p: u8) -> Result<bool, LinkError> {
        Ok(self.link_mode(p)?.is_up())
    }

    /// Bit N set means port N has a confirmed link. This is the same value
    /// last written to the fabric's forwarding mask.
    pub fn link_up_mask(&self) -> u64 {
        self.link_up
    }

    /// Seconds left on the thermal hold, or `None` when no ports are shed.
    pub fn thermal_hold_remaining(&self) -> Option<u32> {
        (self.thermal.hold_secs > 0).then_some(self.thermal.hold_secs)
    }

    /// Hottest PHY die temperature from the last thermal sample, in °C.
    pub fn last_temperature(&self) -> Option<i16> {
        self.thermal.last_temp
    }

    pub fn port_count(&self) -> usize {
        self.map.len()
    }
}

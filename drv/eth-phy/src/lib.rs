// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! This crate provides functions for working with GXL copper PHYs
//! (in particular, the GXL8312 and GXL8110).
//!
//! It relies heavily on the trait [PhyRw], which callers must implement. This
//! trait is an abstraction over reading and writing raw PHY registers.
#![cfg_attr(not(test), no_std)]

pub mod regs;

pub mod gxl8110;
pub mod gxl8312;

use core::cell::Cell;
use embedded_hal::blocking::delay::DelayMs;
use ringbuf::*;

use drv_link_config::{
    Duplex, EeeClass, FcPolicy, LinkMode, LinkParams, PauseMode, Speed,
};
pub use drv_link_err::LinkError;

use crate::regs::{standard, vendor, PhyReg, PAGE_ADDR};

////////////////////////////////////////////////////////////////////////////////

/// Trait implementing communication with an ethernet PHY.
pub trait PhyRw {
    /// Reads a register from the PHY without changing the page.  This should
    /// never be called directly, because the page could be incorrect, but
    /// it's a required building block for `read`
    fn read_raw(&self, phy: u8, addr: u8) -> Result<u16, LinkError>;

    /// Writes a register to the PHY without changing the page.  This should
    /// never be called directly, because the page could be incorrect, but
    /// it's a required building block for `read` and `write`
    fn write_raw(&self, phy: u8, addr: u8, value: u16)
        -> Result<(), LinkError>;
}

/// Handle for interacting with a particular PHY port.  This handle assumes
/// exclusive access to the port, because it tracks the current page and
/// minimizes page-change writes.  This is _somewhat_ enforced by the
/// ownership rules, as we have an exclusive (mutable) reference to the
/// `PhyRw` object `rw`.
pub struct Phy<'a, P> {
    pub port: u8,
    pub rw: &'a mut P,
    last_page: Cell<Option<u16>>,
}

impl<'a, P: PhyRw> Phy<'a, P> {
    pub fn new(port: u8, rw: &'a mut P) -> Self {
        Self {
            port,
            rw,
            last_page: Cell::new(None),
        }
    }

    /// Sets the PAGE register if it doesn't match.  This assumes that no one
    /// else is allowed to modify the PHY registers, which is mentioned in the
    /// `struct Phy` docstring.
    #[inline(always)]
    fn set_page(&self, page: u16) -> Result<(), LinkError> {
        if self.last_page.get().map(|p| p != page).unwrap_or(true) {
            self.rw.write_raw(self.port, PAGE_ADDR, page)?;
            self.last_page.set(Some(page));
        }
        Ok(())
    }

    #[inline(always)]
    pub fn read(&self, reg: PhyReg) -> Result<u16, LinkError> {
        self.set_page(reg.page)?;
        self.rw.read_raw(self.port, reg.addr)
    }

    #[inline(always)]
    pub fn write(&self, reg: PhyReg, value: u16) -> Result<(), LinkError> {
        self.set_page(reg.page)?;
        self.rw.write_raw(self.port, reg.addr, value)
    }

    /// Performs a read-modify-write operation on a PHY register.
    #[inline(always)]
    pub fn modify<F>(&self, reg: PhyReg, f: F) -> Result<(), LinkError>
    where
        F: Fn(&mut u16),
    {
        let mut data = self.read(reg)?;
        f(&mut data);
        self.write(reg, data)
    }

    /// Polls `reg` until `f` returns true, sleeping 1 ms between attempts
    /// and giving up after 32 of them.
    #[inline(always)]
    pub fn wait_timeout<F, D>(
        &self,
        reg: PhyReg,
        delay: &mut D,
        f: F,
    ) -> Result<(), LinkError>
    where
        F: Fn(u16) -> bool,
        D: DelayMs<u32>,
    {
        for _ in 0..32 {
            let r = self.read(reg)?;
            if f(r) {
                return Ok(());
            }
            delay.delay_ms(1);
        }
        Err(LinkError::PhyInitTimeout)
    }

    /// Reads the 32-bit PHY identifier, including the revision nibble.
    pub fn read_id(&self) -> Result<u32, LinkError> {
        let id1 = self.read(standard::IDENTIFIER_1)?;
        let id2 = self.read(standard::IDENTIFIER_2)?;
        Ok((u32::from(id1) << 16) | u32::from(id2))
    }

    /// Triggers a software reset and waits for the reset bit to clear.
    pub fn software_reset<D: DelayMs<u32>>(
        &self,
        delay: &mut D,
    ) -> Result<(), LinkError> {
        ringbuf_entry!(Trace::Reset(self.port));
        self.modify(standard::MODE_CONTROL, |r| {
            *r |= standard::SW_RESET;
        })?;
        self.wait_timeout(standard::MODE_CONTROL, delay, |r| {
            r & standard::SW_RESET == 0
        })?;
        // The page register came back up as 0.
        self.last_page.set(Some(0));
        Ok(())
    }

    /// Programs the autonegotiation advertisement: all copper speeds, pause
    /// bits from `fc`, and EEE for 100/1000 when `eee` is set.  Does not
    /// restart autonegotiation; callers follow up with [`Phy::restart_aneg`].
    pub fn set_advertisement(
        &self,
        fc: FcPolicy,
        eee: bool,
    ) -> Result<(), LinkError> {
        let adv = standard::ADV_10_HALF
            | standard::ADV_10_FULL
            | standard::ADV_100_HALF
            | standard::ADV_100_FULL
            | fc_advert_bits(fc);
        self.write(standard::ANEG_ADVERTISE, adv)?;
        self.modify(standard::GBIT_CONTROL, |r| {
            *r |= standard::ADV_1000_FULL;
        })?;
        let eee_adv = if eee {
            vendor::EEE_100 | vendor::EEE_1000
        } else {
            0
        };
        self.write(vendor::EEE_ADV, eee_adv)
    }

    /// Enables and restarts autonegotiation.
    pub fn restart_aneg(&self) -> Result<(), LinkError> {
        self.modify(standard::MODE_CONTROL, |r| {
            *r |= standard::ANEG_ENA | standard::ANEG_RESTART;
        })
    }

    /// Reads the current link state, resolving speed, duplex, pause, and EEE
    /// when the link is up and autonegotiation has finished.
    ///
    /// The link bit in MODE_STATUS is latch-low: a link that dropped and came
    /// back reads as down once.  We read the register twice and trust the
    /// second value, so a past drop is reported (once) as down, which is what
    /// the caller's debounce logic wants to see.
    pub fn read_link_mode(&self) -> Result<LinkMode, LinkError> {
        let _ = self.read(standard::MODE_STATUS)?;
        let status = self.read(standard::MODE_STATUS)?;
        if status & standard::LINK_UP == 0
            || status & standard::ANEG_DONE == 0
        {
            return Ok(LinkMode::Down);
        }

        let aux = self.read(standard::AUX_STATUS)?;
        if aux & standard::AUX_RESOLVED == 0 {
            return Ok(LinkMode::Down);
        }
        let speed = match aux & standard::AUX_SPEED_MASK {
            standard::AUX_SPEED_10 => Speed::Speed10M,
            standard::AUX_SPEED_100 => Speed::Speed100M,
            standard::AUX_SPEED_1000 => Speed::Speed1G,
            // Reserved encoding; treat the resolution as not done yet.
            _ => return Ok(LinkMode::Down),
        };
        let duplex = if aux & standard::AUX_DUPLEX_FULL != 0 {
            Duplex::Full
        } else {
            Duplex::Half
        };

        let local = self.read(standard::ANEG_ADVERTISE)?;
        let partner = self.read(standard::ANEG_LP_ABILITY)?;
        let pause = resolve_pause(local, partner);

        let eee_resolve = self.read(vendor::EEE_RESOLVE)?;
        let eee = match speed {
            Speed::Speed1G if eee_resolve & vendor::EEE_1000 != 0 => {
                EeeClass::Eee1000
            }
            Speed::Speed100M if eee_resolve & vendor::EEE_100 != 0 => {
                EeeClass::Eee100
            }
            _ => EeeClass::None,
        };

        Ok(LinkMode::Up(LinkParams {
            speed,
            duplex,
            pause,
            eee,
        }))
    }

    /// Applies or removes the pair-polarity hold.  The silicon mis-detects
    /// MDI polarity at 1 Gb/s full duplex; callers set the hold for exactly
    /// that resolved mode and clear it otherwise.
    pub fn set_polarity_hold(&self, enable: bool) -> Result<(), LinkError> {
        ringbuf_entry!(Trace::PolarityHold {
            port: self.port,
            enable,
        });
        self.modify(regs::extended::POLARITY_CTRL, |r| {
            if enable {
                *r |= regs::extended::POLARITY_HOLD;
            } else {
                *r &= !regs::extended::POLARITY_HOLD;
            }
        })
    }

    /// Unsticks a link partner that is forced to 100BASE-TX (no
    /// autonegotiation on its side): briefly flip our autonegotiation enable
    /// bit and put the register back, which restarts parallel detection.
    /// The rest of MODE_CONTROL is preserved across the toggle.
    pub fn nudge_forced_100tx(&self) -> Result<(), LinkError> {
        ringbuf_entry!(Trace::Nudge100Tx(self.port));
        let ctrl = self.read(standard::MODE_CONTROL)?;
        self.write(standard::MODE_CONTROL, ctrl ^ standard::ANEG_ENA)?;
        self.write(standard::MODE_CONTROL, ctrl)
    }

    /// Sets or clears the IEEE low-power (power-down) bit.
    pub fn set_low_power(&self, low_power: bool) -> Result<(), LinkError> {
        self.modify(standard::MODE_CONTROL, |r| {
            if low_power {
                *r |= standard::LOW_POWER;
            } else {
                *r &= !standard::LOW_POWER;
            }
        })
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Advertisement bits for a flow-control policy, per 802.3 clause 28.
///
/// `PAUSE` alone offers symmetric pause; `ASYM` modifies it into the
/// direction-restricted variants.
pub fn fc_advert_bits(fc: FcPolicy) -> u16 {
    match fc {
        FcPolicy::Off => 0,
        FcPolicy::Symmetric => standard::ADV_PAUSE,
        FcPolicy::RxOnly => standard::ADV_PAUSE | standard::ADV_ASYM_PAUSE,
        FcPolicy::TxOnly => standard::ADV_ASYM_PAUSE,
    }
}

/// Resolves the pause configuration from our advertisement and the link
/// partner's ability word, per 802.3 Annex 28B.3.
pub fn resolve_pause(local: u16, partner: u16) -> PauseMode {
    let l_pause = local & standard::ADV_PAUSE != 0;
    let l_asym = local & standard::ADV_ASYM_PAUSE != 0;
    let p_pause = partner & standard::ADV_PAUSE != 0;
    let p_asym = partner & standard::ADV_ASYM_PAUSE != 0;

    if l_pause && p_pause {
        PauseMode { rx: true, tx: true }
    } else if !l_pause && l_asym && p_pause && p_asym {
        PauseMode { rx: false, tx: true }
    } else if l_pause && l_asym && !p_pause && p_asym {
        PauseMode { rx: true, tx: false }
    } else {
        PauseMode {
            rx: false,
            tx: false,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Copy, Clone, Debug, PartialEq)]
enum Trace {
    None,
    Gxl8312Init(u8),
    Gxl8110Init(u8),
    Reset(u8),
    Nudge100Tx(u8),
    PolarityHold { port: u8, enable: bool },
}
ringbuf!(Trace, 16, Trace::None);

////////////////////////////////////////////////////////////////////////////////

/// 32-bit identifier shared by all GXL8312 revisions (revision nibble
/// masked off).
pub const GXL8312_ID: u32 = 0x001c_8310;

/// 32-bit identifier shared by all GXL8110 revisions.
pub const GXL8110_ID: u32 = 0x001c_8110;

/// The supported GXL copper PHY families.  They share the clause-22 and
/// vendor register layout above; the variants differ in bring-up and in how
/// the temperature sensor is sampled.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PhyFamily {
    Gxl8312,
    Gxl8110,
}

impl PhyFamily {
    /// Reads the identifier registers and picks a family, ignoring the
    /// low revision nibble.  Returns [`LinkError::UnknownPhyId`] for
    /// anything else on the bus.
    pub fn identify<P: PhyRw>(phy: &Phy<'_, P>) -> Result<Self, LinkError> {
        let id = phy.read_id()?;
        match id & !0xf {
            GXL8312_ID => Ok(PhyFamily::Gxl8312),
            GXL8110_ID => Ok(PhyFamily::Gxl8110),
            _ => Err(LinkError::UnknownPhyId(id)),
        }
    }

    /// Resets and configures the PHY, leaving autonegotiation stopped and
    /// the temperature sensor running.
    pub fn init<P: PhyRw, D: DelayMs<u32>>(
        &self,
        phy: &Phy<'_, P>,
        delay: &mut D,
    ) -> Result<(), LinkError> {
        match self {
            PhyFamily::Gxl8312 => gxl8312::Gxl8312Phy { phy }.init(delay),
            PhyFamily::Gxl8110 => gxl8110::Gxl8110Phy { phy }.init(delay),
        }
    }

    /// Reads the die temperature in degrees Celsius.
    pub fn read_temperature<P: PhyRw, D: DelayMs<u32>>(
        &self,
        phy: &Phy<'_, P>,
        delay: &mut D,
    ) -> Result<i16, LinkError> {
        match self {
            PhyFamily::Gxl8312 => {
                gxl8312::Gxl8312Phy { phy }.read_temperature()
            }
            PhyFamily::Gxl8110 => {
                gxl8110::Gxl8110Phy { phy }.read_temperature(delay)
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Register-level fake: a map from (page, address) to value, with the
    /// page selected through register 31 like the real part.
    #[derive(Default)]
    pub(crate) struct FakeBus {
        pub(crate) state: RefCell<FakeState>,
    }

    #[derive(Default)]
    pub(crate) struct FakeState {
        pub(crate) page: u16,
        pub(crate) regs: HashMap<(u16, u8), u16>,
        pub(crate) page_writes: usize,
    }

    impl FakeBus {
        pub(crate) fn set(&self, reg: PhyReg, value: u16) {
            self.state
                .borrow_mut()
                .regs
                .insert((reg.page, reg.addr), value);
        }

        pub(crate) fn get(&self, reg: PhyReg) -> u16 {
            *self
                .state
                .borrow()
                .regs
                .get(&(reg.page, reg.addr))
                .unwrap_or(&0)
        }
    }

    impl PhyRw for FakeBus {
        fn read_raw(&self, _phy: u8, addr: u8) -> Result<u16, LinkError> {
            let s = self.state.borrow();
            Ok(*s.regs.get(&(s.page, addr)).unwrap_or(&0))
        }

        fn write_raw(
            &self,
            _phy: u8,
            addr: u8,
            value: u16,
        ) -> Result<(), LinkError> {
            let mut s = self.state.borrow_mut();
            if addr == PAGE_ADDR {
                s.page = value;
                s.page_writes += 1;
            } else {
                let page = s.page;
                // The reset bit self-clears instantly in this fake.
                let stored = if page == 0
                    && addr == standard::MODE_CONTROL.addr
                {
                    value & !standard::SW_RESET
                } else {
                    value
                };
                s.regs.insert((page, addr), stored);
            }
            Ok(())
        }
    }

    pub(crate) struct NoDelay;
    impl DelayMs<u32> for NoDelay {
        fn delay_ms(&mut self, _ms: u32) {}
    }

    fn link_up_regs(bus: &FakeBus, aux: u16) {
        bus.set(
            standard::MODE_STATUS,
            standard::LINK_UP | standard::ANEG_DONE,
        );
        bus.set(standard::AUX_STATUS, standard::AUX_RESOLVED | aux);
    }

    #[test]
    fn page_register_is_cached() {
        let mut bus = FakeBus::default();
        let phy = Phy::new(0, &mut bus);
        phy.read(standard::MODE_STATUS).unwrap();
        phy.read(standard::MODE_CONTROL).unwrap();
        phy.read(vendor::EEE_ADV).unwrap();
        phy.read(vendor::EEE_RESOLVE).unwrap();
        // One page write for page 0, one for page 2.
        assert_eq!(phy.rw.state.borrow().page_writes, 2);
    }

    #[test]
    fn down_when_link_bit_clear() {
        let mut bus = FakeBus::default();
        bus.set(standard::MODE_STATUS, standard::ANEG_DONE);
        let phy = Phy::new(0, &mut bus);
        assert_eq!(phy.read_link_mode().unwrap(), LinkMode::Down);
    }

    #[test]
    fn down_when_aneg_incomplete() {
        let mut bus = FakeBus::default();
        bus.set(standard::MODE_STATUS, standard::LINK_UP);
        let phy = Phy::new(0, &mut bus);
        assert_eq!(phy.read_link_mode().unwrap(), LinkMode::Down);
    }

    #[test]
    fn down_when_unresolved() {
        let mut bus = FakeBus::default();
        bus.set(
            standard::MODE_STATUS,
            standard::LINK_UP | standard::ANEG_DONE,
        );
        bus.set(standard::AUX_STATUS, standard::AUX_SPEED_1000);
        let phy = Phy::new(0, &mut bus);
        assert_eq!(phy.read_link_mode().unwrap(), LinkMode::Down);
    }

    #[test]
    fn resolves_1g_full_with_symmetric_pause() {
        let mut bus = FakeBus::default();
        link_up_regs(
            &bus,
            standard::AUX_SPEED_1000 | standard::AUX_DUPLEX_FULL,
        );
        bus.set(standard::ANEG_ADVERTISE, standard::ADV_PAUSE);
        bus.set(standard::ANEG_LP_ABILITY, standard::ADV_PAUSE);
        bus.set(vendor::EEE_RESOLVE, vendor::EEE_1000);
        let phy = Phy::new(0, &mut bus);
        assert_eq!(
            phy.read_link_mode().unwrap(),
            LinkMode::Up(LinkParams {
                speed: Speed::Speed1G,
                duplex: Duplex::Full,
                pause: PauseMode { rx: true, tx: true },
                eee: EeeClass::Eee1000,
            })
        );
    }

    #[test]
    fn eee_class_tracks_speed() {
        let mut bus = FakeBus::default();
        link_up_regs(&bus, standard::AUX_SPEED_100 | standard::AUX_DUPLEX_FULL);
        // A stale 1000 resolution bit must not count at 100 Mb/s.
        bus.set(vendor::EEE_RESOLVE, vendor::EEE_1000);
        let phy = Phy::new(0, &mut bus);
        match phy.read_link_mode().unwrap() {
            LinkMode::Up(p) => {
                assert_eq!(p.speed, Speed::Speed100M);
                assert_eq!(p.eee, EeeClass::None);
            }
            LinkMode::Down => panic!("expected link up"),
        }
    }

    #[test]
    fn pause_resolution_matrix() {
        let p = standard::ADV_PAUSE;
        let a = standard::ADV_ASYM_PAUSE;
        // (local, partner, rx, tx)
        let cases = [
            (p, p, true, true),
            (p | a, p, true, true),
            (a, p | a, false, true),
            (p | a, a, true, false),
            (0, p | a, false, false),
            (a, p, false, false),
            (0, 0, false, false),
        ];
        for (local, partner, rx, tx) in cases {
            assert_eq!(
                resolve_pause(local, partner),
                PauseMode { rx, tx },
                "local={local:#06x} partner={partner:#06x}"
            );
        }
    }

    #[test]
    fn advertisement_respects_fc_policy() {
        let mut bus = FakeBus::default();
        let phy = Phy::new(0, &mut bus);
        phy.set_advertisement(FcPolicy::RxOnly, true).unwrap();
        let adv = phy.rw.get(standard::ANEG_ADVERTISE);
        assert_ne!(adv & standard::ADV_PAUSE, 0);
        assert_ne!(adv & standard::ADV_ASYM_PAUSE, 0);
        assert_ne!(adv & standard::ADV_100_FULL, 0);
        assert_ne!(
            phy.rw.get(standard::GBIT_CONTROL) & standard::ADV_1000_FULL,
            0
        );
        assert_eq!(
            phy.rw.get(vendor::EEE_ADV),
            vendor::EEE_100 | vendor::EEE_1000
        );
    }

    #[test]
    fn nudge_preserves_mode_control() {
        let mut bus = FakeBus::default();
        let ctrl = standard::ANEG_ENA | standard::DUPLEX_FULL;
        bus.set(standard::MODE_CONTROL, ctrl);
        let phy = Phy::new(0, &mut bus);
        phy.nudge_forced_100tx().unwrap();
        assert_eq!(phy.rw.get(standard::MODE_CONTROL), ctrl);
    }

    #[test]
    fn identify_masks_revision() {
        let mut bus = FakeBus::default();
        bus.set(standard::IDENTIFIER_1, (GXL8312_ID >> 16) as u16);
        bus.set(standard::IDENTIFIER_2, (GXL8312_ID & 0xffff) as u16 | 0x3);
        let phy = Phy::new(0, &mut bus);
        assert_eq!(PhyFamily::identify(&phy).unwrap(), PhyFamily::Gxl8312);
    }

    #[test]
    fn identify_rejects_strangers() {
        let mut bus = FakeBus::default();
        bus.set(standard::IDENTIFIER_1, 0x1234);
        bus.set(standard::IDENTIFIER_2, 0x5678);
        let phy = Phy::new(0, &mut bus);
        assert_eq!(
            PhyFamily::identify(&phy),
            Err(LinkError::UnknownPhyId(0x1234_5678))
        );
    }

    #[test]
    fn wait_timeout_gives_up() {
        let mut bus = FakeBus::default();
        let phy = Phy::new(0, &mut bus);
        let r = phy.wait_timeout(standard::MODE_CONTROL, &mut NoDelay, |r| {
            r & standard::SW_RESET == 0 && r != 0
        });
        assert_eq!(r, Err(LinkError::PhyInitTimeout));
    }
}

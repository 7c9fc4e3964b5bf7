// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! PCS mode selection and link decoding for serdes lanes.

use crate::regs::lane;
use crate::{FabricRw, LinkError};
use drv_link_config::{
    Duplex, EeeClass, LinkMode, LinkParams, PauseMode, PcsMode, Speed,
};

fn mode_bits(mode: PcsMode) -> u32 {
    match mode {
        PcsMode::Sgmii => lane::PCS_MODE_SGMII,
        PcsMode::Clause37 => lane::PCS_MODE_CLAUSE37,
        PcsMode::Fx100 => lane::PCS_MODE_FX100,
    }
}

/// Switches the lane's PCS operating mode, leaving the PCS enabled.
pub(crate) fn set_mode<R: FabricRw>(
    v: &R,
    l: u8,
    mode: PcsMode,
) -> Result<(), LinkError> {
    v.modify(lane::pcs_cfg(l), |r| {
        *r = (*r & !lane::PCS_MODE_MASK) | mode_bits(mode) | lane::PCS_ENA;
    })
}

/// Reads and decodes the lane's link state for the PCS mode it was last
/// configured in (the status register's speed field is only meaningful for
/// SGMII, and the partner ability word only for clause 37).
pub(crate) fn link_mode<R: FabricRw>(
    v: &R,
    l: u8,
    mode: PcsMode,
) -> Result<LinkMode, LinkError> {
    let status = v.read(lane::pcs_status(l))?;
    if status & lane::LINK_UP == 0 {
        return Ok(LinkMode::Down);
    }

    let params = match mode {
        // 100BASE-FX has no in-band signaling at all; a lane with signal
        // lock is a 100M full-duplex link.
        PcsMode::Fx100 => LinkParams {
            speed: Speed::Speed100M,
            duplex: Duplex::Full,
            pause: PauseMode::default(),
            eee: EeeClass::None,
        },

        // SGMII: the far-end PHY reports its resolution in-band.
        PcsMode::Sgmii => {
            let speed = match status & lane::SPEED_MASK {
                lane::SPEED_10 => Speed::Speed10M,
                lane::SPEED_100 => Speed::Speed100M,
                lane::SPEED_1000 => Speed::Speed1G,
                _ => return Ok(LinkMode::Down),
            };
            let duplex = if status & lane::DUPLEX_FULL != 0 {
                Duplex::Full
            } else {
                Duplex::Half
            };
            LinkParams {
                speed,
                duplex,
                // SGMII's in-band word carries no pause bits.
                pause: PauseMode::default(),
                eee: EeeClass::None,
            }
        }

        // Clause 37: always gigabit; pause comes from the partner's base
        // page. We advertise symmetric pause, so the partner's PAUSE bit
        // resolves both directions at once.
        PcsMode::Clause37 => {
            if status & lane::ANEG_DONE == 0 {
                return Ok(LinkMode::Down);
            }
            let lp = v.read(lane::pcs_lp_ability(l))?;
            let pause = lp & lane::LP_PAUSE != 0;
            LinkParams {
                speed: Speed::Speed1G,
                duplex: Duplex::Full,
                pause: PauseMode {
                    rx: pause,
                    tx: pause,
                },
                eee: EeeClass::None,
            }
        }
    };
    Ok(LinkMode::Up(params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::FakeFabric;

    #[test]
    fn mode_switch_keeps_pcs_enabled() {
        let v = FakeFabric::default();
        set_mode(&v, 1, PcsMode::Clause37).unwrap();
        let cfg = v.get(lane::pcs_cfg(1));
        assert_eq!(cfg & lane::PCS_MODE_MASK, lane::PCS_MODE_CLAUSE37);
        assert_ne!(cfg & lane::PCS_ENA, 0);
    }

    #[test]
    fn fx100_is_fixed_100_full() {
        let v = FakeFabric::default();
        v.set(lane::pcs_status(0), lane::LINK_UP);
        let m = link_mode(&v, 0, PcsMode::Fx100).unwrap();
        assert_eq!(
            m,
            LinkMode::Up(LinkParams {
                speed: Speed::Speed100M,
                duplex: Duplex::Full,
                pause: PauseMode::default(),
                eee: EeeClass::None,
            })
        );
    }

    #[test]
    fn sgmii_decodes_inband_resolution() {
        let v = FakeFabric::default();
        v.set(
            lane::pcs_status(3),
            lane::LINK_UP | lane::SPEED_1000 | lane::DUPLEX_FULL,
        );
        match link_mode(&v, 3, PcsMode::Sgmii).unwrap() {
            LinkMode::Up(p) => {
                assert_eq!(p.speed, Speed::Speed1G);
                assert_eq!(p.duplex, Duplex::Full);
            }
            LinkMode::Down => panic!("expected link up"),
        }
    }

    #[test]
    fn clause37_waits_for_aneg() {
        let v = FakeFabric::default();
        v.set(lane::pcs_status(2), lane::LINK_UP);
        assert_eq!(
            link_mode(&v, 2, PcsMode::Clause37).unwrap(),
            LinkMode::Down
        );

        v.set(lane::pcs_status(2), lane::LINK_UP | lane::ANEG_DONE);
        v.set(lane::pcs_lp_ability(2), lane::LP_FDX | lane::LP_PAUSE);
        match link_mode(&v, 2, PcsMode::Clause37).unwrap() {
            LinkMode::Up(p) => {
                assert_eq!(p.speed, Speed::Speed1G);
                assert!(p.pause.rx && p.pause.tx);
            }
            LinkMode::Down => panic!("expected link up"),
        }
    }

    #[test]
    fn no_signal_is_down_in_every_mode() {
        let v = FakeFabric::default();
        for mode in [PcsMode::Sgmii, PcsMode::Clause37, PcsMode::Fx100] {
            assert_eq!(link_mode(&v, 7, mode).unwrap(), LinkMode::Down);
        }
    }
}

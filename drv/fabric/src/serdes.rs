// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Serdes lane configuration, shared by both fabric generations.
//!
//! Every configuration write to a lane macro raises its busy flag while the
//! update is applied internally; losing patience with it is a
//! [`LinkError::LaneConfigTimeout`] rather than the generic fabric timeout,
//! so the trace points at the lane.

use crate::regs::lane;
use crate::{FabricRw, LinkError};
use drv_link_config::MediaType;
use embedded_hal::blocking::delay::DelayMs;

fn media_sel(media: MediaType) -> u32 {
    match media {
        MediaType::Base1000X => lane::MEDIA_BASEX,
        MediaType::Sgmii => lane::MEDIA_SGMII,
        MediaType::Fx100 => lane::MEDIA_FX100,
    }
}

fn wait_ready<R: FabricRw, D: DelayMs<u32>>(
    v: &R,
    l: u8,
    delay: &mut D,
) -> Result<(), LinkError> {
    for _ in 0..32 {
        if v.read(lane::cfg(l))? & lane::CFG_BUSY == 0 {
            return Ok(());
        }
        delay.delay_ms(1);
    }
    Err(LinkError::LaneConfigTimeout { lane: l })
}

/// Starts the lane's clocks and waits for the macro to come ready.
pub(crate) fn enable_clock<R: FabricRw, D: DelayMs<u32>>(
    v: &R,
    l: u8,
    delay: &mut D,
) -> Result<(), LinkError> {
    v.modify(lane::cfg(l), |r| {
        *r |= lane::CLK_ENA;
    })?;
    wait_ready(v, l, delay)
}

/// Retunes the lane for the given media and waits for the update to land.
pub(crate) fn set_media<R: FabricRw, D: DelayMs<u32>>(
    v: &R,
    l: u8,
    media: MediaType,
    delay: &mut D,
) -> Result<(), LinkError> {
    v.modify(lane::cfg(l), |r| {
        *r = (*r & !lane::MEDIA_SEL_MASK) | media_sel(media);
    })?;
    wait_ready(v, l, delay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{FakeFabric, NoDelay};

    #[test]
    fn media_select_preserves_clock_enable() {
        let v = FakeFabric::default();
        v.set(lane::cfg(2), lane::CLK_ENA | lane::MEDIA_SGMII);
        set_media(&v, 2, MediaType::Fx100, &mut NoDelay).unwrap();
        let cfg = v.get(lane::cfg(2));
        assert_eq!(cfg & lane::CLK_ENA, lane::CLK_ENA);
        assert_eq!(cfg & lane::MEDIA_SEL_MASK, lane::MEDIA_FX100);
    }

    #[test]
    fn stuck_lane_reports_its_number() {
        let v = FakeFabric::default();
        v.set(lane::cfg(4), lane::CFG_BUSY);
        assert_eq!(
            enable_clock(&v, 4, &mut NoDelay),
            Err(LinkError::LaneConfigTimeout { lane: 4 })
        );
    }
}

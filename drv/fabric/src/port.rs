// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// The following code is based on the vendor SDK's port shutdown path, but
// trimmed down to the bare necessities (e.g. assuming the chip was
// configured from reset).

use crate::regs::{ana, dev, qsys};
use crate::{wait_clear, FabricRw, LinkError};
use embedded_hal::blocking::delay::DelayMs;

/// Stops traffic on a port and drains its queues. Shared by both fabric
/// generations; the MAC-side reconfiguration on the way back up is where
/// they differ.
pub(crate) fn flush_port<R: FabricRw, D: DelayMs<u32>>(
    v: &R,
    port: u8,
    delay: &mut D,
) -> Result<(), LinkError> {
    // 1: Reset the PCS Rx clock domain
    v.modify(dev::rst_ctrl(port), |r| {
        *r |= dev::PCS_RX_RST;
    })?;

    // 2: Disable MAC frame reception
    v.modify(dev::mac_ena_cfg(port), |r| {
        *r &= !dev::RX_ENA;
    })?;

    // 3: Disable traffic being sent to or from the switch port
    v.modify(qsys::switch_port_mode(port), |r| {
        *r &= !qsys::PORT_ENA;
    })?;

    // 4: Disable dequeuing from the egress queues
    v.modify(qsys::port_mode(port), |r| {
        *r |= qsys::DEQUEUE_DIS;
    })?;

    // 5: Disable flow control
    v.modify(qsys::pause_cfg(port), |r| {
        *r &= !qsys::PAUSE_ENA;
    })?;

    // 6: Wait a worst case time 8ms (jumbo/10Mbit)
    delay.delay_ms(8);

    // 7: Flush the queues associated with the port
    v.write(
        qsys::FLUSH_CTRL,
        (u32::from(port) & qsys::FLUSH_PORT_MASK)
            | qsys::FLUSH_SRC
            | qsys::FLUSH_DST
            | qsys::FLUSH_ENA,
    )?;

    // 8: Enable dequeuing from the egress queues
    v.modify(qsys::port_mode(port), |r| {
        *r &= !qsys::DEQUEUE_DIS;
    })?;

    // 9: Wait until flushing is complete
    flush_wait(v, port, delay)?;

    // 10: Reset the MAC clock domain
    v.modify(dev::rst_ctrl(port), |r| {
        *r |= dev::PCS_RX_RST
            | dev::PCS_TX_RST
            | dev::MAC_RX_RST
            | dev::MAC_TX_RST;
    })?;

    // 11: Clear flushing
    v.modify(qsys::FLUSH_CTRL, |r| {
        *r &= !qsys::FLUSH_ENA;
    })?;

    Ok(())
}

/// Waits for a port flush to finish, by polling the queue residence
/// counters until both memories drain for every priority.
fn flush_wait<R: FabricRw, D: DelayMs<u32>>(
    v: &R,
    port: u8,
    delay: &mut D,
) -> Result<(), LinkError> {
    // This timeout count is based on the SDK, which checks 2000x with a
    // 1 ms pause between attempts.
    for _ in 0..2000 {
        let mut empty = true;
        for base in [qsys::RES_DST, qsys::RES_SRC] {
            for prio in 0..8 {
                let value = v.read(qsys::res_stat(base, port, prio))?;
                empty &= value == 0;
                // Keep looping, because these registers are clear-on-read,
                // so it's more efficient to read them all, even if we know
                // that the port isn't currently empty.
            }
        }
        if empty {
            return Ok(());
        }
        delay.delay_ms(1);
    }
    Err(LinkError::PortFlushTimeout { port })
}

/// Brings the queue-system side of a port back up once the MAC has been
/// programmed. `tx_pause` also arms pause-frame generation on congestion.
pub(crate) fn enable_port_queues<R: FabricRw>(
    v: &R,
    port: u8,
    tx_pause: bool,
) -> Result<(), LinkError> {
    v.modify(qsys::pause_cfg(port), |r| {
        if tx_pause {
            *r |= qsys::PAUSE_ENA;
        } else {
            *r &= !qsys::PAUSE_ENA;
        }
    })?;
    v.modify(qsys::switch_port_mode(port), |r| {
        *r |= qsys::PORT_ENA;
    })
}

/// Installs the 64-bit forwarding member mask across the register pair.
pub(crate) fn apply_fwd_masks<R: FabricRw>(
    v: &R,
    mask: u64,
) -> Result<(), LinkError> {
    v.write(ana::FWD_MASK_LO, mask as u32)?;
    v.write(ana::FWD_MASK_HI, (mask >> 32) as u32)
}

/// Flushes all learned MAC addresses pointing at `port` and waits for the
/// table walker to finish.
pub(crate) fn flush_mac_table<R: FabricRw, D: DelayMs<u32>>(
    v: &R,
    port: u8,
    delay: &mut D,
) -> Result<(), LinkError> {
    v.write(
        ana::MAC_TABLE_CTRL,
        (u32::from(port) << ana::MAC_FLUSH_PORT_SHIFT)
            | ana::MAC_CMD_FLUSH_PORT,
    )?;
    wait_clear(v, ana::MAC_TABLE_CTRL, ana::MAC_TABLE_BUSY, 32, delay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{FakeFabric, NoDelay};

    #[test]
    fn flush_leaves_port_stopped() {
        let v = FakeFabric::default();
        v.set(
            dev::mac_ena_cfg(3),
            dev::RX_ENA | dev::TX_ENA,
        );
        v.set(qsys::switch_port_mode(3), qsys::PORT_ENA);
        flush_port(&v, 3, &mut NoDelay).unwrap();

        assert_eq!(v.get(dev::mac_ena_cfg(3)) & dev::RX_ENA, 0);
        assert_eq!(v.get(qsys::switch_port_mode(3)) & qsys::PORT_ENA, 0);
        // Flush enable was raised and then cleared again.
        assert!(v
            .writes
            .borrow()
            .iter()
            .any(|&(a, val)| a == qsys::FLUSH_CTRL
                && val & qsys::FLUSH_ENA != 0));
        assert_eq!(v.get(qsys::FLUSH_CTRL) & qsys::FLUSH_ENA, 0);
        // Dequeuing is re-enabled so the drain could complete.
        assert_eq!(v.get(qsys::port_mode(3)) & qsys::DEQUEUE_DIS, 0);
    }

    #[test]
    fn flush_times_out_on_stuck_queue() {
        let v = FakeFabric::default();
        v.set(qsys::res_stat(qsys::RES_SRC, 5, 2), 17);
        assert_eq!(
            flush_port(&v, 5, &mut NoDelay),
            Err(LinkError::PortFlushTimeout { port: 5 })
        );
    }

    #[test]
    fn fwd_mask_splits_across_pair() {
        let v = FakeFabric::default();
        apply_fwd_masks(&v, 0x1_8000_0005).unwrap();
        assert_eq!(v.get(ana::FWD_MASK_LO), 0x8000_0005);
        assert_eq!(v.get(ana::FWD_MASK_HI), 0x1);
    }

    #[test]
    fn mac_flush_targets_port() {
        let v = FakeFabric::default();
        flush_mac_table(&v, 9, &mut NoDelay).unwrap();
        assert_eq!(
            v.get(ana::MAC_TABLE_CTRL),
            (9 << ana::MAC_FLUSH_PORT_SHIFT) | ana::MAC_CMD_FLUSH_PORT
        );
    }
}

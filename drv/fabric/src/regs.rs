// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Register map for the ESW68xx/ESW69xx switch fabric.
//!
//! The two generations share this layout; they differ only in how the
//! per-port MAC is told about speed, duplex, and pause (see the backend
//! modules). Addresses are computed by const fns rather than a generated
//! PAC, since we touch a few dozen registers out of thousands.

/// Chip identification, in the general control block.
pub const CHIP_ID: u32 = 0x7100_0000;

/// Extracts the part number field from [`CHIP_ID`].
pub const fn chip_part(id: u32) -> u32 {
    (id >> 12) & 0xffff
}

pub const PART_ESW6800: u32 = 0x6800;
pub const PART_ESW6900: u32 = 0x6900;

/// Per-port device block (MAC plus clock-domain resets).
pub mod dev {
    const BASE: u32 = 0x7104_0000;
    const STRIDE: u32 = 0x1000;

    pub const fn rst_ctrl(port: u8) -> u32 {
        BASE + STRIDE * port as u32
    }
    pub const fn mac_ena_cfg(port: u8) -> u32 {
        BASE + STRIDE * port as u32 + 0x4
    }
    pub const fn mac_mode_cfg(port: u8) -> u32 {
        BASE + STRIDE * port as u32 + 0x8
    }
    pub const fn mac_fc_cfg(port: u8) -> u32 {
        BASE + STRIDE * port as u32 + 0xc
    }

    // RST_CTRL bits
    pub const PCS_RX_RST: u32 = 1 << 0;
    pub const PCS_TX_RST: u32 = 1 << 1;
    pub const MAC_RX_RST: u32 = 1 << 2;
    pub const MAC_TX_RST: u32 = 1 << 3;
    /// 3-bit speed select, ESW6900 only (the 6800 keeps speed in
    /// MAC_MODE_CFG).
    pub const SPEED_SEL_SHIFT: u32 = 4;
    pub const SPEED_SEL_MASK: u32 = 0b111 << SPEED_SEL_SHIFT;

    // MAC_ENA_CFG bits
    pub const RX_ENA: u32 = 1 << 0;
    pub const TX_ENA: u32 = 1 << 1;

    // MAC_FC_CFG bits (ESW6900)
    pub const FC_RX_ENA: u32 = 1 << 0;
    pub const FC_TX_ENA: u32 = 1 << 1;
}

/// Queue system: per-port enables and the flush machinery.
pub mod qsys {
    const BASE: u32 = 0x7120_0000;

    pub const fn switch_port_mode(port: u8) -> u32 {
        BASE + 4 * port as u32
    }
    pub const fn port_mode(port: u8) -> u32 {
        BASE + 0x100 + 4 * port as u32
    }
    pub const fn pause_cfg(port: u8) -> u32 {
        BASE + 0x200 + 4 * port as u32
    }
    pub const FLUSH_CTRL: u32 = BASE + 0x300;

    /// Queue residence counters, cleared on read. `base` 0 is destination
    /// memory, [`RES_SRC`] is source memory; eight priorities per port.
    pub const fn res_stat(base: u32, port: u8, prio: u8) -> u32 {
        BASE + 0x1000 + 4 * (base + 8 * port as u32 + prio as u32)
    }
    pub const RES_DST: u32 = 0;
    pub const RES_SRC: u32 = 2048;

    // SWITCH_PORT_MODE bits
    pub const PORT_ENA: u32 = 1 << 0;

    // PORT_MODE bits
    pub const DEQUEUE_DIS: u32 = 1 << 0;

    // PAUSE_CFG bits
    pub const PAUSE_ENA: u32 = 1 << 0;

    // FLUSH_CTRL fields
    pub const FLUSH_PORT_MASK: u32 = 0x3f;
    pub const FLUSH_SRC: u32 = 1 << 6;
    pub const FLUSH_DST: u32 = 1 << 7;
    pub const FLUSH_ENA: u32 = 1 << 8;
}

/// Analyzer: forwarding masks and the MAC address table.
pub mod ana {
    const BASE: u32 = 0x7130_0000;

    /// Forwarding member mask, low 32 ports. The high half sits at the
    /// next word.
    pub const FWD_MASK_LO: u32 = BASE;
    pub const FWD_MASK_HI: u32 = BASE + 0x4;

    pub const MAC_TABLE_CTRL: u32 = BASE + 0x10;

    // MAC_TABLE_CTRL fields
    pub const MAC_FLUSH_PORT_SHIFT: u32 = 8;
    pub const MAC_CMD_FLUSH_PORT: u32 = 0x3;
    pub const MAC_TABLE_BUSY: u32 = 1 << 31;
}

/// Serdes lanes and their PCS.
pub mod lane {
    const BASE: u32 = 0x7140_0000;
    const STRIDE: u32 = 0x200;

    pub const fn cfg(lane: u8) -> u32 {
        BASE + STRIDE * lane as u32
    }
    pub const fn pcs_cfg(lane: u8) -> u32 {
        BASE + STRIDE * lane as u32 + 0x4
    }
    pub const fn pcs_status(lane: u8) -> u32 {
        BASE + STRIDE * lane as u32 + 0x8
    }
    /// Clause-37 link partner ability word, valid when autonegotiation
    /// has completed.
    pub const fn pcs_lp_ability(lane: u8) -> u32 {
        BASE + STRIDE * lane as u32 + 0xc
    }

    // CFG fields
    pub const CLK_ENA: u32 = 1 << 0;
    pub const MEDIA_SEL_SHIFT: u32 = 1;
    pub const MEDIA_SEL_MASK: u32 = 0b11 << MEDIA_SEL_SHIFT;
    pub const MEDIA_BASEX: u32 = 0b00 << MEDIA_SEL_SHIFT;
    pub const MEDIA_SGMII: u32 = 0b01 << MEDIA_SEL_SHIFT;
    pub const MEDIA_FX100: u32 = 0b10 << MEDIA_SEL_SHIFT;
    /// Set while the lane macro is applying a configuration update.
    pub const CFG_BUSY: u32 = 1 << 31;

    // PCS_CFG fields
    pub const PCS_ENA: u32 = 1 << 2;
    pub const PCS_MODE_MASK: u32 = 0b11;
    pub const PCS_MODE_SGMII: u32 = 0b00;
    pub const PCS_MODE_CLAUSE37: u32 = 0b01;
    pub const PCS_MODE_FX100: u32 = 0b10;

    // PCS_STATUS fields
    pub const LINK_UP: u32 = 1 << 15;
    pub const ANEG_DONE: u32 = 1 << 14;
    pub const DUPLEX_FULL: u32 = 1 << 12;
    pub const SPEED_SHIFT: u32 = 10;
    pub const SPEED_MASK: u32 = 0b11 << SPEED_SHIFT;
    pub const SPEED_10: u32 = 0b00 << SPEED_SHIFT;
    pub const SPEED_100: u32 = 0b01 << SPEED_SHIFT;
    pub const SPEED_1000: u32 = 0b10 << SPEED_SHIFT;

    // PCS_LP_ABILITY fields, clause-37 base page layout
    pub const LP_FDX: u32 = 1 << 5;
    pub const LP_PAUSE: u32 = 1 << 7;
    pub const LP_ASYM_PAUSE: u32 = 1 << 8;
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Link-mode and media value types shared across the drivers and the link
//! manager. These are plain data: no register knowledge lives here.

#![no_std]

use serde::{Deserialize, Serialize};

/// Negotiated or configured port speed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speed {
    Speed10M,
    Speed100M,
    Speed1G,
    Speed2G5,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Duplex {
    Half,
    Full,
}

/// Resolved pause (flow-control) state for one direction pair.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize,
)]
pub struct PauseMode {
    /// We honor pause frames from the partner.
    pub rx: bool,
    /// We may send pause frames to the partner.
    pub tx: bool,
}

/// Resolved Energy-Efficient-Ethernet class for the link.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EeeClass {
    None,
    Eee100,
    Eee1000,
}

/// Everything a non-down link resolves to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkParams {
    pub speed: Speed,
    pub duplex: Duplex,
    pub pause: PauseMode,
    pub eee: EeeClass,
}

/// The authoritative per-port link state. `Down` is the unique absence
/// value; speed/duplex/pause/EEE are only meaningful inside `Up`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkMode {
    Down,
    Up(LinkParams),
}

impl Default for LinkMode {
    fn default() -> Self {
        Self::Down
    }
}

impl LinkMode {
    pub fn is_up(&self) -> bool {
        matches!(self, LinkMode::Up(_))
    }
}

/// Per-port flow-control policy, consulted when building the copper
/// advertisement and when programming the fabric MAC on link-up.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FcPolicy {
    Off,
    Symmetric,
    RxOnly,
    TxOnly,
}

impl Default for FcPolicy {
    fn default() -> Self {
        Self::Symmetric
    }
}

/// Effective media for a lane-attached port. Copper transceiver ports don't
/// use this; module classification yields one of the non-copper values.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaType {
    /// 1000BASE-X optics (SX/LX), clause-37 autonegotiation.
    Base1000X,
    /// SGMII, e.g. a 1000BASE-T copper module or an internal lane.
    Sgmii,
    /// 100BASE-FX, no autonegotiation.
    Fx100,
}

/// Link-coding (PCS) operating mode for a lane.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PcsMode {
    Sgmii,
    Clause37,
    Fx100,
}

impl MediaType {
    /// The PCS mode this media requires.
    pub fn pcs_mode(&self) -> PcsMode {
        match self {
            MediaType::Base1000X => PcsMode::Clause37,
            MediaType::Sgmii => PcsMode::Sgmii,
            MediaType::Fx100 => PcsMode::Fx100,
        }
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! This crate provides the error type shared by our PHY, switch-fabric, and
//! pluggable-module drivers. It is factored into its own crate so that it
//! can be used by `drv/eth-phy`, `drv/fabric`, and `drv/xcvr` without
//! introducing any unneeded dependencies in each case.
//!
//! Almost every error here is a *best-effort* failure: the port that hit it
//! stays non-functional for the pass, the caller traces it, and the system
//! keeps running. Nothing in this enum is fatal above `LinkMgr::new`.

#![no_std]

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LinkError {
    /// The fabric's identification register named a part we don't drive.
    BadChipId(u32),
    /// A fabric register's busy bit never cleared within the bounded spin.
    FabricBusyTimeout { addr: u32 },
    /// The port flush drain poll ran out of attempts.
    PortFlushTimeout { port: u8 },
    /// The lane macro did not acknowledge a configuration update.
    LaneConfigTimeout { lane: u8 },

    /// The MIIM controller never went idle before a PHY access.
    MiimIdleTimeout,
    /// A PHY register read never completed.
    MiimReadTimeout,
    /// The MIIM controller flagged a failed read.
    MiimReadErr { phy: u8, page: u16, addr: u8 },

    /// Unrecognized value in the PHY identifier registers.
    UnknownPhyId(u32),
    /// The identified PHY is a silicon revision we can't drive.
    BadPhyRev(u16),
    /// A PHY bring-up step never reported completion.
    PhyInitTimeout,

    /// Side-band (I2C) traffic to a module cage failed.
    ModuleBusFault { lane: u8 },
    /// The module ID block failed its base checksum.
    BadIdChecksum { sum: u8, expected: u8 },
    /// The module's compliance byte names no media we can configure.
    UnsupportedMedia(u8),

    /// Port index outside the port map.
    InvalidPort(u8),
    /// The port exists but has no configuration.
    UnconfiguredPort(u8),
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Board-level port configuration.
//!
//! A [`PortMap`] is fixed at build time: it says, for each front-panel
//! port, whether it is wired to a copper PHY on the MIIM bus or to a serdes
//! lane with a module cage, and nothing about it changes at runtime.

use drv_link_config::MediaType;
use serde::{Deserialize, Serialize};

/// Number of front-panel ports on the boards we support.
pub const NUM_PORTS: usize = 24;

// The forwarding mask and the link-up mask are single u64 words.
static_assertions::const_assert!(NUM_PORTS <= 64);

/// What a port's MAC is physically wired to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Attach {
    /// A copper PHY at the given MIIM bus address.
    Phy { addr: u8 },
    /// A serdes lane feeding a module cage. `default_media` is what the
    /// lane is tuned for when the cage is empty or unreadable.
    Lane { lane: u8, default_media: MediaType },
}

/// Map from logical port to physical attachment. `None` means the port is
/// not populated on this board.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMap([Option<Attach>; NUM_PORTS]);

impl PortMap {
    pub const fn new(map: [Option<Attach>; NUM_PORTS]) -> Self {
        Self(map)
    }

    pub fn port_config(&self, p: u8) -> Option<Attach> {
        self.0.get(usize::from(p)).copied().flatten()
    }

    /// Total number of port slots, configured or not.
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

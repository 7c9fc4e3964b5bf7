// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pluggable-module (SFP cage) support: the side-band bus trait and the
//! serial ID block that tells us what kind of media is plugged in.

#![cfg_attr(not(test), no_std)]

use drv_link_config::MediaType;
use drv_link_err::LinkError;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Size of the serial ID base block (lower page A0, bytes 0-63).
pub const ID_BLOCK_LEN: usize = 64;

/// Identifier byte value for an SFP/SFP+ module.
pub const IDENTIFIER_SFP: u8 = 0x03;

/// Side-band access to the module cages, one per serdes lane.
///
/// Presence comes from the cage's mod-present pin, not the bus, so it can
/// be checked cheaply before paying for an ID block read.
pub trait ModuleBus {
    fn is_present(&self, lane: u8) -> Result<bool, LinkError>;

    /// Reads the serial ID base block from the module's A0 address.
    fn read_id_block(
        &self,
        lane: u8,
        out: &mut [u8; ID_BLOCK_LEN],
    ) -> Result<(), LinkError>;

    /// Drives the cage's tx-disable pin (inverted: `enable = true` releases
    /// it).
    fn set_tx_enable(&self, lane: u8, enable: bool)
        -> Result<(), LinkError>;
}

/// Serial ID base block layout, per the SFF specs. Only the fields we
/// consume are named individually; `compliance[3]` is the ethernet
/// compliance byte.
#[derive(
    Copy, Clone, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned,
)]
#[repr(C)]
pub struct IdBlock {
    pub identifier: u8,
    pub ext_identifier: u8,
    pub connector: u8,
    pub compliance: [u8; 8],
    pub encoding: u8,
    pub br_nominal: u8,
    pub rate_id: u8,
    pub lengths: [u8; 6],
    pub vendor_name: [u8; 16],
    pub ext_compliance: u8,
    pub vendor_oui: [u8; 3],
    pub vendor_pn: [u8; 16],
    pub vendor_rev: [u8; 4],
    pub wavelength: [u8; 2],
    pub unallocated: u8,
    /// Checksum over bytes 0-62.
    pub cc_base: u8,
}

static_assertions::const_assert_eq!(
    core::mem::size_of::<IdBlock>(),
    ID_BLOCK_LEN
);

// Ethernet compliance bits (byte 6 of the block).
pub const ETH_1000BASE_SX: u8 = 1 << 0;
pub const ETH_1000BASE_LX: u8 = 1 << 1;
pub const ETH_1000BASE_T: u8 = 1 << 3;
pub const ETH_100BASE_FX: u8 = 1 << 5;

impl IdBlock {
    /// Reinterprets a raw buffer as an ID block and verifies its checksum.
    pub fn parse(raw: &[u8; ID_BLOCK_LEN]) -> Result<&Self, LinkError> {
        let block: &IdBlock = zerocopy::transmute_ref!(raw);
        block.validate()?;
        Ok(block)
    }

    /// Checks the base checksum: the low byte of the sum over bytes 0-62
    /// must equal `cc_base`. Modules with corrupt or unprogrammed EEPROMs
    /// fail here before we act on any of their other fields.
    pub fn validate(&self) -> Result<(), LinkError> {
        let bytes = self.as_bytes();
        let mut sum = 0u8;
        for &b in &bytes[..ID_BLOCK_LEN - 1] {
            sum = sum.wrapping_add(b);
        }
        if sum != self.cc_base {
            return Err(LinkError::BadIdChecksum {
                sum,
                expected: self.cc_base,
            });
        }
        Ok(())
    }

    /// Classifies the module's ethernet compliance byte into the media we
    /// can configure a lane for.
    pub fn media(&self) -> Result<MediaType, LinkError> {
        let eth = self.compliance[3];
        if eth & (ETH_1000BASE_SX | ETH_1000BASE_LX) != 0 {
            Ok(MediaType::Base1000X)
        } else if eth & ETH_1000BASE_T != 0 {
            Ok(MediaType::Sgmii)
        } else if eth & ETH_100BASE_FX != 0 {
            Ok(MediaType::Fx100)
        } else {
            Err(LinkError::UnsupportedMedia(eth))
        }
    }
}

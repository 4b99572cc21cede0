// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! MODE SENSE (6). The target reports no mode pages and no block
//! descriptors, only the 4-byte mode parameter header.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::{control_block::common::CDB_LEN, models::opcode::ScsiOpcode};

/// Page Control (PC) for MODE SENSE byte 2 (bits 7..6).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum PageControl {
    Current = 0b00,
    Changeable = 0b01,
    Default = 0b10,
    Saved = 0b11,
}

/// Fill a MODE SENSE(6) CDB into `cdb[0..6]`.
/// Layout:
///   [0]=0x1A, [1]=DBD<<3, [2]=PC(7..6)|PAGE(5..0), [3]=SUBPAGE, [4]=ALLOC_LEN,
/// [5]=CONTROL
#[inline]
pub fn fill_mode_sense6(
    cdb: &mut [u8; CDB_LEN],
    dbd: bool,
    pc: PageControl,
    page_code: u8,
    allocation_len: u8,
) {
    cdb.fill(0);
    cdb[0] = ScsiOpcode::ModeSense6.into();
    cdb[1] = ((dbd as u8) << 3) & 0b0000_1000;
    cdb[2] = ((pc as u8) << 6) | (page_code & 0x3F);
    cdb[4] = allocation_len;
}

/// Mode parameter header (6).
#[repr(C)]
#[derive(Debug, Clone, PartialEq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct ModeParameterHeader6 {
    /// Bytes following this field.
    pub mode_data_length: u8,
    pub medium_type: u8,
    /// Bit 7 is WP (write protected).
    pub device_specific: u8,
    pub block_descriptor_length: u8,
}

impl ModeParameterHeader6 {
    pub const fn empty() -> Self {
        Self {
            mode_data_length: 3,
            medium_type: 0,
            device_specific: 0,
            block_descriptor_length: 0,
        }
    }
}

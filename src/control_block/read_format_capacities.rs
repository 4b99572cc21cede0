// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! READ FORMAT CAPACITIES (0x23), from the MMC/UFI command sets. Hosts
//! that treat the device as a floppy-class drive ask for it before
//! READ CAPACITY.
//!
//! Reply: a 4-byte capacity list header followed by one current/maximum
//! capacity descriptor.
//!
//! ```text
//!  0..3   reserved
//!  3      capacity list length = 8
//!  4..8   number of blocks (BE)
//!  8      descriptor code (0x02 = formatted media)
//!  9..12  block length (BE, 24-bit)
//! ```

use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
    byteorder::{BigEndian, U32},
};

use crate::{control_block::common::CDB_LEN, models::opcode::ScsiOpcode, storage::BLOCK_SIZE};

pub const FORMAT_CAPACITIES_LEN: usize = 12;
/// Descriptor code for "formatted media, current capacity".
pub const DESCRIPTOR_FORMATTED_MEDIA: u8 = 0x02;

#[repr(C)]
#[derive(Debug, Clone, PartialEq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct FormatCapacityList {
    pub reserved: [u8; 3],
    pub list_length: u8,
    pub num_blocks: U32<BigEndian>,
    pub descriptor_code: u8,
    pub block_length: [u8; 3],
}

impl FormatCapacityList {
    /// The descriptor reports `blocks - 1`, matching the READ CAPACITY
    /// convention hosts expect from this device class.
    pub fn new(blocks: u32) -> Self {
        let bl = (BLOCK_SIZE as u32).to_be_bytes();
        Self {
            reserved: [0; 3],
            list_length: 8,
            num_blocks: U32::new(blocks.saturating_sub(1)),
            descriptor_code: DESCRIPTOR_FORMATTED_MEDIA,
            block_length: [bl[1], bl[2], bl[3]],
        }
    }

    #[inline]
    pub fn block_len(&self) -> u32 {
        u32::from_be_bytes([0, self.block_length[0], self.block_length[1], self.block_length[2]])
    }
}

/// Build a READ FORMAT CAPACITIES CDB; allocation length sits in bytes 7..9.
#[inline]
pub fn build_read_format_capacities(cdb: &mut [u8; CDB_LEN], allocation_len: u16) {
    cdb.fill(0);
    cdb[0] = ScsiOpcode::ReadFormatCapacities.into();
    cdb[7..9].copy_from_slice(&allocation_len.to_be_bytes());
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Result, anyhow};
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
    byteorder::{BigEndian, U32},
};

use crate::{control_block::common::CDB_LEN, models::opcode::ScsiOpcode, storage::BLOCK_SIZE};

/// Build a padded 16-byte **SCSI READ CAPACITY(10)** CDB (opcode 0x25).
///
/// With PMI clear the target returns the **last LBA** and the **block
/// length**.
#[inline]
pub fn build_read_capacity10(cdb: &mut [u8; CDB_LEN]) {
    cdb.fill(0);
    cdb[0] = ScsiOpcode::ReadCapacity10.into();
}

/// Raw 8-byte parameter data returned by READ CAPACITY(10).
///
/// All fields are big-endian as per SCSI.
#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Debug)]
pub struct Rc10Raw {
    /// Maximum logical block address (bytes 0-3), i.e. blocks - 1
    pub max_lba: U32<BigEndian>,
    /// Block length in bytes (bytes 4-7)
    pub block_len: U32<BigEndian>,
}

impl Rc10Raw {
    /// Parameter data for a medium of `blocks` 512-byte blocks (`blocks` > 0).
    #[inline]
    pub fn new(blocks: u32) -> Self {
        Self {
            max_lba: U32::new(blocks.saturating_sub(1)),
            block_len: U32::new(BLOCK_SIZE as u32),
        }
    }

    #[inline]
    pub fn total_bytes(&self) -> u64 {
        (self.max_lba.get() as u64 + 1) * self.block_len.get() as u64
    }
}

/// Parse READ CAPACITY(10) parameter data (needs ≥ 8 bytes).
#[inline]
pub fn parse_read_capacity10_zerocopy(buf: &[u8]) -> Result<&Rc10Raw> {
    let (raw, _rest) = Rc10Raw::ref_from_prefix(buf)
        .map_err(|_| anyhow!("READ CAPACITY(10): need ≥ 8 bytes, got {}", buf.len()))?;
    Ok(raw)
}

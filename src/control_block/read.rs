// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::{
    control_block::common::{CDB_LEN, fill_rw10},
    models::opcode::ScsiOpcode,
};

/// Build a padded 16-byte **SCSI READ(10)** CDB.
///
/// - `lba`    : first logical block
/// - `blocks` : number of blocks (0 transfers nothing)
/// - `flags`  : RDPROTECT[7:5] | DPO[4] | FUA[3], other bits are dropped
#[inline]
pub fn build_read10(cdb: &mut [u8; CDB_LEN], lba: u32, blocks: u16, flags: u8) {
    fill_rw10(cdb, ScsiOpcode::Read10.into(), lba, blocks, flags & 0b1111_1000);
}

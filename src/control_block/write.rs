// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::{
    control_block::common::{CDB_LEN, fill_rw10},
    models::opcode::ScsiOpcode,
};

/// Build a padded 16-byte SCSI **WRITE(10)** CDB.
///
/// `flags` keeps WRPROTECT[7:5] | DPO[4] | FUA[3] | FUA_NV[1].
#[inline]
pub fn build_write10(cdb: &mut [u8; CDB_LEN], lba: u32, blocks: u16, flags: u8) {
    fill_rw10(cdb, ScsiOpcode::Write10.into(), lba, blocks, flags & 0b1111_1010);
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::{control_block::common::CDB_LEN, models::opcode::ScsiOpcode};

/// Decoded START STOP UNIT CDB. Only byte 4 matters here:
/// bit 0 START, bit 1 LOEJ (load/eject).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartStopCdb {
    pub immed: bool,
    pub start: bool,
    pub load_eject: bool,
}

impl StartStopCdb {
    #[inline]
    pub fn parse(cdb: &[u8; CDB_LEN]) -> Self {
        Self {
            immed: cdb[1] & 0x01 != 0,
            start: cdb[4] & 0x01 != 0,
            load_eject: cdb[4] & 0x02 != 0,
        }
    }
}

#[inline]
pub fn build_start_stop_unit(cdb: &mut [u8; CDB_LEN], start: bool, load_eject: bool) {
    cdb.fill(0);
    cdb[0] = ScsiOpcode::StartStopUnit.into();
    cdb[4] = (start as u8) | ((load_eject as u8) << 1);
}

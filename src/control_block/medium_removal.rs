// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::{control_block::common::CDB_LEN, models::opcode::ScsiOpcode};

/// PREVENT ALLOW MEDIUM REMOVAL, byte 4 bits 1..0. Any non-zero value asks
/// the device to lock the medium in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreventAllowCdb {
    pub prevent: u8,
}

impl PreventAllowCdb {
    #[inline]
    pub fn parse(cdb: &[u8; CDB_LEN]) -> Self {
        Self {
            prevent: cdb[4] & 0x03,
        }
    }

    #[inline]
    pub fn wants_prevent(&self) -> bool {
        self.prevent != 0
    }
}

#[inline]
pub fn build_prevent_allow(cdb: &mut [u8; CDB_LEN], prevent: bool) {
    cdb.fill(0);
    cdb[0] = ScsiOpcode::PreventAllowMediumRemoval.into();
    cdb[4] = prevent as u8;
}

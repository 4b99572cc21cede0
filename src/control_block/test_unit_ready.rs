// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::{control_block::common::CDB_LEN, models::opcode::ScsiOpcode};

/// Build a TEST UNIT READY CDB. The target answers it without touching the
/// medium.
#[inline]
pub fn build_test_unit_ready(cdb: &mut [u8; CDB_LEN], control: u8) {
    cdb.fill(0);
    cdb[0] = ScsiOpcode::TestUnitReady.into();
    cdb[5] = control;
}

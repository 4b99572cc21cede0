// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! REQUEST SENSE (6).
//!
//! CDB layout (SPC):
//!   [0] = 0x03 (REQUEST SENSE)
//!   [1] = DESC (bit 0), other bits reserved=0
//!   [4] = ALLOCATION LENGTH (number of bytes to return)
//!   [5] = CONTROL
//!
//! The target always answers in fixed format and ignores DESC; the reply is
//! produced by [`SenseData::to_fixed`](crate::models::sense_data::SenseData::to_fixed).

use crate::{control_block::common::CDB_LEN, models::opcode::ScsiOpcode};

/// Fill a REQUEST SENSE (6) CDB into `cdb[0..6]`.
#[inline]
pub fn fill_request_sense(cdb: &mut [u8; CDB_LEN], desc: bool, allocation_len: u8) {
    cdb.fill(0);
    cdb[0] = ScsiOpcode::RequestSense.into();
    cdb[1] = (desc as u8) & 0x01;
    cdb[4] = allocation_len;
}

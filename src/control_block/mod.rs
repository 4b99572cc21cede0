//! This module decodes the CDBs the block target accepts and encodes the
//! parameter data it returns. Host-side CDB builders live next to each
//! decoder.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Big-endian field helpers and the shared READ/WRITE(10) decoder.
pub mod common;
/// INQUIRY: standard data and the unit serial number VPD page.
pub mod inquiry;
/// PREVENT ALLOW MEDIUM REMOVAL.
pub mod medium_removal;
/// MODE SENSE(6): header-only reply.
pub mod mod_sense;
/// READ(10).
pub mod read;
/// READ CAPACITY(10).
pub mod read_capacity;
/// READ FORMAT CAPACITIES.
pub mod read_format_capacities;
/// REQUEST SENSE.
pub mod request_sense;
/// START STOP UNIT.
pub mod start_stop;
/// TEST UNIT READY.
pub mod test_unit_ready;
/// WRITE(10).
pub mod write;

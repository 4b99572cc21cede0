//! This module defines the wire structures of the Bulk-Only Transport and the
//! SCSI status/sense model shared by the interpreter and the transport.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Defines the Command Block Wrapper (host → device envelope).
pub mod cbw;
/// Defines the Command Status Wrapper (device → host envelope).
pub mod csw;
/// Defines the SCSI operation codes understood by the interpreter.
pub mod opcode;
/// Defines SCSI sense data and the interpreter error taxonomy.
pub mod sense_data;

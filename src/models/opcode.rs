// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Operation codes (byte 0 of every CDB) handled by the block target.
//!
//! Everything not listed here is answered with ILLEGAL REQUEST /
//! INVALID COMMAND OPERATION CODE.

use core::fmt;
use std::convert::TryFrom;

use thiserror::Error;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScsiOpcode {
    TestUnitReady = 0x00,
    RequestSense = 0x03,
    Inquiry = 0x12,
    ModeSense6 = 0x1A,
    StartStopUnit = 0x1B,
    PreventAllowMediumRemoval = 0x1E,
    ReadFormatCapacities = 0x23,
    ReadCapacity10 = 0x25,
    Read10 = 0x28,
    Write10 = 0x2A,
}

impl ScsiOpcode {
    #[inline]
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0x00 => Self::TestUnitReady,
            0x03 => Self::RequestSense,
            0x12 => Self::Inquiry,
            0x1A => Self::ModeSense6,
            0x1B => Self::StartStopUnit,
            0x1E => Self::PreventAllowMediumRemoval,
            0x23 => Self::ReadFormatCapacities,
            0x25 => Self::ReadCapacity10,
            0x28 => Self::Read10,
            0x2A => Self::Write10,
            _ => return None,
        })
    }

    /// True for the two opcodes that move medium blocks.
    #[inline]
    pub fn is_block_io(self) -> bool {
        matches!(self, Self::Read10 | Self::Write10)
    }
}

/// Returned for an opcode the target does not implement.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("invalid opcode: 0x{0:02x}")]
pub struct UnknownOpcode(pub u8);

impl TryFrom<u8> for ScsiOpcode {
    type Error = UnknownOpcode;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Self::from_u8(byte).ok_or(UnknownOpcode(byte))
    }
}

impl From<ScsiOpcode> for u8 {
    #[inline]
    fn from(op: ScsiOpcode) -> u8 {
        op as u8
    }
}

impl fmt::Display for ScsiOpcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TestUnitReady => "TEST UNIT READY",
            Self::RequestSense => "REQUEST SENSE",
            Self::Inquiry => "INQUIRY",
            Self::ModeSense6 => "MODE SENSE(6)",
            Self::StartStopUnit => "START STOP UNIT",
            Self::PreventAllowMediumRemoval => "PREVENT ALLOW MEDIUM REMOVAL",
            Self::ReadFormatCapacities => "READ FORMAT CAPACITIES",
            Self::ReadCapacity10 => "READ CAPACITY(10)",
            Self::Read10 => "READ(10)",
            Self::Write10 => "WRITE(10)",
        };
        f.write_str(name)
    }
}

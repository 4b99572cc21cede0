// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::fmt;

use anyhow::{Context, Result, anyhow};
use thiserror::Error;

use crate::{models::opcode::ScsiOpcode, storage::StorageError};

/// Fixed-format sense data is 18 bytes (SPC-4 § 4.5.3).
pub const FIXED_SENSE_LEN: usize = 18;
/// Response code for current errors, fixed format.
pub const RESPONSE_CODE_CURRENT: u8 = 0x70;
/// Additional sense length reported in byte 7.
pub const ADDITIONAL_SENSE_LEN: u8 = 10;

pub const ASC_UNRECOVERED_READ_ERROR: u8 = 0x11;
pub const ASC_WRITE_ERROR: u8 = 0x0C;
pub const ASC_INVALID_COMMAND_OPERATION_CODE: u8 = 0x20;
pub const ASC_LBA_OUT_OF_RANGE: u8 = 0x21;
pub const ASC_INVALID_FIELD_IN_CDB: u8 = 0x24;
pub const ASC_MEDIUM_NOT_PRESENT: u8 = 0x3A;

/// SPC-4 Table 48: sense keys (subset the target reports).
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SenseKey {
    #[default]
    NoSense = 0x0,
    NotReady = 0x2,
    MediumError = 0x3,
    HardwareError = 0x4,
    IllegalRequest = 0x5,
    UnitAttention = 0x6,
    AbortedCommand = 0xB,
}

impl SenseKey {
    pub fn from_u4(v: u8) -> Option<Self> {
        Some(match v & 0x0F {
            0x0 => Self::NoSense,
            0x2 => Self::NotReady,
            0x3 => Self::MediumError,
            0x4 => Self::HardwareError,
            0x5 => Self::IllegalRequest,
            0x6 => Self::UnitAttention,
            0xB => Self::AbortedCommand,
            _ => return None,
        })
    }
}

/// The sense triple a session keeps between a failing command and the next
/// REQUEST SENSE.
#[derive(Default, Clone, Copy, PartialEq, Eq)]
pub struct SenseData {
    pub sense_key: u8,
    pub asc: u8,
    pub ascq: u8,
}

impl SenseData {
    pub const NONE: Self = Self {
        sense_key: 0,
        asc: 0,
        ascq: 0,
    };

    #[inline]
    pub const fn new(key: SenseKey, asc: u8) -> Self {
        Self {
            sense_key: key as u8,
            asc,
            ascq: 0,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }

    /// Encode as fixed-format sense data: response code 0x70, key at byte 2,
    /// additional length at byte 7, ASC/ASCQ at bytes 12/13.
    pub fn to_fixed(&self) -> [u8; FIXED_SENSE_LEN] {
        let mut out = [0u8; FIXED_SENSE_LEN];
        out[0] = RESPONSE_CODE_CURRENT;
        out[2] = self.sense_key & 0x0F;
        out[7] = ADDITIONAL_SENSE_LEN;
        out[12] = self.asc;
        out[13] = self.ascq;
        out
    }

    /// Parse *fixed-format* sense data. The buffer must be at least 18 bytes.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < FIXED_SENSE_LEN {
            return Err(anyhow!(
                "sense buffer too small: {} < {FIXED_SENSE_LEN}",
                buf.len()
            ));
        }
        let response_code = buf[0] & 0x7F;
        if response_code != RESPONSE_CODE_CURRENT && response_code != 0x71 {
            return Err(anyhow!(
                "not fixed-format sense: response code {response_code:#04x}"
            ));
        }
        let tail: [u8; 2] = buf[12..14]
            .try_into()
            .context("failed to read ASC/ASCQ (bytes 12‥13)")?;

        Ok(Self {
            sense_key: buf[2] & 0x0F,
            asc: tail[0],
            ascq: tail[1],
        })
    }

    #[inline]
    pub fn key(&self) -> Option<SenseKey> {
        SenseKey::from_u4(self.sense_key)
    }
}

impl fmt::Debug for SenseData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SenseData")
            .field("sense_key", &format_args!("{:#x}", self.sense_key))
            .field("asc", &format_args!("{:#04x}", self.asc))
            .field("ascq", &format_args!("{:#04x}", self.ascq))
            .field("description", &asc_ascq_to_str(self.asc, self.ascq))
            .finish()
    }
}

/// Return the SPC-4 description for a given ASC/ASCQ pair.
///
/// * If the pair is not in the table, returns `"UNSPECIFIED / vendor
///   specific"`.
#[inline]
pub fn asc_ascq_to_str(asc: u8, ascq: u8) -> &'static str {
    hot_table(asc, ascq).unwrap_or("UNSPECIFIED / vendor specific")
}

fn hot_table(asc: u8, ascq: u8) -> Option<&'static str> {
    Some(match (asc, ascq) {
        (0x00, 0x00) => "No additional sense information",
        (0x04, 0x01) => "Logical unit is in process of becoming ready",
        (0x0C, 0x00) => "Write error",
        (0x11, 0x00) => "Unrecovered read error",
        (0x20, 0x00) => "Invalid command operation code",
        (0x21, 0x00) => "Logical block address out of range",
        (0x24, 0x00) => "Invalid field in CDB",
        (0x25, 0x00) => "Logical unit not supported",
        (0x3A, 0x00) => "Medium not present",
        (0x53, 0x02) => "Medium removal prevented",
        _ => return None,
    })
}

/// Everything that can make a command fail inside the interpreter.
#[derive(Debug, Error)]
pub enum ScsiError {
    #[error("empty command block")]
    EmptyCommand,
    #[error("no command is active")]
    NoCommand,
    #[error("invalid opcode: 0x{0:02x}")]
    InvalidOpcode(u8),
    #[error("invalid field in CDB for {opcode}")]
    InvalidField { opcode: ScsiOpcode },
    #[error("LBA range {lba}+{blocks} exceeds capacity of {capacity} blocks")]
    LbaOutOfRange { lba: u32, blocks: u16, capacity: u32 },
    #[error("medium not present")]
    MediumNotPresent,
    #[error("read failed at LBA {lba}: {source}")]
    Read {
        lba: u32,
        #[source]
        source: StorageError,
    },
    #[error("write failed at LBA {lba}: {source}")]
    Write {
        lba: u32,
        #[source]
        source: StorageError,
    },
    #[error("unexpected data-out for opcode 0x{0:02x}")]
    UnexpectedData(u8),
    #[error("host asked to prevent medium removal")]
    RemovalPrevented,
    #[error("data phase incomplete, {remaining} blocks outstanding")]
    Incomplete { remaining: u16 },
    #[error("command already failed")]
    AlreadyFailed,
}

impl ScsiError {
    /// Sense left behind by this failure. `None` means the error only
    /// reports an earlier failure whose sense is already stored.
    pub fn sense(&self) -> Option<SenseData> {
        use SenseKey::*;
        Some(match self {
            Self::EmptyCommand
            | Self::NoCommand
            | Self::InvalidOpcode(_)
            | Self::UnexpectedData(_) => {
                SenseData::new(IllegalRequest, ASC_INVALID_COMMAND_OPERATION_CODE)
            },
            Self::InvalidField { .. } | Self::RemovalPrevented => {
                SenseData::new(IllegalRequest, ASC_INVALID_FIELD_IN_CDB)
            },
            Self::LbaOutOfRange { .. } => SenseData::new(IllegalRequest, ASC_LBA_OUT_OF_RANGE),
            Self::MediumNotPresent => SenseData::new(NotReady, ASC_MEDIUM_NOT_PRESENT),
            Self::Read { source, .. } => storage_sense(source, ASC_UNRECOVERED_READ_ERROR),
            Self::Write { source, .. } => storage_sense(source, ASC_WRITE_ERROR),
            Self::Incomplete { .. } | Self::AlreadyFailed => return None,
        })
    }
}

fn storage_sense(err: &StorageError, medium_asc: u8) -> SenseData {
    match err {
        StorageError::NotPresent => SenseData::new(SenseKey::NotReady, ASC_MEDIUM_NOT_PRESENT),
        StorageError::OutOfRange { .. } => {
            SenseData::new(SenseKey::IllegalRequest, ASC_LBA_OUT_OF_RANGE)
        },
        StorageError::Io(_) | StorageError::ShortTransfer { .. } => {
            SenseData::new(SenseKey::MediumError, medium_asc)
        },
    }
}

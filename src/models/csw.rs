// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Command Status Wrapper (BOT §5.2), 13 bytes, little-endian:
//!
//! ```text
//!  0   4  dCSWSignature    0x53425355 ("USBS")
//!  4   4  dCSWTag          copied from the CBW
//!  8   4  dCSWDataResidue  expected minus actually transferred
//!  12  1  bCSWStatus       0 passed, 1 failed, 2 phase error
//! ```

use core::fmt;

use anyhow::{Result, anyhow, bail};
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
    byteorder::{LittleEndian, U32},
};

/// `dCSWSignature` value, "USBS" in little-endian order.
pub const CSW_SIGNATURE: u32 = 0x5342_5355;
pub const CSW_LEN: usize = 13;

#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    #[default]
    Passed = 0x00,
    Failed = 0x01,
    PhaseError = 0x02,
}

impl TryFrom<u8> for CommandStatus {
    type Error = anyhow::Error;

    fn try_from(v: u8) -> Result<Self> {
        Ok(match v {
            0x00 => Self::Passed,
            0x01 => Self::Failed,
            0x02 => Self::PhaseError,
            other => bail!("invalid bCSWStatus 0x{other:02x}"),
        })
    }
}

/// Wire view of `bCSWStatus`.
#[repr(transparent)]
#[derive(
    Default, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable,
    Unaligned,
)]
pub struct RawCommandStatus(u8);

impl RawCommandStatus {
    #[inline]
    pub const fn raw(&self) -> u8 {
        self.0
    }

    #[inline]
    pub fn decode(&self) -> Result<CommandStatus> {
        CommandStatus::try_from(self.0)
    }

    #[inline]
    pub fn encode(&mut self, status: CommandStatus) {
        self.0 = status as u8;
    }
}

impl fmt::Debug for RawCommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.decode() {
            Ok(s) => write!(f, "{s:?}"),
            Err(_) => write!(f, "Invalid({:#04x})", self.0),
        }
    }
}

#[repr(C)]
#[derive(
    Debug, Default, Clone, PartialEq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned,
)]
pub struct CommandStatusWrapper {
    pub signature: U32<LittleEndian>,
    pub tag: U32<LittleEndian>,
    pub data_residue: U32<LittleEndian>,
    pub status: RawCommandStatus,
}

impl CommandStatusWrapper {
    pub fn new(tag: u32, data_residue: u32, status: CommandStatus) -> Self {
        let mut raw = RawCommandStatus::default();
        raw.encode(status);
        Self {
            signature: U32::new(CSW_SIGNATURE),
            tag: U32::new(tag),
            data_residue: U32::new(data_residue),
            status: raw,
        }
    }

    /// Host-side view of a received CSW. Checks length and signature only.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let csw = Self::read_from_bytes(buf)
            .map_err(|_| anyhow!("CSW must be {CSW_LEN} bytes, got {}", buf.len()))?;
        if csw.signature.get() != CSW_SIGNATURE {
            bail!("invalid CSW signature 0x{:08x}", csw.signature.get());
        }
        Ok(csw)
    }

    #[inline]
    pub fn tag(&self) -> u32 {
        self.tag.get()
    }

    #[inline]
    pub fn residue(&self) -> u32 {
        self.data_residue.get()
    }

    pub fn status(&self) -> Result<CommandStatus> {
        self.status.decode()
    }
}

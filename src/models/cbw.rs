// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Command Block Wrapper (USB Mass Storage Class, Bulk-Only Transport §5.1).
//!
//! ```text
//!  offset  size  field
//!  0       4     dCBWSignature           0x43425355 (LE, "USBC")
//!  4       4     dCBWTag                 echoed back in the CSW
//!  8       4     dCBWDataTransferLength  bytes the host expects to move
//!  12      1     bmCBWFlags              bit 7: 1 = Data-In (device → host)
//!  13      1     bCBWLUN                 low 4 bits
//!  14      1     bCBWCBLength            1..=16
//!  15      16    CBWCB                   the SCSI command block
//! ```
//!
//! Wrapper integers are little-endian, unlike everything inside `CBWCB`.

use core::fmt;

use thiserror::Error;
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
    byteorder::{LittleEndian, U32},
};

/// `dCBWSignature` value, "USBC" in little-endian order.
pub const CBW_SIGNATURE: u32 = 0x4342_5355;
/// A CBW is always exactly this long on the wire.
pub const CBW_LEN: usize = 31;
/// Capacity of the `CBWCB` field.
pub const MAX_CB_LEN: usize = 16;

bitflags::bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    /// `bmCBWFlags`
    pub struct CbwFlags: u8 {
        /// Data-In: the data phase moves from the device to the host.
        const DATA_IN = 0x80;
    }
}

/// Framing errors. A CBW that fails any of these checks is not "valid" or
/// "meaningful" (BOT §6.2) and never gets a CSW.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CbwError {
    #[error("CBW must be {CBW_LEN} bytes, got {0}")]
    Length(usize),
    #[error("invalid CBW signature 0x{0:08x}")]
    Signature(u32),
    #[error("invalid CBW command length {0}, expected 1..=16")]
    CommandLength(u8),
}

/// Wire view of `bmCBWFlags`.
#[repr(transparent)]
#[derive(
    Default, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable,
    Unaligned,
)]
pub struct RawCbwFlags(u8);

impl RawCbwFlags {
    #[inline]
    pub const fn raw(&self) -> u8 {
        self.0
    }

    #[inline]
    pub fn decode(&self) -> CbwFlags {
        CbwFlags::from_bits_truncate(self.0)
    }

    #[inline]
    pub fn encode(&mut self, flags: CbwFlags) {
        self.0 = flags.bits();
    }
}

impl fmt::Debug for RawCbwFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({:#04x})", self.decode(), self.0)
    }
}

/// Zero-copy layout of the 31-byte CBW.
#[repr(C)]
#[derive(
    Debug, Default, Clone, PartialEq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned,
)]
pub struct CommandBlockWrapper {
    pub signature: U32<LittleEndian>,            // 0..4
    pub tag: U32<LittleEndian>,                  // 4..8
    pub data_transfer_length: U32<LittleEndian>, // 8..12
    pub flags: RawCbwFlags,                      // 12
    pub lun: u8,                                 // 13
    pub cb_length: u8,                           // 14
    pub cb: [u8; MAX_CB_LEN],                    // 15..31
}

impl CommandBlockWrapper {
    /// Builds a CBW the way a host would. Mostly useful for tests and tools;
    /// commands longer than 16 bytes are truncated.
    pub fn new(tag: u32, data_transfer_length: u32, flags: CbwFlags, cdb: &[u8]) -> Self {
        let len = cdb.len().min(MAX_CB_LEN);
        let mut cb = [0u8; MAX_CB_LEN];
        cb[..len].copy_from_slice(&cdb[..len]);

        let mut raw_flags = RawCbwFlags::default();
        raw_flags.encode(flags);

        Self {
            signature: U32::new(CBW_SIGNATURE),
            tag: U32::new(tag),
            data_transfer_length: U32::new(data_transfer_length),
            flags: raw_flags,
            lun: 0,
            cb_length: len as u8,
            cb,
        }
    }

    /// Validates and copies a CBW out of a received packet.
    ///
    /// The packet must be exactly [`CBW_LEN`] bytes, carry [`CBW_SIGNATURE`]
    /// and declare a command length in `1..=16`.
    pub fn parse(buf: &[u8]) -> Result<Self, CbwError> {
        let cbw = Self::read_from_bytes(buf).map_err(|_| CbwError::Length(buf.len()))?;

        let signature = cbw.signature.get();
        if signature != CBW_SIGNATURE {
            return Err(CbwError::Signature(signature));
        }
        if !(1..=MAX_CB_LEN).contains(&(cbw.cb_length as usize)) {
            return Err(CbwError::CommandLength(cbw.cb_length));
        }

        Ok(cbw)
    }

    #[inline]
    pub fn tag(&self) -> u32 {
        self.tag.get()
    }

    #[inline]
    pub fn data_transfer_length(&self) -> u32 {
        self.data_transfer_length.get()
    }

    #[inline]
    pub fn is_data_in(&self) -> bool {
        self.flags.decode().contains(CbwFlags::DATA_IN)
    }

    /// The meaningful part of `CBWCB`.
    #[inline]
    pub fn command(&self) -> &[u8] {
        let len = (self.cb_length as usize).min(MAX_CB_LEN);
        &self.cb[..len]
    }
}

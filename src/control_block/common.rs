// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// The CBW carries at most 16 command bytes; decoders always see a
/// zero-padded array of this size.
pub const CDB_LEN: usize = 16;

#[inline]
pub fn be_u16(cdb: &[u8; CDB_LEN], at: usize) -> u16 {
    u16::from_be_bytes([cdb[at], cdb[at + 1]])
}

#[inline]
pub fn be_u32(cdb: &[u8; CDB_LEN], at: usize) -> u32 {
    u32::from_be_bytes([cdb[at], cdb[at + 1], cdb[at + 2], cdb[at + 3]])
}

/// Copy as much of `payload` as fits into `out`; returns the copied length.
#[inline]
pub fn copy_truncated(out: &mut [u8], payload: &[u8]) -> usize {
    let n = payload.len().min(out.len());
    out[..n].copy_from_slice(&payload[..n]);
    n
}

/// Decoded READ(10) / WRITE(10) CDB.
///
/// Layout (SBC):
/// - byte 0      : OPERATION CODE (0x28 / 0x2A)
/// - byte 1      : protect / DPO / FUA flags
/// - bytes 2..5  : LBA (big-endian, 32-bit)
/// - byte 6      : GROUP NUMBER
/// - bytes 7..8  : TRANSFER LENGTH in blocks (big-endian, 16-bit; 0 => none)
/// - byte 9      : CONTROL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rw10Cdb {
    pub flags: u8,
    pub lba: u32,
    pub blocks: u16,
}

impl Rw10Cdb {
    #[inline]
    pub fn parse(cdb: &[u8; CDB_LEN]) -> Self {
        Self {
            flags: cdb[1],
            lba: be_u32(cdb, 2),
            blocks: be_u16(cdb, 7),
        }
    }
}

/// Shared body of the READ(10)/WRITE(10) builders.
#[inline]
pub(crate) fn fill_rw10(cdb: &mut [u8; CDB_LEN], opcode: u8, lba: u32, blocks: u16, flags: u8) {
    cdb.fill(0);
    cdb[0] = opcode;
    cdb[1] = flags;
    cdb[2..6].copy_from_slice(&lba.to_be_bytes());
    cdb[7..9].copy_from_slice(&blocks.to_be_bytes());
}

//! This module defines the backing-store contract the SCSI interpreter runs
//! against, plus two ready-made adapters.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::io;

use thiserror::Error;

/// Disk-image file adapter.
pub mod file;
/// RAM-backed adapter.
pub mod mem;

/// Logical block size. Every LBA and block count in the crate is in units
/// of this many bytes.
pub const BLOCK_SIZE: usize = 512;

/// Failures reported by a [`BlockDevice`]. The interpreter turns them into
/// sense data; they never stop the worker.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("blocks {lba}+{count} out of range (device has {blocks})")]
    OutOfRange { lba: u32, count: u16, blocks: u32 },
    #[error("medium not present")]
    NotPresent,
    #[error("short transfer: wanted {wanted} bytes, got {got}")]
    ShortTransfer { wanted: usize, got: usize },
}

/// Block storage exposed to the host.
///
/// Implementations are moved onto the worker thread for the lifetime of a
/// session and handed back on stop, so they only need to be `Send`.
/// All calls may block.
pub trait BlockDevice: Send + 'static {
    /// Read `count` blocks starting at `lba` into `out`.
    ///
    /// `out` is at least `count * BLOCK_SIZE` bytes. Returns the number of
    /// bytes actually produced; the caller rounds it down to whole blocks.
    fn read(&mut self, lba: u32, count: u16, out: &mut [u8]) -> Result<usize, StorageError>;

    /// Write `count` blocks from `buf` (exactly `count * BLOCK_SIZE` bytes).
    fn write(&mut self, lba: u32, count: u16, buf: &[u8]) -> Result<(), StorageError>;

    /// Number of 512-byte blocks. Zero means no medium.
    fn num_blocks(&self) -> u32;

    /// Host or transport asked for the medium to be released.
    fn eject(&mut self);
}

impl<T: BlockDevice + ?Sized> BlockDevice for Box<T> {
    fn read(&mut self, lba: u32, count: u16, out: &mut [u8]) -> Result<usize, StorageError> {
        (**self).read(lba, count, out)
    }

    fn write(&mut self, lba: u32, count: u16, buf: &[u8]) -> Result<(), StorageError> {
        (**self).write(lba, count, buf)
    }

    fn num_blocks(&self) -> u32 {
        (**self).num_blocks()
    }

    fn eject(&mut self) {
        (**self).eject()
    }
}

/// Reject ranges that run past the end of a device with `blocks` blocks.
#[inline]
pub fn check_range(lba: u32, count: u16, blocks: u32) -> Result<(), StorageError> {
    let end = lba as u64 + count as u64;
    if end > blocks as u64 {
        return Err(StorageError::OutOfRange { lba, count, blocks });
    }
    Ok(())
}

/// Byte length of `count` blocks.
#[inline]
pub const fn blocks_to_bytes(count: u16) -> usize {
    count as usize * BLOCK_SIZE
}

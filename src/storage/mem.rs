// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use crate::storage::{BLOCK_SIZE, BlockDevice, StorageError, blocks_to_bytes, check_range};

/// RAM disk. Eject calls are counted through a shared counter so a caller
/// that gave the device away can still observe them.
#[derive(Debug, Clone)]
pub struct MemBlockDevice {
    data: Vec<u8>,
    ejects: Arc<AtomicUsize>,
}

impl MemBlockDevice {
    pub fn new(blocks: u32) -> Self {
        Self {
            data: vec![0u8; blocks as usize * BLOCK_SIZE],
            ejects: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wrap existing contents; a partial trailing block is zero-padded.
    pub fn from_bytes(mut data: Vec<u8>) -> Self {
        let rem = data.len() % BLOCK_SIZE;
        if rem != 0 {
            data.resize(data.len() + BLOCK_SIZE - rem, 0);
        }
        Self {
            data,
            ejects: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn eject_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.ejects)
    }

    pub fn eject_count(&self) -> usize {
        self.ejects.load(Ordering::Acquire)
    }
}

impl BlockDevice for MemBlockDevice {
    fn read(&mut self, lba: u32, count: u16, out: &mut [u8]) -> Result<usize, StorageError> {
        check_range(lba, count, self.num_blocks())?;
        let start = lba as usize * BLOCK_SIZE;
        let len = blocks_to_bytes(count).min(out.len());
        out[..len].copy_from_slice(&self.data[start..start + len]);
        Ok(len)
    }

    fn write(&mut self, lba: u32, count: u16, buf: &[u8]) -> Result<(), StorageError> {
        check_range(lba, count, self.num_blocks())?;
        let len = blocks_to_bytes(count);
        if buf.len() < len {
            return Err(StorageError::ShortTransfer {
                wanted: len,
                got: buf.len(),
            });
        }
        let start = lba as usize * BLOCK_SIZE;
        self.data[start..start + len].copy_from_slice(&buf[..len]);
        Ok(())
    }

    fn num_blocks(&self) -> u32 {
        (self.data.len() / BLOCK_SIZE) as u32
    }

    fn eject(&mut self) {
        self.ejects.fetch_add(1, Ordering::AcqRel);
    }
}

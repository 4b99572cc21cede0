// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Disk-image adapter: a plain file whose length is a whole number of
//! 512-byte blocks.

use std::{
    fs::{File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use tracing::{debug, info, warn};

use crate::storage::{BLOCK_SIZE, BlockDevice, StorageError, blocks_to_bytes, check_range};

/// Shared "host ejected the medium" flag. The adapter sets it from the
/// worker; the application polls it.
#[derive(Debug, Clone, Default)]
pub struct EjectFlag(Arc<AtomicBool>);

impl EjectFlag {
    #[inline]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Read and clear.
    #[inline]
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    #[inline]
    fn set(&self) {
        self.0.store(true, Ordering::Release);
    }
}

#[derive(Debug)]
pub struct FileBlockDevice {
    path: PathBuf,
    file: File,
    blocks: u32,
    ejected: EjectFlag,
}

impl FileBlockDevice {
    /// Open an existing image read/write. Trailing bytes past the last whole
    /// block are ignored; images beyond 2 TiB are clamped to `u32::MAX`
    /// blocks.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let len = file.metadata()?.len();
        let blocks = u32::try_from(len / BLOCK_SIZE as u64).unwrap_or(u32::MAX);
        if len % BLOCK_SIZE as u64 != 0 {
            warn!(
                path = %path.display(),
                len,
                "image length is not a multiple of {BLOCK_SIZE}, tail ignored"
            );
        }
        debug!(path = %path.display(), blocks, "opened disk image");

        Ok(Self {
            path,
            file,
            blocks,
            ejected: EjectFlag::default(),
        })
    }

    /// Handle that observes [`BlockDevice::eject`] calls.
    pub fn eject_flag(&self) -> EjectFlag {
        self.ejected.clone()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    fn seek_to(&mut self, lba: u32) -> io::Result<()> {
        self.file
            .seek(SeekFrom::Start(lba as u64 * BLOCK_SIZE as u64))
            .map(|_| ())
    }
}

impl BlockDevice for FileBlockDevice {
    fn read(&mut self, lba: u32, count: u16, out: &mut [u8]) -> Result<usize, StorageError> {
        check_range(lba, count, self.blocks)?;
        let want = blocks_to_bytes(count).min(out.len());
        self.seek_to(lba)?;

        let mut got = 0usize;
        while got < want {
            match self.file.read(&mut out[got..want]) {
                Ok(0) => break,
                Ok(n) => got += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(got)
    }

    fn write(&mut self, lba: u32, count: u16, buf: &[u8]) -> Result<(), StorageError> {
        check_range(lba, count, self.blocks)?;
        let want = blocks_to_bytes(count);
        if buf.len() < want {
            return Err(StorageError::ShortTransfer {
                wanted: want,
                got: buf.len(),
            });
        }
        self.seek_to(lba)?;
        self.file.write_all(&buf[..want])?;
        Ok(())
    }

    fn num_blocks(&self) -> u32 {
        self.blocks
    }

    fn eject(&mut self) {
        if let Err(e) = self.file.sync_all() {
            warn!(path = %self.path.display(), "sync on eject failed: {e}");
        }
        info!(path = %self.path.display(), "medium ejected");
        self.ejected.set();
    }
}

/// Create a zero-filled image of `size_bytes`. Refuses to overwrite an
/// existing file.
pub fn create_image(path: impl AsRef<Path>, size_bytes: u64) -> Result<(), StorageError> {
    let path = path.as_ref();
    if size_bytes == 0 || size_bytes % BLOCK_SIZE as u64 != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("image size {size_bytes} is not a positive multiple of {BLOCK_SIZE}"),
        )
        .into());
    }

    let file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.set_len(size_bytes)?;
    file.sync_all()?;
    info!(path = %path.display(), size_bytes, "created disk image");
    Ok(())
}

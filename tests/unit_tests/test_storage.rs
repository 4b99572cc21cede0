// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::fs;

use anyhow::Result;
use usb_msc_rs::storage::{
    BLOCK_SIZE, BlockDevice, StorageError,
    file::{FileBlockDevice, create_image},
    mem::MemBlockDevice,
};

use crate::common::scratch_dir;

#[test]
fn test_create_image_and_reopen() -> Result<()> {
    let dir = scratch_dir("create-image")?;
    let path = dir.join("disk.img");

    create_image(&path, 64 * BLOCK_SIZE as u64)?;
    assert_eq!(fs::metadata(&path)?.len(), 64 * 512);
    assert!(
        create_image(&path, 64 * BLOCK_SIZE as u64).is_err(),
        "existing image is never overwritten"
    );

    let mut dev = FileBlockDevice::open(&path)?;
    assert_eq!(dev.num_blocks(), 64);

    let block = [0xA5u8; 512];
    dev.write(63, 1, &block)?;
    let mut out = [0u8; 512];
    assert_eq!(dev.read(63, 1, &mut out)?, 512);
    assert_eq!(out, block);

    drop(dev);
    let raw = fs::read(&path)?;
    assert!(raw[63 * 512..].iter().all(|&b| b == 0xA5));
    Ok(())
}

#[test]
fn test_create_image_rejects_unaligned_size() -> Result<()> {
    let dir = scratch_dir("unaligned")?;
    assert!(create_image(dir.join("a.img"), 0).is_err());
    assert!(create_image(dir.join("b.img"), 1000).is_err());
    assert!(!dir.join("b.img").exists());
    Ok(())
}

#[test]
fn test_file_device_range_checks() -> Result<()> {
    let dir = scratch_dir("range")?;
    let path = dir.join("disk.img");
    create_image(&path, 8 * BLOCK_SIZE as u64)?;
    let mut dev = FileBlockDevice::open(&path)?;

    let mut out = vec![0u8; 1024];
    assert!(matches!(
        dev.read(7, 2, &mut out),
        Err(StorageError::OutOfRange { lba: 7, count: 2, blocks: 8 })
    ));
    assert!(matches!(
        dev.write(0, 2, &out[..512]),
        Err(StorageError::ShortTransfer { wanted: 1024, got: 512 })
    ));
    Ok(())
}

#[test]
fn test_file_device_ignores_partial_tail() -> Result<()> {
    let dir = scratch_dir("tail")?;
    let path = dir.join("odd.img");
    fs::write(&path, vec![0u8; 3 * 512 + 100])?;

    let dev = FileBlockDevice::open(&path)?;
    assert_eq!(dev.num_blocks(), 3);
    Ok(())
}

#[test]
fn test_file_device_eject_sets_flag() -> Result<()> {
    let dir = scratch_dir("eject")?;
    let path = dir.join("disk.img");
    create_image(&path, 4 * BLOCK_SIZE as u64)?;

    let mut dev = FileBlockDevice::open(&path)?;
    let flag = dev.eject_flag();
    assert!(!flag.is_set());

    dev.eject();
    assert!(flag.is_set());
    assert!(flag.take());
    assert!(!flag.is_set());
    Ok(())
}

#[test]
fn test_mem_device_round_trips_blocks() -> Result<()> {
    let mut dev = MemBlockDevice::new(4);
    let counter = dev.eject_counter();

    let data: Vec<u8> = (0..1024).map(|i| i as u8).collect();
    dev.write(1, 2, &data)?;
    let mut out = vec![0u8; 1024];
    assert_eq!(dev.read(1, 2, &mut out)?, 1024);
    assert_eq!(out, data);

    dev.eject();
    dev.eject();
    assert_eq!(counter.load(std::sync::atomic::Ordering::Acquire), 2);
    assert_eq!(dev.eject_count(), 2);
    Ok(())
}

#[test]
fn test_boxed_device_forwards() -> Result<()> {
    let mut dev: Box<dyn BlockDevice> = Box::new(MemBlockDevice::new(2));
    assert_eq!(dev.num_blocks(), 2);
    dev.write(0, 1, &[7u8; 512])?;
    let mut out = [0u8; 512];
    dev.read(0, 1, &mut out)?;
    assert_eq!(out, [7u8; 512]);
    Ok(())
}

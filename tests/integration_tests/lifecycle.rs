// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::{Arc, atomic::Ordering};

use anyhow::{Result, anyhow};
use usb_msc_rs::{
    storage::BlockDevice,
    usb::{
        class::{DynClass, UsbError, UsbStack},
        endpoint::{MSC_RX_EP, MSC_TX_EP},
        mass_storage::{MassStorageUsb, MscError},
    },
};

use crate::common::{DummyClass, MockDevice, MockStack, RecordingDisk, load_config};

#[test]
fn start_on_locked_stack_returns_storage() -> Result<()> {
    let cfg = load_config()?;
    let dev = MockDevice::new();
    let stack = MockStack::new(Arc::clone(&dev));
    stack.lock();

    let disk = RecordingDisk::new(32);
    let log = disk.log_handle();
    let err = match MassStorageUsb::start(Arc::clone(&stack), "locked", disk, &cfg) {
        Ok(_) => return Err(anyhow!("start must fail on a locked stack")),
        Err(e) => e,
    };

    assert!(matches!(err.error, MscError::Usb(UsbError::Locked)));
    let storage = err.storage.ok_or_else(|| anyhow!("storage lost"))?;
    assert!(Arc::ptr_eq(&storage.log, &log));
    assert!(!stack.has_class());
    assert!(!dev.state().connected);
    Ok(())
}

#[test]
fn stop_restores_previous_class() -> Result<()> {
    let cfg = load_config()?;
    let dev = MockDevice::new();
    let stack = MockStack::new(Arc::clone(&dev));

    let previous = Arc::new(DummyClass::default());
    stack.set_class(Some(Arc::clone(&previous) as DynClass<MockDevice>))?;
    assert_eq!(previous.inits.load(Ordering::SeqCst), 1);

    let msc = MassStorageUsb::start(
        Arc::clone(&stack),
        "disk",
        RecordingDisk::new(32),
        &cfg,
    )
    .map_err(|e| anyhow!("{e}"))?;
    assert_eq!(previous.deinits.load(Ordering::SeqCst), 1);
    assert!(dev.state().connected, "class init connects the bus");

    let disk = msc.stop()?;
    assert_eq!(disk.num_blocks(), 32);
    assert_eq!(previous.inits.load(Ordering::SeqCst), 2);
    assert!(!dev.state().connected);
    assert!(stack.has_class());
    Ok(())
}

#[test]
fn stop_without_previous_class_clears_stack() -> Result<()> {
    let cfg = load_config()?;
    let dev = MockDevice::new();
    let stack = MockStack::new(Arc::clone(&dev));

    let msc = MassStorageUsb::start(Arc::clone(&stack), "disk", RecordingDisk::new(8), &cfg)
        .map_err(|e| anyhow!("{e}"))?;
    assert!(stack.has_class());

    msc.stop()?;
    assert!(!stack.has_class());
    Ok(())
}

#[test]
fn configure_sets_up_bulk_endpoints() -> Result<()> {
    let cfg = load_config()?;
    let dev = MockDevice::new();
    let stack = MockStack::new(Arc::clone(&dev));

    let msc = MassStorageUsb::start(Arc::clone(&stack), "disk", RecordingDisk::new(8), &cfg)
        .map_err(|e| anyhow!("{e}"))?;

    stack.configure(1)?;
    assert!(msc.class().is_configured());
    assert_eq!(dev.state().configured, vec![(MSC_RX_EP, 64), (MSC_TX_EP, 64)]);

    assert_eq!(stack.configure(2), Err(UsbError::UnsupportedConfiguration(2)));

    stack.configure(0)?;
    assert!(!msc.class().is_configured());
    assert_eq!(dev.state().deconfigured, vec![MSC_RX_EP, MSC_TX_EP]);

    msc.stop()?;
    Ok(())
}

#[test]
fn drop_shuts_the_session_down() -> Result<()> {
    let cfg = load_config()?;
    let dev = MockDevice::new();
    let stack = MockStack::new(Arc::clone(&dev));

    {
        let _msc =
            MassStorageUsb::start(Arc::clone(&stack), "disk", RecordingDisk::new(8), &cfg)
                .map_err(|e| anyhow!("{e}"))?;
        assert!(stack.has_class());
    }
    assert!(!stack.has_class());
    assert!(!dev.state().connected);
    Ok(())
}

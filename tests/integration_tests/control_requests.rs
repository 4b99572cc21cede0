// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{sync::Arc, time::Duration};

use anyhow::{Result, anyhow};
use usb_msc_rs::usb::{
    class::{ControlRequest, ControlResponse},
    endpoint::MSC_RX_EP,
    mass_storage::{MassStorageUsb, REQ_BOT_RESET, REQ_GET_MAX_LUN},
};

use crate::common::{DiskCall, MockDevice, MockStack, RecordingDisk, calls, load_config, wait_until};

fn class_request(request_type: u8, request: u8, length: u16) -> ControlRequest {
    ControlRequest {
        request_type,
        request,
        value: 0,
        index: 0,
        length,
    }
}

#[test]
fn get_max_lun_reports_single_lun() -> Result<()> {
    let cfg = load_config()?;
    let dev = MockDevice::new();
    let stack = MockStack::new(Arc::clone(&dev));
    let msc = MassStorageUsb::start(Arc::clone(&stack), "disk", RecordingDisk::new(8), &cfg)
        .map_err(|e| anyhow!("{e}"))?;

    assert_eq!(
        stack.control(&class_request(0xA1, REQ_GET_MAX_LUN, 1)),
        ControlResponse::Data(&[0])
    );
    // Standard GET_DESCRIPTOR is not ours.
    assert_eq!(
        stack.control(&class_request(0x80, 0x06, 18)),
        ControlResponse::Fail
    );
    assert_eq!(
        stack.control(&class_request(0xA1, 0x01, 0)),
        ControlResponse::Fail
    );

    msc.stop()?;
    Ok(())
}

#[test]
fn bot_reset_ejects_through_worker() -> Result<()> {
    let cfg = load_config()?;
    let dev = MockDevice::new();
    let stack = MockStack::new(Arc::clone(&dev));
    let disk = RecordingDisk::new(8);
    let log = disk.log_handle();
    let msc = MassStorageUsb::start(Arc::clone(&stack), "disk", disk, &cfg)
        .map_err(|e| anyhow!("{e}"))?;

    assert_eq!(
        stack.control(&class_request(0x21, REQ_BOT_RESET, 0)),
        ControlResponse::Ack
    );
    assert!(wait_until(Duration::from_secs(5), || {
        calls(&log).contains(&DiskCall::Eject)
    }));

    msc.stop()?;
    assert_eq!(calls(&log), vec![DiskCall::Eject]);
    Ok(())
}

#[test]
fn suspend_resets_transport() -> Result<()> {
    let cfg = load_config()?;
    let dev = MockDevice::new();
    let stack = MockStack::new(Arc::clone(&dev));
    let disk = RecordingDisk::new(8);
    let log = disk.log_handle();
    let msc = MassStorageUsb::start(Arc::clone(&stack), "disk", disk, &cfg)
        .map_err(|e| anyhow!("{e}"))?;

    stack.suspend();
    assert!(wait_until(Duration::from_secs(5), || {
        calls(&log).contains(&DiskCall::Eject)
    }));

    // Endpoint events with nothing queued leave the medium alone.
    stack.endpoint_event(MSC_RX_EP);
    std::thread::sleep(Duration::from_millis(20));
    msc.stop()?;
    assert_eq!(calls(&log), vec![DiskCall::Eject]);
    Ok(())
}

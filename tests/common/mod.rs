// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Host-side doubles shared by the unit and integration targets.

#![allow(dead_code)]

use std::{
    collections::VecDeque,
    fs,
    path::PathBuf,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use anyhow::{Result, bail};
use hex::FromHex;
use usb_msc_rs::{
    cfg::config::Config,
    handlers::scsi_session::ScsiSession,
    models::{
        cbw::{CbwFlags, CommandBlockWrapper},
        csw::{CSW_LEN, CommandStatusWrapper},
    },
    state_machine::bot_states::BotTransport,
    storage::{BlockDevice, StorageError, mem::MemBlockDevice},
    usb::{
        class::{ControlRequest, ControlResponse, DynClass, UsbClass, UsbError, UsbStack},
        endpoint::{EndpointAddress, EndpointError, MSC_RX_EP, MSC_TX_EP, UsbDevice},
    },
};
use zerocopy::{FromBytes, IntoBytes};

pub fn load_fixture(path: &str) -> Result<Vec<u8>> {
    let s = fs::read_to_string(path)?;
    let cleaned = s.trim().replace(|c: char| c.is_whitespace(), "");
    Ok(Vec::from_hex(&cleaned)?)
}

pub fn test_path() -> String {
    std::env::var("TEST_CONFIG").unwrap_or_else(|_| "tests/config.yaml".into())
}

pub fn load_config() -> Result<Config> {
    Config::load_from_file(test_path())
}

/// Fresh per-process scratch directory for tests touching the filesystem.
pub fn scratch_dir(name: &str) -> Result<PathBuf> {
    let dir = std::env::temp_dir().join(format!("usb-msc-rs-{}-{name}", std::process::id()));
    if dir.exists() {
        fs::remove_dir_all(&dir)?;
    }
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

// ─────────────────────────────────────────────────────────────────────────────
// USB device

#[derive(Debug)]
pub struct DeviceState {
    /// Packets queued by the "host" on the OUT endpoint.
    pub rx: VecDeque<Vec<u8>>,
    /// Packets the device wrote to the IN endpoint.
    pub tx: Vec<Vec<u8>>,
    pub stalls: Vec<EndpointAddress>,
    pub configured: Vec<(EndpointAddress, u16)>,
    pub deconfigured: Vec<EndpointAddress>,
    pub connected: bool,
    pub tx_ready: bool,
    /// Accept at most this many bytes per write.
    pub tx_limit: Option<usize>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            rx: VecDeque::new(),
            tx: Vec::new(),
            stalls: Vec::new(),
            configured: Vec::new(),
            deconfigured: Vec::new(),
            connected: false,
            tx_ready: true,
            tx_limit: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct MockDevice {
    state: Mutex<DeviceState>,
}

impl MockDevice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().expect("device state poisoned")
    }

    pub fn push_packet(&self, pkt: &[u8]) {
        self.state().rx.push_back(pkt.to_vec());
    }

    /// Queue `data` as OUT packets of `mps` bytes.
    pub fn push_data(&self, data: &[u8], mps: usize) {
        let mut st = self.state();
        for chunk in data.chunks(mps) {
            st.rx.push_back(chunk.to_vec());
        }
    }

    pub fn push_cbw(&self, tag: u32, len: u32, data_in: bool, cdb: &[u8]) {
        self.push_packet(&cbw_bytes(tag, len, data_in, cdb));
    }

    /// Everything written to the IN endpoint, concatenated, then cleared.
    pub fn take_tx(&self) -> Vec<u8> {
        let mut st = self.state();
        st.tx.drain(..).flatten().collect()
    }

    pub fn tx_packets(&self) -> Vec<Vec<u8>> {
        self.state().tx.clone()
    }

    pub fn stalls(&self) -> Vec<EndpointAddress> {
        self.state().stalls.clone()
    }

    pub fn set_tx_ready(&self, ready: bool) {
        self.state().tx_ready = ready;
    }

    pub fn set_tx_limit(&self, limit: Option<usize>) {
        self.state().tx_limit = limit;
    }

    pub fn rx_pending(&self) -> usize {
        self.state().rx.len()
    }
}

impl UsbDevice for MockDevice {
    fn ep_read(&self, ep: EndpointAddress, buf: &mut [u8]) -> Result<usize, EndpointError> {
        assert_eq!(ep, MSC_RX_EP, "read from non-OUT endpoint");
        let mut st = self.state();
        let Some(pkt) = st.rx.pop_front() else {
            return Err(EndpointError::NotReady);
        };
        let n = pkt.len().min(buf.len());
        buf[..n].copy_from_slice(&pkt[..n]);
        Ok(n)
    }

    fn ep_write(&self, ep: EndpointAddress, buf: &[u8]) -> Result<usize, EndpointError> {
        assert_eq!(ep, MSC_TX_EP, "write to non-IN endpoint");
        let mut st = self.state();
        if !st.tx_ready {
            return Err(EndpointError::NotReady);
        }
        let n = st.tx_limit.map_or(buf.len(), |l| l.min(buf.len()));
        st.tx.push(buf[..n].to_vec());
        Ok(n)
    }

    fn ep_stall(&self, ep: EndpointAddress) {
        self.state().stalls.push(ep);
    }

    fn ep_configure(&self, ep: EndpointAddress, max_packet_size: u16) -> Result<(), EndpointError> {
        self.state().configured.push((ep, max_packet_size));
        Ok(())
    }

    fn ep_deconfigure(&self, ep: EndpointAddress) {
        self.state().deconfigured.push(ep);
    }

    fn connect(&self, on: bool) {
        self.state().connected = on;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// USB stack

pub struct MockStack {
    dev: Arc<MockDevice>,
    active: Mutex<Option<DynClass<MockDevice>>>,
    locked: AtomicBool,
}

impl MockStack {
    pub fn new(dev: Arc<MockDevice>) -> Arc<Self> {
        Arc::new(Self {
            dev,
            active: Mutex::new(None),
            locked: AtomicBool::new(false),
        })
    }

    pub fn lock(&self) {
        self.locked.store(true, Ordering::SeqCst);
    }

    fn active(&self) -> Option<DynClass<MockDevice>> {
        self.active.lock().expect("stack poisoned").clone()
    }

    pub fn has_class(&self) -> bool {
        self.active().is_some()
    }

    pub fn configure(&self, config: u8) -> Result<(), UsbError> {
        match self.active() {
            Some(c) => c.configure(&self.dev, config),
            None => Ok(()),
        }
    }

    pub fn control(&self, req: &ControlRequest) -> ControlResponse {
        self.active()
            .map_or(ControlResponse::Fail, |c| c.control(&self.dev, req))
    }

    pub fn endpoint_event(&self, ep: EndpointAddress) {
        if let Some(c) = self.active() {
            c.endpoint_event(&self.dev, ep);
        }
    }

    pub fn suspend(&self) {
        if let Some(c) = self.active() {
            c.suspend(&self.dev);
        }
    }
}

impl UsbStack for MockStack {
    type Device = MockDevice;

    fn device(&self) -> Arc<MockDevice> {
        Arc::clone(&self.dev)
    }

    fn active_class(&self) -> Option<DynClass<MockDevice>> {
        self.active()
    }

    fn set_class(&self, class: Option<DynClass<MockDevice>>) -> Result<(), UsbError> {
        if self.locked.load(Ordering::SeqCst) {
            return Err(UsbError::Locked);
        }
        let mut active = self.active.lock().expect("stack poisoned");
        if let Some(old) = active.take() {
            old.deinit(&self.dev);
        }
        if let Some(new) = &class {
            new.init(&self.dev);
        }
        *active = class;
        Ok(())
    }
}

/// A class that only counts lifecycle calls; stands in for whatever owned
/// the bus before mass storage.
#[derive(Debug, Default)]
pub struct DummyClass {
    pub inits: AtomicUsize,
    pub deinits: AtomicUsize,
}

impl UsbClass<MockDevice> for DummyClass {
    fn init(&self, _dev: &Arc<MockDevice>) {
        self.inits.fetch_add(1, Ordering::SeqCst);
    }

    fn deinit(&self, _dev: &Arc<MockDevice>) {
        self.deinits.fetch_add(1, Ordering::SeqCst);
    }

    fn suspend(&self, _dev: &MockDevice) {}

    fn wakeup(&self, _dev: &MockDevice) {}

    fn configure(&self, _dev: &MockDevice, _config: u8) -> Result<(), UsbError> {
        Ok(())
    }

    fn control(&self, _dev: &MockDevice, _req: &ControlRequest) -> ControlResponse {
        ControlResponse::Fail
    }

    fn endpoint_event(&self, _dev: &MockDevice, _ep: EndpointAddress) {}
}

// ─────────────────────────────────────────────────────────────────────────────
// Block device

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskCall {
    Read { lba: u32, count: u16 },
    Write { lba: u32, count: u16 },
    Eject,
}

pub type DiskLog = Arc<Mutex<Vec<DiskCall>>>;

/// RAM disk that logs every adapter call and can be told to fail.
#[derive(Debug)]
pub struct RecordingDisk {
    pub mem: MemBlockDevice,
    pub log: DiskLog,
    pub fail_reads: bool,
    pub fail_writes: bool,
}

impl RecordingDisk {
    pub fn new(blocks: u32) -> Self {
        Self {
            mem: MemBlockDevice::new(blocks),
            log: Arc::new(Mutex::new(Vec::new())),
            fail_reads: false,
            fail_writes: false,
        }
    }

    /// Blocks filled with their own LBA in every byte (mod 256).
    pub fn patterned(blocks: u32) -> Self {
        let mut data = vec![0u8; blocks as usize * 512];
        for (i, chunk) in data.chunks_mut(512).enumerate() {
            chunk.fill(i as u8);
        }
        Self {
            mem: MemBlockDevice::from_bytes(data),
            ..Self::new(0)
        }
    }

    pub fn log_handle(&self) -> DiskLog {
        Arc::clone(&self.log)
    }
}

pub fn calls(log: &DiskLog) -> Vec<DiskCall> {
    log.lock().expect("disk log poisoned").clone()
}

impl BlockDevice for RecordingDisk {
    fn read(&mut self, lba: u32, count: u16, out: &mut [u8]) -> Result<usize, StorageError> {
        self.log
            .lock()
            .expect("disk log poisoned")
            .push(DiskCall::Read { lba, count });
        if self.fail_reads {
            return Err(std::io::Error::other("injected read failure").into());
        }
        self.mem.read(lba, count, out)
    }

    fn write(&mut self, lba: u32, count: u16, buf: &[u8]) -> Result<(), StorageError> {
        self.log
            .lock()
            .expect("disk log poisoned")
            .push(DiskCall::Write { lba, count });
        if self.fail_writes {
            return Err(std::io::Error::other("injected write failure").into());
        }
        self.mem.write(lba, count, buf)
    }

    fn num_blocks(&self) -> u32 {
        self.mem.num_blocks()
    }

    fn eject(&mut self) {
        self.log.lock().expect("disk log poisoned").push(DiskCall::Eject);
        self.mem.eject();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Host helpers

pub fn cbw_bytes(tag: u32, len: u32, data_in: bool, cdb: &[u8]) -> Vec<u8> {
    let flags = if data_in {
        CbwFlags::DATA_IN
    } else {
        CbwFlags::empty()
    };
    CommandBlockWrapper::new(tag, len, flags, cdb)
        .as_bytes()
        .to_vec()
}

/// Split what the device sent into (data, CSW).
pub fn split_csw(tx: &[u8]) -> Result<(Vec<u8>, CommandStatusWrapper)> {
    if tx.len() < CSW_LEN {
        bail!("device sent {} bytes, no room for a CSW", tx.len());
    }
    let (data, csw) = tx.split_at(tx.len() - CSW_LEN);
    let csw = CommandStatusWrapper::read_from_bytes(csw)
        .map_err(|_| anyhow::anyhow!("bad CSW slice"))?;
    Ok((data.to_vec(), csw))
}

pub fn transport<B: BlockDevice>(
    dev: &Arc<MockDevice>,
    disk: B,
    ceiling: u32,
) -> BotTransport<MockDevice, B> {
    let cfg = Config::default();
    BotTransport::new(
        Arc::clone(dev),
        ScsiSession::new(disk, cfg.device.clone()),
        cfg.transport.max_packet_size,
        ceiling,
    )
}

/// Poll `cond` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}

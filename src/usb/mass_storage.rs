// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Mass-storage class object and session lifecycle.
//!
//! [`MassStorageUsb::start`] spawns the worker, then installs a
//! [`MassStorageClass`] as the stack's active class. The class object is
//! the only context the stack callbacks see; all it does is raise worker
//! events and (de)configure endpoints. [`MassStorageUsb::stop`] puts the
//! previous class back, stops the worker and returns the backing store.

use std::{
    fmt, io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::JoinHandle,
};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    cfg::config::Config,
    handlers::scsi_session::ScsiSession,
    state_machine::bot_states::BotTransport,
    storage::BlockDevice,
    usb::{
        class::{ControlRequest, ControlResponse, DynClass, UsbClass, UsbError, UsbStack},
        endpoint::{EndpointAddress, MSC_RX_EP, MSC_TX_EP, UsbDevice},
        events::{EventFlags, Events},
        worker::spawn_worker,
    },
};

/// Class request: report the highest LUN index.
pub const REQ_GET_MAX_LUN: u8 = 0xFE;
/// Class request: Bulk-Only Mass Storage Reset.
pub const REQ_BOT_RESET: u8 = 0xFF;

static MAX_LUN_REPLY: [u8; 1] = [0];

#[derive(Debug, Error)]
pub enum MscError {
    #[error("USB stack refused the class: {0}")]
    Usb(#[from] UsbError),
    #[error("failed to start worker: {0}")]
    Spawn(#[from] io::Error),
    #[error("worker thread panicked")]
    WorkerPanicked,
}

/// Failed start. The backing store comes back unless it was lost with a
/// worker that never ran.
#[derive(Error)]
#[error("{error}")]
pub struct StartError<B> {
    #[source]
    pub error: MscError,
    pub storage: Option<B>,
}

impl<B> fmt::Debug for StartError<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartError")
            .field("error", &self.error)
            .field("storage", &self.storage.is_some())
            .finish()
    }
}

/// What the USB stack holds while the session is active.
#[derive(Debug)]
pub struct MassStorageClass {
    name: String,
    events: Arc<EventFlags>,
    max_packet_size: u16,
    configured: AtomicBool,
}

impl MassStorageClass {
    fn new(name: String, events: Arc<EventFlags>, max_packet_size: u16) -> Self {
        Self {
            name,
            events,
            max_packet_size,
            configured: AtomicBool::new(false),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.configured.load(Ordering::Acquire)
    }

    fn deconfigure<D: UsbDevice>(&self, dev: &D) {
        dev.ep_deconfigure(MSC_RX_EP);
        dev.ep_deconfigure(MSC_TX_EP);
        self.configured.store(false, Ordering::Release);
    }
}

impl<D: UsbDevice> UsbClass<D> for MassStorageClass {
    fn init(&self, dev: &Arc<D>) {
        debug!(name = %self.name, "class init");
        dev.connect(true);
    }

    fn deinit(&self, dev: &Arc<D>) {
        debug!(name = %self.name, "class deinit");
        dev.connect(false);
        self.deconfigure(dev.as_ref());
    }

    fn suspend(&self, _dev: &D) {
        self.events.set(Events::RESET);
    }

    fn wakeup(&self, _dev: &D) {}

    fn configure(&self, dev: &D, config: u8) -> Result<(), UsbError> {
        match config {
            0 => {
                self.deconfigure(dev);
                Ok(())
            },
            1 => {
                for ep in [MSC_RX_EP, MSC_TX_EP] {
                    if let Err(e) = dev.ep_configure(ep, self.max_packet_size) {
                        error!(?ep, "endpoint configure failed: {e}");
                        return Err(UsbError::UnsupportedConfiguration(config));
                    }
                }
                self.configured.store(true, Ordering::Release);
                debug!(mps = self.max_packet_size, "configured");
                Ok(())
            },
            other => Err(UsbError::UnsupportedConfiguration(other)),
        }
    }

    fn control(&self, _dev: &D, req: &ControlRequest) -> ControlResponse {
        if !req.is_class_interface() {
            return ControlResponse::Fail;
        }
        match req.request {
            REQ_GET_MAX_LUN => ControlResponse::Data(&MAX_LUN_REPLY),
            REQ_BOT_RESET => {
                self.events.set(Events::RESET);
                ControlResponse::Ack
            },
            _ => ControlResponse::Fail,
        }
    }

    fn endpoint_event(&self, _dev: &D, _ep: EndpointAddress) {
        self.events.set(Events::RXTX);
    }
}

/// An active mass-storage session.
pub struct MassStorageUsb<S: UsbStack, B> {
    stack: Arc<S>,
    class: Arc<MassStorageClass>,
    previous: Option<DynClass<S::Device>>,
    events: Arc<EventFlags>,
    worker: Option<JoinHandle<B>>,
}

impl<S: UsbStack, B: BlockDevice> MassStorageUsb<S, B> {
    /// Expose `storage` on `stack` under `name`.
    pub fn start(
        stack: Arc<S>,
        name: impl Into<String>,
        storage: B,
        cfg: &Config,
    ) -> Result<Self, StartError<B>> {
        let name = name.into();
        let events = Arc::new(EventFlags::new());
        let dev = stack.device();

        let scsi = ScsiSession::new(storage, cfg.device.clone());
        let transport = BotTransport::new(
            Arc::clone(&dev),
            scsi,
            cfg.transport.max_packet_size,
            cfg.transport.buffer_ceiling,
        );
        let worker = spawn_worker(name.clone(), Arc::clone(&events), transport).map_err(|e| {
            error!(%name, "cannot spawn worker: {e}");
            StartError {
                error: e.into(),
                storage: None,
            }
        })?;

        let previous = stack.active_class();
        let class = Arc::new(MassStorageClass::new(
            name.clone(),
            Arc::clone(&events),
            cfg.transport.max_packet_size,
        ));

        if let Err(e) = stack.set_class(Some(Arc::clone(&class) as DynClass<S::Device>)) {
            error!(%name, "USB locked, cannot start mass storage: {e}");
            events.set(Events::EXIT);
            let storage = worker.join().ok();
            return Err(StartError {
                error: e.into(),
                storage,
            });
        }

        info!(%name, "mass storage started");
        Ok(Self {
            stack,
            class,
            previous,
            events,
            worker: Some(worker),
        })
    }

    pub fn class(&self) -> &Arc<MassStorageClass> {
        &self.class
    }

    /// Restore the previous class, stop the worker and return the backing
    /// store.
    pub fn stop(mut self) -> Result<B, MscError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<B, MscError> {
        if let Err(e) = self.stack.set_class(self.previous.take()) {
            warn!("could not restore previous USB class: {e}");
        }
        self.events.set(Events::EXIT);

        let worker = self.worker.take().ok_or(MscError::WorkerPanicked)?;
        let storage = worker.join().map_err(|_| MscError::WorkerPanicked)?;
        info!(name = %self.class.name, "mass storage stopped");
        Ok(storage)
    }
}

impl<S: UsbStack, B> Drop for MassStorageUsb<S, B> {
    fn drop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        if let Err(e) = self.stack.set_class(self.previous.take()) {
            warn!("could not restore previous USB class: {e}");
        }
        self.events.set(Events::EXIT);
        if worker.join().is_err() {
            error!(name = %self.class.name, "worker panicked during drop");
        }
    }
}

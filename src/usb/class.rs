// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The seam between a USB device stack and a class implementation.
//!
//! The stack owns at most one active class. Installing a class calls its
//! `init`, replacing it calls `deinit` on the old one first. All other hooks
//! are invoked from the stack's event context and must not block.

use std::sync::Arc;

use thiserror::Error;

use crate::usb::endpoint::{EndpointAddress, UsbDevice};

/// bmRequestType: type = class (bits 6..5 = 01), recipient = interface.
const CLASS_INTERFACE: u8 = 0x21;
const REQUEST_TYPE_MASK: u8 = 0x7F;

/// Setup packet of a control transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlRequest {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: u16,
}

impl ControlRequest {
    /// Class request addressed to an interface, either direction.
    #[inline]
    pub fn is_class_interface(&self) -> bool {
        self.request_type & REQUEST_TYPE_MASK == CLASS_INTERFACE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlResponse {
    /// Status stage only.
    Ack,
    /// Data stage with this payload.
    Data(&'static [u8]),
    /// Not handled; the stack stalls EP0.
    Fail,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum UsbError {
    #[error("USB stack is locked by another class")]
    Locked,
    #[error("unsupported configuration {0}")]
    UnsupportedConfiguration(u8),
}

pub trait UsbClass<D: UsbDevice>: Send + Sync {
    fn init(&self, dev: &Arc<D>);
    fn deinit(&self, dev: &Arc<D>);
    fn suspend(&self, dev: &D);
    fn wakeup(&self, dev: &D);
    /// SET_CONFIGURATION; 0 deconfigures.
    fn configure(&self, dev: &D, config: u8) -> Result<(), UsbError>;
    fn control(&self, dev: &D, req: &ControlRequest) -> ControlResponse;
    fn endpoint_event(&self, dev: &D, ep: EndpointAddress);
}

pub type DynClass<D> = Arc<dyn UsbClass<D>>;

/// The device stack as seen by a class that wants to take the bus.
pub trait UsbStack: Send + Sync + 'static {
    type Device: UsbDevice;

    fn device(&self) -> Arc<Self::Device>;

    fn active_class(&self) -> Option<DynClass<Self::Device>>;

    /// Swap the active class. Fails with [`UsbError::Locked`] while another
    /// class holds the bus exclusively.
    fn set_class(&self, class: Option<DynClass<Self::Device>>) -> Result<(), UsbError>;
}

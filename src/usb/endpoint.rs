// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Raw endpoint primitives the transport runs on.
//!
//! Every call is non-blocking: an endpoint that cannot move data right now
//! reports [`EndpointError::NotReady`] (or a zero-length read) and the
//! caller retries after the next endpoint event.

use core::fmt;

use thiserror::Error;

/// Bulk OUT, host → device.
pub const MSC_RX_EP: EndpointAddress = EndpointAddress(0x01);
/// Bulk IN, device → host.
pub const MSC_TX_EP: EndpointAddress = EndpointAddress(0x82);

/// Endpoint number plus direction bit (bit 7 set = IN).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointAddress(pub u8);

impl EndpointAddress {
    #[inline]
    pub const fn number(self) -> u8 {
        self.0 & 0x0F
    }

    #[inline]
    pub const fn is_in(self) -> bool {
        self.0 & 0x80 != 0
    }
}

impl fmt::Debug for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = if self.is_in() { "IN" } else { "OUT" };
        write!(f, "EP{}-{dir}({:#04x})", self.number(), self.0)
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EndpointError {
    #[error("endpoint not ready")]
    NotReady,
    #[error("endpoint stalled")]
    Stalled,
    #[error("endpoint not configured")]
    NotConfigured,
}

/// Device-controller side of the USB stack.
///
/// Methods take `&self` because the stack calls them from interrupt
/// context and the worker thread concurrently; implementations do their own
/// synchronization.
pub trait UsbDevice: Send + Sync + 'static {
    /// Read one packet into `buf`; returns its length.
    fn ep_read(&self, ep: EndpointAddress, buf: &mut [u8]) -> Result<usize, EndpointError>;

    /// Queue up to one packet from `buf`; returns how many bytes were taken.
    fn ep_write(&self, ep: EndpointAddress, buf: &[u8]) -> Result<usize, EndpointError>;

    /// Set the endpoint halt feature. The host clears it.
    fn ep_stall(&self, ep: EndpointAddress);

    fn ep_configure(&self, ep: EndpointAddress, max_packet_size: u16) -> Result<(), EndpointError>;

    fn ep_deconfigure(&self, ep: EndpointAddress);

    /// Attach (`true`) or detach the device from the bus.
    fn connect(&self, on: bool);
}

//! This module contains the USB side: endpoint primitives, the class
//! interface the stack calls into, and the worker that runs the transport.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// USB class and stack interfaces, control requests.
pub mod class;
/// Endpoint addresses and the device-controller trait.
pub mod endpoint;
/// Event flags that wake the worker.
pub mod events;
/// Mass-storage class object and session lifecycle.
pub mod mass_storage;
/// Worker thread driving the transport.
pub mod worker;

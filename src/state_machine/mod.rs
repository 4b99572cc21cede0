//! This module contains the Bulk-Only Transport state machine.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// CBW → data → CSW state machine and the transport that drives it.
pub mod bot_states;
/// Common structures and traits for state machines.
pub mod common;
/// Growable staging buffer for data phases.
pub mod io_buffer;

//! This crate provides a USB Mass Storage (Bulk-Only Transport) device with
//! a SCSI block target on top of a pluggable backing store.
// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Handles configuration, command-line parsing, and logging.
pub mod cfg;
/// CDB decoders and parameter-data encoders for the supported SCSI commands.
pub mod control_block;
/// The SCSI command interpreter.
pub mod handlers;
/// Defines the CBW/CSW wire structures, opcodes and sense data.
pub mod models;
/// Contains the Bulk-Only Transport state machine and its I/O buffer.
pub mod state_machine;
/// Backing-store contract and the file and RAM adapters.
pub mod storage;
/// USB class shim, event flags, worker thread and session lifecycle.
pub mod usb;

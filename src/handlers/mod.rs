//! This module contains the SCSI command interpreter.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Per-session SCSI state and command execution.
pub mod scsi_session;

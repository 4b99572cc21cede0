// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::Notify;

bitflags::bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    /// Reasons to wake the worker.
    pub struct Events: u32 {
        /// Leave the loop; the session is stopping.
        const EXIT  = 1 << 0;
        /// Bus reset, suspend or BOT reset: flush protocol state.
        const RESET = 1 << 1;
        /// An endpoint has data or room.
        const RXTX  = 1 << 2;
    }
}

/// Sticky event set. `set` is safe from any thread, including the USB
/// interrupt path; `wait` is for the single worker.
#[derive(Debug, Default)]
pub struct EventFlags {
    bits: AtomicU32,
    notify: Notify,
}

impl EventFlags {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn set(&self, events: Events) {
        self.bits.fetch_or(events.bits(), Ordering::AcqRel);
        self.notify.notify_one();
    }

    /// Take whatever is pending without waiting.
    #[inline]
    pub fn take(&self) -> Events {
        Events::from_bits_truncate(self.bits.swap(0, Ordering::AcqRel))
    }

    /// Wait until at least one event is pending, then take all of them.
    pub async fn wait(&self) -> Events {
        loop {
            let ev = self.take();
            if !ev.is_empty() {
                return ev;
            }
            self.notify.notified().await;
        }
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Staging buffer shared by both data-phase directions.
//!
//! Capacity grows on demand up to a fixed ceiling and is never given back
//! while the owner lives, so the high-water mark is the largest data phase
//! seen so far (clamped to the ceiling).

use tracing::trace;

#[derive(Debug)]
pub struct IoBuffer {
    data: Vec<u8>,
    /// Bytes currently valid in `data`.
    len: usize,
    /// Bytes of `data[..len]` already consumed (sent to the host).
    pos: usize,
    ceiling: usize,
}

impl IoBuffer {
    pub fn new(ceiling: usize) -> Self {
        Self {
            data: Vec::new(),
            len: 0,
            pos: 0,
            ceiling,
        }
    }

    #[inline]
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Current allocation; equals the high-water mark.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Make room for the next data-phase round of a transfer with
    /// `remaining` bytes outstanding and return the round size.
    pub fn reserve_for(&mut self, remaining: u32) -> usize {
        let want = (remaining as usize).min(self.ceiling);
        if self.data.len() < want {
            trace!(from = self.data.len(), to = want, "grow io buffer");
            self.data.resize(want, 0);
        }
        want
    }

    /// Writable window `[len, end)` for accumulating inbound bytes.
    #[inline]
    pub fn fill_window(&mut self, end: usize) -> &mut [u8] {
        let end = end.min(self.data.len());
        let start = self.len.min(end);
        &mut self.data[start..end]
    }

    #[inline]
    pub fn advance_fill(&mut self, n: usize) {
        self.len = (self.len + n).min(self.data.len());
    }

    #[inline]
    pub fn filled(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Whole buffer up to `end`, for producers that write from offset 0.
    #[inline]
    pub fn stage_window(&mut self, end: usize) -> &mut [u8] {
        let end = end.min(self.data.len());
        &mut self.data[..end]
    }

    /// Mark `n` bytes at the front as staged for sending.
    #[inline]
    pub fn set_staged(&mut self, n: usize) {
        self.len = n.min(self.data.len());
        self.pos = 0;
    }

    /// Staged bytes not yet sent.
    #[inline]
    pub fn pending(&self) -> &[u8] {
        &self.data[self.pos..self.len]
    }

    #[inline]
    pub fn consume(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.len);
        if self.pos == self.len {
            self.clear();
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == self.pos
    }

    /// Drop staged bytes, keep the allocation.
    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
        self.pos = 0;
    }
}

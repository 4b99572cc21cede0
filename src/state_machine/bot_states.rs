// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Bulk-Only Transport device state machine.
//!
//! ```text
//!            ┌──────────── bad CBW: stall RX+TX ───┐
//!            v                                     │
//!   ┌──> ReadCbw ──start ok, OUT──> ReadData ──┐   │
//!   │       │  └──start ok, IN───> WriteData ──┤   │
//!   │       │                                  v
//!   │       └──start failed──────────┐      BuildCsw
//!   │                                v         │
//!   └─────────────────────────── WriteCsw <────┘
//! ```
//!
//! Every step either names the next state or reports that an endpoint is
//! not ready, in which case [`BotTransport::run`] returns and the worker
//! resumes it on the next wake event.

use std::sync::Arc;

use tracing::{debug, trace, warn};
use zerocopy::IntoBytes;

use crate::{
    handlers::scsi_session::ScsiSession,
    models::{
        cbw::{CBW_LEN, CommandBlockWrapper},
        csw::{CSW_LEN, CommandStatus, CommandStatusWrapper},
    },
    state_machine::{
        common::{StateMachine, Transition},
        io_buffer::IoBuffer,
    },
    storage::BlockDevice,
    usb::endpoint::{EndpointError, MSC_RX_EP, MSC_TX_EP, UsbDevice},
};

/// Everything a step may touch. Owned by the worker thread only.
#[derive(Debug)]
pub struct BotCtx<D, B> {
    pub dev: Arc<D>,
    pub scsi: ScsiSession<B>,
    pub cbw: Option<CommandBlockWrapper>,
    pub csw: CommandStatusWrapper,
    pub buf: IoBuffer,
    /// Bytes of the current data phase not yet moved.
    pub remaining: u32,
    pub max_packet_size: usize,
}

impl<D: UsbDevice, B: BlockDevice> BotCtx<D, B> {
    #[inline]
    fn tag(&self) -> u32 {
        self.cbw.as_ref().map_or(0, CommandBlockWrapper::tag)
    }

    fn fail_csw(&mut self) {
        self.csw = CommandStatusWrapper::new(self.tag(), self.remaining, CommandStatus::Failed);
    }

    fn stall_both(&self) {
        self.dev.ep_stall(MSC_RX_EP);
        self.dev.ep_stall(MSC_TX_EP);
    }
}

#[derive(Debug)]
pub struct ReadCbw;
#[derive(Debug)]
pub struct ReadData;
#[derive(Debug)]
pub struct WriteData;
#[derive(Debug)]
pub struct BuildCsw;
#[derive(Debug)]
pub struct WriteCsw;

/// BOT state machine types
#[derive(Debug)]
pub enum BotStates {
    ReadCbw(ReadCbw),
    ReadData(ReadData),
    WriteData(WriteData),
    BuildCsw(BuildCsw),
    WriteCsw(WriteCsw),
}

pub type BotStep = Transition<BotStates>;

/// ReadCbw
///
/// Wait for a 31-byte CBW. A malformed one stalls both pipes and is
/// dropped without a CSW; a good one starts the command and picks the data
/// phase from the direction bit.
impl<D: UsbDevice, B: BlockDevice> StateMachine<BotCtx<D, B>, BotStep> for ReadCbw {
    fn step(&self, ctx: &mut BotCtx<D, B>) -> BotStep {
        // One spare byte so an over-long packet is caught.
        let mut raw = [0u8; CBW_LEN + 1];
        let n = match ctx.dev.ep_read(MSC_RX_EP, &mut raw) {
            Ok(0) | Err(EndpointError::NotReady) => return Transition::Stay,
            Ok(n) => n,
            Err(e) => {
                trace!("CBW read: {e}");
                return Transition::Stay;
            },
        };

        let cbw = match CommandBlockWrapper::parse(&raw[..n]) {
            Ok(cbw) => cbw,
            Err(e) => {
                warn!("dropping CBW: {e}");
                ctx.stall_both();
                return Transition::Next(BotStates::ReadCbw(ReadCbw));
            },
        };

        ctx.remaining = cbw.data_transfer_length();
        let data_in = cbw.is_data_in();
        debug!(
            tag = cbw.tag(),
            len = ctx.remaining,
            data_in,
            opcode = cbw.command()[0],
            "CBW"
        );
        let started = ctx.scsi.start(cbw.command());
        ctx.cbw = Some(cbw);

        if started.is_err() {
            ctx.stall_both();
            ctx.fail_csw();
            return Transition::Next(BotStates::WriteCsw(WriteCsw));
        }

        ctx.buf.clear();
        if data_in {
            Transition::Next(BotStates::WriteData(WriteData))
        } else {
            Transition::Next(BotStates::ReadData(ReadData))
        }
    }
}

/// ReadData
///
/// Accumulate `min(remaining, ceiling)` bytes, then hand them to the
/// interpreter in one call.
impl<D: UsbDevice, B: BlockDevice> StateMachine<BotCtx<D, B>, BotStep> for ReadData {
    fn step(&self, ctx: &mut BotCtx<D, B>) -> BotStep {
        if ctx.remaining == 0 {
            return Transition::Next(BotStates::BuildCsw(BuildCsw));
        }

        let round = ctx.buf.reserve_for(ctx.remaining);
        if ctx.buf.filled().len() < round {
            let window = ctx.buf.fill_window(round);
            match ctx.dev.ep_read(MSC_RX_EP, window) {
                Ok(0) | Err(_) => return Transition::Stay,
                Ok(n) => ctx.buf.advance_fill(n),
            }
            if ctx.buf.filled().len() < round {
                return Transition::Next(BotStates::ReadData(ReadData));
            }
        }

        if let Err(e) = ctx.scsi.rx_data(ctx.buf.filled()) {
            warn!(remaining = ctx.remaining, "data-out rejected: {e}");
            ctx.dev.ep_stall(MSC_RX_EP);
            ctx.buf.clear();
            ctx.fail_csw();
            return Transition::Next(BotStates::BuildCsw(BuildCsw));
        }

        ctx.remaining -= round as u32;
        ctx.buf.clear();
        if ctx.remaining == 0 {
            Transition::Next(BotStates::BuildCsw(BuildCsw))
        } else {
            Transition::Next(BotStates::ReadData(ReadData))
        }
    }
}

/// WriteData
///
/// Refill from the interpreter when nothing is staged, then stream staged
/// bytes one packet at a time. A refill that fails or comes back empty ends
/// the data phase early; the residue tells the host how much is missing.
impl<D: UsbDevice, B: BlockDevice> StateMachine<BotCtx<D, B>, BotStep> for WriteData {
    fn step(&self, ctx: &mut BotCtx<D, B>) -> BotStep {
        if ctx.remaining == 0 {
            return Transition::Next(BotStates::BuildCsw(BuildCsw));
        }

        if ctx.buf.is_empty() {
            let round = ctx.buf.reserve_for(ctx.remaining);
            match ctx.scsi.tx_data(ctx.buf.stage_window(round)) {
                Ok(0) => return Transition::Next(BotStates::BuildCsw(BuildCsw)),
                Ok(n) => ctx.buf.set_staged(n.min(round)),
                Err(e) => {
                    debug!(remaining = ctx.remaining, "data-in ended: {e}");
                    return Transition::Next(BotStates::BuildCsw(BuildCsw));
                },
            }
        }

        let pending = ctx.buf.pending();
        let chunk = &pending[..pending.len().min(ctx.max_packet_size)];
        match ctx.dev.ep_write(MSC_TX_EP, chunk) {
            Ok(0) | Err(_) => Transition::Stay,
            Ok(n) => {
                let n = n.min(chunk.len());
                ctx.buf.consume(n);
                ctx.remaining = ctx.remaining.saturating_sub(n as u32);
                Transition::Next(BotStates::WriteData(WriteData))
            },
        }
    }
}

/// BuildCsw
///
/// Status comes from the interpreter, residue from what is left of the
/// data phase.
impl<D: UsbDevice, B: BlockDevice> StateMachine<BotCtx<D, B>, BotStep> for BuildCsw {
    fn step(&self, ctx: &mut BotCtx<D, B>) -> BotStep {
        let status = match ctx.scsi.end() {
            Ok(()) => CommandStatus::Passed,
            Err(e) => {
                debug!("command failed: {e}");
                CommandStatus::Failed
            },
        };
        ctx.csw = CommandStatusWrapper::new(ctx.tag(), ctx.remaining, status);
        Transition::Next(BotStates::WriteCsw(WriteCsw))
    }
}

/// WriteCsw
///
/// Send the 13-byte CSW. A short send stalls the IN pipe and retries on the
/// next wake.
impl<D: UsbDevice, B: BlockDevice> StateMachine<BotCtx<D, B>, BotStep> for WriteCsw {
    fn step(&self, ctx: &mut BotCtx<D, B>) -> BotStep {
        match ctx.dev.ep_write(MSC_TX_EP, ctx.csw.as_bytes()) {
            Ok(CSW_LEN) => {},
            Ok(0) | Err(_) => return Transition::Stay,
            Ok(n) => {
                warn!(sent = n, "short CSW write");
                ctx.dev.ep_stall(MSC_TX_EP);
                return Transition::Stay;
            },
        }

        debug!(
            tag = ctx.csw.tag(),
            residue = ctx.csw.residue(),
            status = ?ctx.csw.status,
            "CSW"
        );
        ctx.cbw = None;
        ctx.csw = CommandStatusWrapper::default();
        ctx.remaining = 0;
        ctx.buf.clear();
        Transition::Next(BotStates::ReadCbw(ReadCbw))
    }
}

/// The transport: context plus the current state.
#[derive(Debug)]
pub struct BotTransport<D, B> {
    ctx: BotCtx<D, B>,
    state: BotStates,
}

impl<D: UsbDevice, B: BlockDevice> BotTransport<D, B> {
    pub fn new(
        dev: Arc<D>,
        scsi: ScsiSession<B>,
        max_packet_size: u16,
        buffer_ceiling: u32,
    ) -> Self {
        Self {
            ctx: BotCtx {
                dev,
                scsi,
                cbw: None,
                csw: CommandStatusWrapper::default(),
                buf: IoBuffer::new(buffer_ceiling as usize),
                remaining: 0,
                max_packet_size: max_packet_size.max(1) as usize,
            },
            state: BotStates::ReadCbw(ReadCbw),
        }
    }

    /// Drive the state machine until an endpoint is not ready.
    pub fn run(&mut self) {
        loop {
            trace!("{:?}", self.state);
            let step = match &self.state {
                BotStates::ReadCbw(s) => s.step(&mut self.ctx),
                BotStates::ReadData(s) => s.step(&mut self.ctx),
                BotStates::WriteData(s) => s.step(&mut self.ctx),
                BotStates::BuildCsw(s) => s.step(&mut self.ctx),
                BotStates::WriteCsw(s) => s.step(&mut self.ctx),
            };
            match step {
                Transition::Next(next) => self.state = next,
                Transition::Stay => return,
            }
        }
    }

    /// Flush all protocol state and release the medium.
    pub fn reset(&mut self) {
        debug!("BOT reset");
        self.ctx.scsi.reset();
        self.ctx.cbw = None;
        self.ctx.csw = CommandStatusWrapper::default();
        self.ctx.buf.clear();
        self.ctx.remaining = 0;
        self.state = BotStates::ReadCbw(ReadCbw);
        self.ctx.scsi.eject();
    }

    pub fn state(&self) -> &BotStates {
        &self.state
    }

    pub fn session(&self) -> &ScsiSession<B> {
        &self.ctx.scsi
    }

    pub fn buffer_capacity(&self) -> usize {
        self.ctx.buf.capacity()
    }

    pub fn into_session(self) -> ScsiSession<B> {
        self.ctx.scsi
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! SCSI block target.
//!
//! One command is active at a time. The transport drives it as
//! `start` → (`rx_data`* | `tx_data`*) → `end`; the only state that survives
//! `end` is the sense left by a failing command, which the next
//! REQUEST SENSE reports and clears.

use tracing::{debug, trace, warn};
use zerocopy::IntoBytes;

use crate::{
    cfg::config::DeviceConfig,
    control_block::{
        common::{CDB_LEN, Rw10Cdb, copy_truncated},
        inquiry::{InquiryCdb, StandardInquiryData, unit_serial_vpd},
        medium_removal::PreventAllowCdb,
        mod_sense::ModeParameterHeader6,
        read_capacity::Rc10Raw,
        read_format_capacities::FormatCapacityList,
        start_stop::StartStopCdb,
    },
    models::{
        opcode::ScsiOpcode,
        sense_data::{ScsiError, SenseData, asc_ascq_to_str},
    },
    storage::{BLOCK_SIZE, BlockDevice, StorageError, blocks_to_bytes, check_range},
};

#[derive(Debug, Clone)]
struct ActiveCommand {
    cdb: [u8; CDB_LEN],
    lba: u32,
    remaining: u16,
    tx_done: bool,
    rx_done: bool,
    failed: bool,
}

impl ActiveCommand {
    #[inline]
    fn raw_opcode(&self) -> u8 {
        self.cdb[0]
    }

    #[inline]
    fn opcode(&self) -> Option<ScsiOpcode> {
        ScsiOpcode::from_u8(self.cdb[0])
    }
}

#[derive(Debug)]
pub struct ScsiSession<B> {
    storage: B,
    device: DeviceConfig,
    sense: SenseData,
    cmd: Option<ActiveCommand>,
}

impl<B: BlockDevice> ScsiSession<B> {
    pub fn new(storage: B, device: DeviceConfig) -> Self {
        Self {
            storage,
            device,
            sense: SenseData::NONE,
            cmd: None,
        }
    }

    /// Begin a command. READ(10)/WRITE(10) are range-checked here so the
    /// data phase never starts against an impossible request.
    pub fn start(&mut self, command: &[u8]) -> Result<(), ScsiError> {
        self.cmd = None;
        if command.is_empty() {
            return Err(self.fail(ScsiError::EmptyCommand));
        }

        let mut cdb = [0u8; CDB_LEN];
        let n = command.len().min(CDB_LEN);
        cdb[..n].copy_from_slice(&command[..n]);

        let mut active = ActiveCommand {
            cdb,
            lba: 0,
            remaining: 0,
            tx_done: false,
            rx_done: false,
            failed: false,
        };

        match active.opcode() {
            Some(op @ (ScsiOpcode::Read10 | ScsiOpcode::Write10)) => {
                let rw = Rw10Cdb::parse(&cdb);
                let capacity = self.storage.num_blocks();
                if capacity == 0 {
                    return Err(self.fail(ScsiError::MediumNotPresent));
                }
                if check_range(rw.lba, rw.blocks, capacity).is_err() {
                    return Err(self.fail(ScsiError::LbaOutOfRange {
                        lba: rw.lba,
                        blocks: rw.blocks,
                        capacity,
                    }));
                }
                active.lba = rw.lba;
                active.remaining = rw.blocks;
                active.tx_done = rw.blocks == 0;
                active.rx_done = rw.blocks == 0;
                debug!(%op, lba = rw.lba, blocks = rw.blocks, "start");
            },
            Some(op) => debug!(%op, "start"),
            None => debug!(opcode = active.raw_opcode(), "start, unsupported opcode"),
        }

        self.cmd = Some(active);
        Ok(())
    }

    /// Consume host data for the active WRITE(10). `buf` holds whole blocks;
    /// anything beyond the outstanding count is ignored.
    pub fn rx_data(&mut self, buf: &[u8]) -> Result<(), ScsiError> {
        let Some(cmd) = self.cmd.as_ref() else {
            return Err(self.fail(ScsiError::NoCommand));
        };
        if cmd.failed {
            return Err(ScsiError::AlreadyFailed);
        }
        if cmd.opcode() != Some(ScsiOpcode::Write10) || cmd.rx_done {
            let op = cmd.raw_opcode();
            return Err(self.fail(ScsiError::UnexpectedData(op)));
        }

        let (lba, remaining) = (cmd.lba, cmd.remaining);
        let count = remaining.min((buf.len() / BLOCK_SIZE).min(u16::MAX as usize) as u16);
        if count == 0 {
            return Err(self.fail(ScsiError::InvalidField {
                opcode: ScsiOpcode::Write10,
            }));
        }

        trace!(lba, count, "write");
        if let Err(source) = self
            .storage
            .write(lba, count, &buf[..blocks_to_bytes(count)])
        {
            return Err(self.fail(ScsiError::Write { lba, source }));
        }

        if let Some(cmd) = self.cmd.as_mut() {
            cmd.lba = lba.wrapping_add(count as u32);
            cmd.remaining = remaining - count;
            cmd.rx_done = cmd.remaining == 0;
        }
        Ok(())
    }

    /// Produce the next chunk of response data into `out`.
    ///
    /// `Ok(0)` means the response is exhausted. Fixed-size replies are
    /// truncated to `out.len()` and complete in one call; READ(10) yields as
    /// many whole blocks as fit.
    pub fn tx_data(&mut self, out: &mut [u8]) -> Result<usize, ScsiError> {
        let Some(cmd) = self.cmd.as_ref() else {
            return Err(self.fail(ScsiError::NoCommand));
        };
        if cmd.failed {
            return Err(ScsiError::AlreadyFailed);
        }
        if cmd.tx_done {
            return Ok(0);
        }

        let cdb = cmd.cdb;
        let (lba, remaining) = (cmd.lba, cmd.remaining);
        let written = match cmd.opcode() {
            Some(ScsiOpcode::RequestSense) => {
                let n = copy_truncated(out, &self.sense.to_fixed());
                self.sense = SenseData::NONE;
                n
            },
            Some(ScsiOpcode::Inquiry) => {
                let inq = InquiryCdb::parse(&cdb);
                if inq.is_standard() {
                    copy_truncated(out, StandardInquiryData::new(&self.device).as_bytes())
                } else if inq.is_unit_serial() {
                    copy_truncated(out, &unit_serial_vpd(&self.device))
                } else {
                    return Err(self.fail(ScsiError::InvalidField {
                        opcode: ScsiOpcode::Inquiry,
                    }));
                }
            },
            Some(ScsiOpcode::ReadFormatCapacities) => {
                let blocks = self.storage.num_blocks();
                if blocks == 0 {
                    return Err(self.fail(ScsiError::MediumNotPresent));
                }
                copy_truncated(out, FormatCapacityList::new(blocks).as_bytes())
            },
            Some(ScsiOpcode::ReadCapacity10) => {
                let blocks = self.storage.num_blocks();
                if blocks == 0 {
                    return Err(self.fail(ScsiError::MediumNotPresent));
                }
                copy_truncated(out, Rc10Raw::new(blocks).as_bytes())
            },
            Some(ScsiOpcode::ModeSense6) => {
                copy_truncated(out, ModeParameterHeader6::empty().as_bytes())
            },
            Some(ScsiOpcode::Read10) => return self.read_blocks(lba, remaining, out),
            _ => {
                let op = cdb[0];
                return Err(self.fail(ScsiError::InvalidOpcode(op)));
            },
        };

        if let Some(cmd) = self.cmd.as_mut() {
            cmd.tx_done = true;
        }
        Ok(written)
    }

    fn read_blocks(&mut self, lba: u32, remaining: u16, out: &mut [u8]) -> Result<usize, ScsiError> {
        let count = remaining.min((out.len() / BLOCK_SIZE).min(u16::MAX as usize) as u16);
        if count == 0 {
            return Err(self.fail(ScsiError::InvalidField {
                opcode: ScsiOpcode::Read10,
            }));
        }

        trace!(lba, count, "read");
        let wanted = blocks_to_bytes(count);
        let got = match self.storage.read(lba, count, &mut out[..wanted]) {
            Ok(got) => got.min(wanted),
            Err(source) => return Err(self.fail(ScsiError::Read { lba, source })),
        };

        let done = (got / BLOCK_SIZE) as u16;
        if done == 0 {
            return Err(self.fail(ScsiError::Read {
                lba,
                source: StorageError::ShortTransfer { wanted, got },
            }));
        }

        if let Some(cmd) = self.cmd.as_mut() {
            cmd.lba = lba.wrapping_add(done as u32);
            cmd.remaining = remaining - done;
            cmd.tx_done = cmd.remaining == 0;
        }
        Ok(blocks_to_bytes(done))
    }

    /// Finish the active command. `Ok` becomes CSW status PASSED.
    pub fn end(&mut self) -> Result<(), ScsiError> {
        let Some(cmd) = self.cmd.take() else {
            return Err(self.fail(ScsiError::NoCommand));
        };
        if cmd.failed {
            return Err(ScsiError::AlreadyFailed);
        }

        let result = match cmd.opcode() {
            Some(ScsiOpcode::TestUnitReady)
            | Some(ScsiOpcode::RequestSense)
            | Some(ScsiOpcode::Inquiry)
            | Some(ScsiOpcode::ModeSense6)
            | Some(ScsiOpcode::ReadFormatCapacities)
            | Some(ScsiOpcode::ReadCapacity10) => Ok(()),
            Some(ScsiOpcode::Read10) if cmd.tx_done => Ok(()),
            Some(ScsiOpcode::Write10) if cmd.rx_done => Ok(()),
            Some(ScsiOpcode::Read10 | ScsiOpcode::Write10) => Err(ScsiError::Incomplete {
                remaining: cmd.remaining,
            }),
            Some(ScsiOpcode::PreventAllowMediumRemoval) => {
                if PreventAllowCdb::parse(&cmd.cdb).wants_prevent() {
                    Err(ScsiError::RemovalPrevented)
                } else {
                    Ok(())
                }
            },
            Some(ScsiOpcode::StartStopUnit) => {
                let ss = StartStopCdb::parse(&cmd.cdb);
                if ss.load_eject {
                    debug!(start = ss.start, "host requested eject");
                    self.storage.eject();
                }
                Ok(())
            },
            None => Err(ScsiError::InvalidOpcode(cmd.raw_opcode())),
        };

        result.map_err(|e| self.fail(e))
    }

    /// Forget the active command and any pending sense.
    pub fn reset(&mut self) {
        self.cmd = None;
        self.sense = SenseData::NONE;
    }

    pub fn eject(&mut self) {
        self.storage.eject();
    }

    /// Sense that the next REQUEST SENSE would report.
    #[inline]
    pub fn sense(&self) -> SenseData {
        self.sense
    }

    /// `(next_lba, remaining_blocks)` of an active READ(10)/WRITE(10).
    pub fn pending_blocks(&self) -> Option<(u32, u16)> {
        self.cmd
            .as_ref()
            .filter(|c| c.opcode().is_some_and(ScsiOpcode::is_block_io))
            .map(|c| (c.lba, c.remaining))
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.cmd.is_none()
    }

    pub fn storage(&self) -> &B {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut B {
        &mut self.storage
    }

    pub fn into_storage(self) -> B {
        self.storage
    }

    /// Record the sense for `err` and mark the active command failed.
    fn fail(&mut self, err: ScsiError) -> ScsiError {
        if let Some(sense) = err.sense() {
            warn!(
                sense_key = sense.sense_key,
                asc = sense.asc,
                "{err}: {}",
                asc_ascq_to_str(sense.asc, sense.ascq)
            );
            self.sense = sense;
        }
        if let Some(cmd) = self.cmd.as_mut() {
            cmd.failed = true;
        }
        err
    }
}

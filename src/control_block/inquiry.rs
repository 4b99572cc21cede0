// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! INQUIRY (6).
//!
//! CDB layout (SPC):
//!   [0] = 0x12 (INQUIRY)
//!   [1] = EVPD (bit 0); other bits reserved (CMDDT obsolete → 0)
//!   [2] = Page Code (only when EVPD=1; else 0)
//!   [3] = Allocation Length (MSB, SPC-3+)
//!   [4] = Allocation Length
//!   [5] = Control
//!
//! The target answers two forms: standard data (EVPD=0, page 0) and the
//! Unit Serial Number page (EVPD=1, page 0x80).

use anyhow::{Result, bail};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::{
    cfg::config::DeviceConfig, control_block::common::CDB_LEN, models::opcode::ScsiOpcode,
};

pub const STANDARD_INQUIRY_LEN: usize = 36;
pub const UNIT_SERIAL_VPD_LEN: usize = 5;

/// Common VPD page codes (subset).
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum VpdPage {
    SupportedPages = 0x00,
    UnitSerial = 0x80,
    DeviceId = 0x83,
}

impl From<VpdPage> for u8 {
    #[inline]
    fn from(p: VpdPage) -> u8 {
        p as u8
    }
}

impl TryFrom<u8> for VpdPage {
    type Error = anyhow::Error;

    #[inline]
    fn try_from(v: u8) -> Result<Self> {
        use VpdPage::*;
        Ok(match v {
            0x00 => SupportedPages,
            0x80 => UnitSerial,
            0x83 => DeviceId,
            _ => bail!("invalid vpd page: {v}"),
        })
    }
}

/// Decoded INQUIRY CDB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InquiryCdb {
    pub evpd: bool,
    pub page_code: u8,
}

impl InquiryCdb {
    #[inline]
    pub fn parse(cdb: &[u8; CDB_LEN]) -> Self {
        Self {
            evpd: cdb[1] & 0x01 != 0,
            page_code: cdb[2],
        }
    }

    #[inline]
    pub fn is_standard(&self) -> bool {
        !self.evpd && self.page_code == 0
    }

    #[inline]
    pub fn is_unit_serial(&self) -> bool {
        self.evpd && self.page_code == u8::from(VpdPage::UnitSerial)
    }
}

/// Fill a **Standard INQUIRY (EVPD=0)** CDB.
#[inline]
pub fn fill_inquiry_standard(cdb: &mut [u8; CDB_LEN], allocation_len: u8) {
    cdb.fill(0);
    cdb[0] = ScsiOpcode::Inquiry.into();
    cdb[4] = allocation_len;
}

/// Fill a **VPD INQUIRY (EVPD=1)** CDB.
#[inline]
pub fn fill_inquiry_vpd(cdb: &mut [u8; CDB_LEN], page: VpdPage, allocation_len: u8) {
    cdb.fill(0);
    cdb[0] = ScsiOpcode::Inquiry.into();
    cdb[1] = 0x01; // EVPD=1
    cdb[2] = page.into();
    cdb[4] = allocation_len;
}

/// SPC-2 standard INQUIRY data as this target reports it.
#[repr(C)]
#[derive(Debug, Clone, PartialEq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct StandardInquiryData {
    pub peripheral: u8,           // 0: qualifier 0, direct-access block device
    pub rmb: u8,                  // 1: bit 7 removable medium
    pub version: u8,              // 2: 0x04 = SPC-2
    pub response_data_format: u8, // 3: 2
    pub additional_length: u8,    // 4: n - 4
    pub flags: [u8; 3],           // 5..8
    pub vendor_id: [u8; 8],       // 8..16
    pub product_id: [u8; 16],     // 16..32
    pub product_rev: [u8; 4],     // 32..36
}

impl StandardInquiryData {
    pub fn new(device: &DeviceConfig) -> Self {
        Self {
            peripheral: 0x00,
            rmb: 0x80,
            version: 0x04,
            response_data_format: 0x02,
            additional_length: (STANDARD_INQUIRY_LEN - 5) as u8,
            flags: [0; 3],
            vendor_id: space_padded(&device.vendor),
            product_id: space_padded(&device.product),
            product_rev: space_padded(&device.revision),
        }
    }
}

/// Unit Serial Number VPD page: header plus a single serial character.
pub fn unit_serial_vpd(device: &DeviceConfig) -> [u8; UNIT_SERIAL_VPD_LEN] {
    let serial = device.serial.bytes().next().unwrap_or(b'0');
    [0x00, VpdPage::UnitSerial.into(), 0x00, 0x01, serial]
}

fn space_padded<const N: usize>(s: &str) -> [u8; N] {
    let mut out = [b' '; N];
    let n = s.len().min(N);
    out[..n].copy_from_slice(&s.as_bytes()[..n]);
    out
}

/// Host-side view of standard INQUIRY data.
#[derive(Debug, Clone)]
pub struct InquiryStandard {
    pub peripheral_qualifier: u8, // bits 7..5 of byte0
    pub device_type: u8,          // bits 4..0 of byte0
    pub rmb: bool,                // byte1 bit7
    pub version: u8,              // byte2
    pub response_data_format: u8, // byte3 low nibble
    pub additional_length: u8,    // byte4
    pub vendor_id: String,        // bytes 8..16
    pub product_id: String,       // bytes 16..32
    pub product_rev: String,      // bytes 32..36
}

/// Parse a Standard INQUIRY (EVPD=0) response (minimum 36 bytes).
pub fn parse_inquiry_standard(buf: &[u8]) -> Result<InquiryStandard> {
    let Ok((raw, _)) = StandardInquiryData::ref_from_prefix(buf) else {
        bail!("INQUIRY buffer too short: {}", buf.len());
    };

    Ok(InquiryStandard {
        peripheral_qualifier: (raw.peripheral >> 5) & 0x07,
        device_type: raw.peripheral & 0x1F,
        rmb: raw.rmb & 0x80 != 0,
        version: raw.version,
        response_data_format: raw.response_data_format & 0x0F,
        additional_length: raw.additional_length,
        vendor_id: trim_ascii(&raw.vendor_id),
        product_id: trim_ascii(&raw.product_id),
        product_rev: trim_ascii(&raw.product_rev),
    })
}

/// Parse VPD page 0x80 (unit serial number, ASCII, space-padded).
pub fn parse_vpd_unit_serial(buf: &[u8]) -> Result<String> {
    if buf.len() < 4 {
        bail!("VPD buffer too short: {}", buf.len());
    }
    if buf[1] != u8::from(VpdPage::UnitSerial) {
        bail!("expected VPD page 0x80, got 0x{:02X}", buf[1]);
    }
    let len = u16::from_be_bytes([buf[2], buf[3]]) as usize;
    if buf.len() < 4 + len {
        bail!(
            "VPD truncated: header says {} bytes, have {}",
            len,
            buf.len().saturating_sub(4)
        );
    }
    Ok(trim_ascii(&buf[4..4 + len]))
}

fn trim_ascii(bytes: &[u8]) -> String {
    let s: String = bytes
        .iter()
        .map(|&b| if b.is_ascii() { b as char } else { '?' })
        .collect();
    s.trim().to_string()
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::cfg::{enums::YesNo, logger::LogConfig};

/// Largest buffer the transport may grow to: just under the 64 KiB transfer
/// limit, rounded down to whole blocks.
pub const DEFAULT_BUFFER_CEILING: u32 = 0x10000 - 512;
pub const DEFAULT_MAX_PACKET_SIZE: u16 = 64;

const VALID_PACKET_SIZES: [u16; 5] = [8, 16, 32, 64, 512];

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Config {
    /// Identity strings reported by INQUIRY.
    #[serde(default)]
    pub device: DeviceConfig,
    /// Bulk-Only Transport sizing.
    #[serde(default)]
    pub transport: TransportConfig,
    /// Backing image used by the binary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logger: Option<LogConfig>,
}

/// Identity reported to the host.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    #[serde(rename = "Vendor")]
    /// T10 vendor identification, up to 8 ASCII characters.
    pub vendor: String,
    #[serde(rename = "Product")]
    /// Product identification, up to 16 ASCII characters.
    pub product: String,
    #[serde(rename = "Revision")]
    /// Product revision level, up to 4 ASCII characters.
    pub revision: String,
    #[serde(rename = "Serial")]
    /// Single-character unit serial number (VPD page 0x80).
    pub serial: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            vendor: "Flipper".to_string(),
            product: "Mass Storage".to_string(),
            revision: "0001".to_string(),
            serial: "0".to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    #[serde(rename = "MaxPacketSize")]
    /// wMaxPacketSize of both bulk endpoints.
    pub max_packet_size: u16,
    #[serde(rename = "BufferCeiling")]
    /// Upper bound of the staging buffer, in bytes.
    pub buffer_ceiling: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            buffer_ceiling: DEFAULT_BUFFER_CEILING,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ImageConfig {
    #[serde(rename = "Path")]
    pub path: PathBuf,
    #[serde(rename = "SizeBytes")]
    /// Size used when the image has to be created.
    pub size_bytes: u64,
    #[serde(default, rename = "CreateIfMissing")]
    pub create_if_missing: YesNo,
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let s = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_yaml_str(&s)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let mut cfg: Config =
            serde_yaml::from_str(s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants and normalizes string fields.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        let d = &mut self.device;
        normalize_ascii(&mut d.vendor, "Vendor", 8)?;
        normalize_ascii(&mut d.product, "Product", 16)?;
        normalize_ascii(&mut d.revision, "Revision", 4)?;
        normalize_ascii(&mut d.serial, "Serial", 1)?;
        ensure!(d.serial.len() == 1, "Serial must be exactly one character");

        let t = &self.transport;
        ensure!(
            VALID_PACKET_SIZES.contains(&t.max_packet_size),
            "MaxPacketSize must be one of {VALID_PACKET_SIZES:?}, got {}",
            t.max_packet_size
        );
        ensure!(
            (512..0x10000).contains(&t.buffer_ceiling) && t.buffer_ceiling % 512 == 0,
            "BufferCeiling must be a multiple of 512 in 512..65536, got {}",
            t.buffer_ceiling
        );

        if let Some(img) = &self.image {
            ensure!(
                !img.path.as_os_str().is_empty(),
                "image Path must not be empty"
            );
            ensure!(
                img.size_bytes > 0 && img.size_bytes % 512 == 0,
                "image SizeBytes must be a positive multiple of 512, got {}",
                img.size_bytes
            );
        }

        Ok(())
    }
}

fn normalize_ascii(field: &mut String, name: &str, max: usize) -> Result<()> {
    let trimmed = field.trim();
    ensure!(!trimmed.is_empty(), "{name} must not be empty");
    ensure!(
        trimmed.bytes().all(|b| b.is_ascii_graphic() || b == b' '),
        "{name} must be printable ASCII"
    );
    ensure!(
        trimmed.len() <= max,
        "{name} must be at most {max} characters, got {}",
        trimmed.len()
    );
    if trimmed.len() != field.len() {
        *field = trimmed.to_string();
    }
    Ok(())
}

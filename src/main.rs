// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Context, Result};
use tokio::main;
use tracing::{info, warn};
use usb_msc_rs::{
    cfg::{cli::config_path_from_args, config::Config, logger::init_logger},
    storage::{
        BLOCK_SIZE, BlockDevice,
        file::{FileBlockDevice, create_image},
    },
};

#[main]
async fn main() -> Result<()> {
    let path = config_path_from_args(std::env::args().skip(1))?;
    let config = Config::load_from_file(&path)
        .with_context(|| format!("failed to load config {}", path.display()))?;

    let _guard = match &config.logger {
        Some(log_cfg) => Some(init_logger(log_cfg)?),
        None => None,
    };

    let image = config
        .image
        .as_ref()
        .context("config has no `image` section, nothing to expose")?;

    if !image.path.exists() {
        if image.create_if_missing.as_bool() {
            create_image(&image.path, image.size_bytes)
                .with_context(|| format!("failed to create {}", image.path.display()))?;
        } else {
            warn!(path = %image.path.display(), "image is missing and CreateIfMissing is No");
        }
    }

    let dev = FileBlockDevice::open(&image.path)
        .with_context(|| format!("failed to open {}", image.path.display()))?;
    let blocks = dev.num_blocks();

    info!(
        path = %image.path.display(),
        blocks,
        block_size = BLOCK_SIZE,
        bytes = blocks as u64 * BLOCK_SIZE as u64,
        vendor = %config.device.vendor,
        product = %config.device.product,
        "disk image ready"
    );
    println!(
        "{}: {} blocks x {} bytes ({} bytes), {} {} rev {}",
        image.path.display(),
        blocks,
        BLOCK_SIZE,
        blocks as u64 * BLOCK_SIZE as u64,
        config.device.vendor,
        config.device.product,
        config.device.revision,
    );

    Ok(())
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

/// Config file used when the binary is started without arguments.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Make `rel` absolute against the working directory and canonicalize it.
pub fn resolve_config_path(rel: &str) -> Result<PathBuf> {
    let p = Path::new(rel);

    let abs = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()
            .context("cannot get current working dir")?
            .join(p)
    };

    let canon = abs
        .canonicalize()
        .with_context(|| format!("failed to canonicalize path {abs:?}"))?;

    Ok(canon)
}

/// `usb-msc-rs [config.yaml]`: pick the config path from the arguments
/// (program name already stripped).
pub fn config_path_from_args<I>(mut args: I) -> Result<PathBuf>
where I: Iterator<Item = String> {
    let path = args.next().unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    if let Some(extra) = args.next() {
        bail!("unexpected argument {extra:?}; usage: usb-msc-rs [config.yaml]");
    }
    resolve_config_path(&path)
}

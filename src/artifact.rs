// src/artifact.rs

//! Atomic writes for configuration documents a plan acts on.
//!
//! The document is written to an exclusively created sibling temp file
//! (mode 0600) and renamed over the target, so readers never observe a
//! partially written file.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use crate::plans::{NETPLAN_CONFIG_FILE_NAME, NETPLAN_CONFIG_HEADER};

const MAX_TEMP_ATTEMPTS: u32 = 1000;

/// Atomically replace `path` with `contents`.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let (tmp_path, mut file) = create_temp_sibling(path)?;

    let written = file
        .write_all(contents)
        .and_then(|()| file.sync_all())
        .with_context(|| format!("writing {}", tmp_path.display()));
    drop(file);

    if let Err(e) = written.and_then(|()| {
        fs::rename(&tmp_path, path)
            .with_context(|| format!("renaming {} to {}", tmp_path.display(), path.display()))
    }) {
        if let Err(rm) = fs::remove_file(&tmp_path) {
            debug!(path = %tmp_path.display(), error = %rm, "failed to remove temp file");
        }
        return Err(e);
    }

    debug!(path = %path.display(), bytes = contents.len(), "artifact written");
    Ok(())
}

/// Write a network configuration document under `root` and return its path.
pub fn write_netplan_config(root: &Path, body: &[u8]) -> Result<PathBuf> {
    let dir = root.join("etc/netplan");
    fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

    let path = dir.join(NETPLAN_CONFIG_FILE_NAME);
    let mut contents = Vec::with_capacity(NETPLAN_CONFIG_HEADER.len() + body.len());
    contents.extend_from_slice(NETPLAN_CONFIG_HEADER.as_bytes());
    contents.extend_from_slice(body);

    write_atomic(&path, &contents)?;
    info!(path = %path.display(), "network configuration written");
    Ok(path)
}

fn create_temp_sibling(path: &Path) -> Result<(PathBuf, File)> {
    let base = std::process::id();
    for attempt in 0..MAX_TEMP_ATTEMPTS {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(format!(".{}", base.wrapping_add(attempt) % 100_000));
        let tmp = PathBuf::from(tmp);

        match open_exclusive(&tmp) {
            Ok(file) => return Ok((tmp, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(e).with_context(|| format!("creating {}", tmp.display()));
            }
        }
    }
    bail!(
        "no free temporary file name next to {} after {MAX_TEMP_ATTEMPTS} attempts",
        path.display()
    )
}

#[cfg(unix)]
fn open_exclusive(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_exclusive(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

//! Mode bits.
//!
//! # Platform Behavior
//!
//! **Unix**: modes are applied verbatim through `PermissionsExt`.
//!
//! **Windows (non-Unix)**: only the owner-write bit is honoured, mapped to
//! the `readonly` attribute. [`mode_of`] reports `0o644` or `0o444`.

use std::fs::{self, Metadata};
use std::path::Path;

use crate::{Error, Result};

/// Mode forced onto an existing file that refuses to be truncated.
pub const WRITABLE_MODE: u32 = 0o600;

/// Permission bits of `metadata`, without the file-type bits.
#[cfg(unix)]
pub fn mode_of(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
pub fn mode_of(metadata: &Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

#[cfg(unix)]
pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777)).map_err(|e| {
        Error::Permissions {
            path: path.to_path_buf(),
            source: e,
        }
    })
}

#[cfg(not(unix))]
pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    let map_err = |e| Error::Permissions {
        path: path.to_path_buf(),
        source: e,
    };
    let mut perms = fs::metadata(path).map_err(map_err)?.permissions();
    perms.set_readonly(mode & 0o200 == 0);
    fs::set_permissions(path, perms).map_err(map_err)
}

/// Make an existing file writable by its owner.
pub fn force_writable(path: &Path) -> Result<()> {
    set_mode(path, WRITABLE_MODE)
}

//! Slug extraction: gunzip → untar → destination directory.
//!
//! Entries are materialised as they stream past; a failure leaves whatever
//! was already written in place.
//!
//! # Platform Behavior
//!
//! **Unix**: file modes from the archive are applied after each body is
//! written, so read-only files can still be extracted.
//!
//! **Windows (non-Unix)**: only the owner-write bit is honoured.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use flate2::read::GzDecoder;
use tar::EntryType;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::meta::Unpacked;
use crate::options::check_cancelled;

/// Extract the slug read from `source` into `destination`.
pub fn extract<R: Read>(source: R, destination: impl AsRef<Path>) -> Result<Unpacked> {
    extract_with(source, destination, None)
}

/// [`extract`], stopping at the next entry once `cancel` is raised.
pub fn extract_with<R: Read>(
    source: R,
    destination: impl AsRef<Path>,
    cancel: Option<&AtomicBool>,
) -> Result<Unpacked> {
    let destination = destination.as_ref();
    let mut archive = tar::Archive::new(GzDecoder::new(source));
    let mut unpacked = Unpacked::default();

    for entry in archive.entries().map_err(|e| Error::Decode { source: e })? {
        check_cancelled(cancel)?;

        let mut entry = entry.map_err(|e| Error::Decode { source: e })?;
        let name = stored_name(&entry)?;
        let path = destination.join(&name);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::DirectoryCreation {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        match entry.header().entry_type() {
            EntryType::Symlink => {
                let target = entry
                    .link_name()
                    .map_err(|e| Error::Decode { source: e })?
                    .ok_or_else(|| Error::InvalidEntry {
                        path: path.clone(),
                        reason: "symlink without target".into(),
                    })?
                    .into_owned();
                etok_fs::create_symlink(&target, &path)?;
                debug!(link = %path.display(), target = %target.display(), "created symlink");
            }
            EntryType::Directory => {
                fs::create_dir_all(&path).map_err(|e| Error::DirectoryCreation {
                    path: path.clone(),
                    source: e,
                })?;
            }
            EntryType::Regular => {
                unpacked.total_bytes += write_file(&mut entry, &path)?;
            }
            other => {
                return Err(Error::UnsupportedEntryType {
                    path,
                    kind: format!("{other:?}"),
                });
            }
        }

        unpacked.entries.push(path);
    }

    info!(
        entries = unpacked.entries.len(),
        bytes = unpacked.total_bytes,
        path = %destination.display(),
        "slug extracted"
    );
    Ok(unpacked)
}

/// The entry's path with one leading `/` removed.
fn stored_name<R: Read>(entry: &tar::Entry<'_, R>) -> Result<PathBuf> {
    let path = entry.path().map_err(|e| Error::Decode { source: e })?;
    let name = path.strip_prefix("/").unwrap_or(&*path);
    Ok(name.to_path_buf())
}

fn write_file<R: Read>(entry: &mut tar::Entry<'_, R>, path: &Path) -> Result<u64> {
    let mode = entry.header().mode().map_err(|e| Error::InvalidEntry {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut file = create_file(path)?;
    let written = io::copy(entry, &mut file).map_err(|e| Error::Extract {
        path: path.to_path_buf(),
        source: e,
    })?;
    drop(file);

    // last, so that a read-only mode cannot block the body
    etok_fs::set_mode(path, mode)?;
    Ok(written)
}

/// Truncate-or-create, forcing a writable mode once if an earlier entry for
/// the same path left it read-only.
fn create_file(path: &Path) -> Result<File> {
    let extract_err = |e| Error::Extract {
        path: path.to_path_buf(),
        source: e,
    };

    match File::create(path) {
        Ok(file) => Ok(file),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            if let Err(err) = etok_fs::force_writable(path) {
                debug!(path = %path.display(), error = %err, "could not make file writable");
            }
            File::create(path).map_err(extract_err)
        }
        Err(e) => Err(extract_err(e)),
    }
}

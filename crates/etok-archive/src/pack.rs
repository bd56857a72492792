//! Slug creation: module trees → tar → gzip → [`MaxWriter`] → sink.

use std::collections::HashSet;
use std::fs::{self, File, FileType, Metadata};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use flate2::Compression;
use flate2::write::GzEncoder;
use tar::{EntryType, Header};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::ignore::RuleSet;
use crate::max_writer::{MaxWriter, max_size_error};
use crate::meta::Meta;
use crate::options::ArchiveOptions;

/// Write a gzipped tarball of `modules` into `sink`.
///
/// Entry names are relative to `base`. Nested module paths are collapsed
/// first so no subtree is walked twice. Any failure leaves `sink` holding
/// an unusable partial stream.
pub fn pack<W: Write>(
    modules: &[PathBuf],
    base: &Path,
    rules: &RuleSet,
    options: &ArchiveOptions,
    sink: W,
) -> Result<Meta> {
    let modules = etok_fs::remove_nested_paths(modules);
    let encoder = GzEncoder::new(
        MaxWriter::new(sink, options.max_size),
        Compression::default(),
    );

    let mut packer = Packer {
        base,
        rules,
        options,
        builder: tar::Builder::new(encoder),
        meta: Meta::default(),
        active: HashSet::new(),
    };
    for module in &modules {
        packer.walk(module, module)?;
    }

    let Packer { builder, mut meta, .. } = packer;
    let encoder = builder.into_inner().map_err(|e| write_error(e, base))?;
    let sink = encoder.finish().map_err(|e| write_error(e, base))?;
    meta.compressed_size = sink.tally();

    info!(
        files = meta.files.len(),
        bytes = meta.size,
        compressed = meta.compressed_size,
        "slug created"
    );
    Ok(meta)
}

struct Packer<'a, W: Write> {
    base: &'a Path,
    rules: &'a RuleSet,
    options: &'a ArchiveOptions,
    builder: tar::Builder<GzEncoder<MaxWriter<W>>>,
    meta: Meta,
    /// Canonical directories currently being walked.
    active: HashSet<PathBuf>,
}

impl<W: Write> Packer<'_, W> {
    /// Walk the real directory `src`, archiving it as if it lived at `dst`.
    fn walk(&mut self, src: &Path, dst: &Path) -> Result<()> {
        let root = fs::canonicalize(src).map_err(|e| Error::PathResolution {
            path: src.to_path_buf(),
            source: e,
        })?;
        if !self.active.insert(root.clone()) {
            debug!(path = %src.display(), "symlink cycle, directory already being archived");
            return Ok(());
        }

        for entry in WalkDir::new(src).follow_links(false).sort_by_file_name() {
            self.options.check_cancelled()?;

            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(src).to_path_buf();
                Error::Read {
                    path,
                    source: e.into(),
                }
            })?;
            let logical = match entry.path().strip_prefix(src) {
                Ok(rel) if rel.as_os_str().is_empty() => dst.to_path_buf(),
                Ok(rel) => dst.join(rel),
                Err(_) => entry.path().to_path_buf(),
            };
            self.visit(entry.path(), &logical, entry.file_type(), &root)?;
        }

        self.active.remove(&root);
        Ok(())
    }

    fn visit(
        &mut self,
        path: &Path,
        logical: &Path,
        file_type: FileType,
        root: &Path,
    ) -> Result<()> {
        if self.rules.is_excluded(logical, file_type.is_dir()) {
            return Ok(());
        }
        let Some(name) = self.archive_name(logical)? else {
            return Ok(());
        };

        if file_type.is_dir() {
            let metadata = symlink_metadata(path)?;
            self.append_dir(path, &name, &metadata)
        } else if file_type.is_file() {
            let metadata = symlink_metadata(path)?;
            self.append_file(path, &name, &metadata)
        } else if file_type.is_symlink() {
            self.append_symlink(path, logical, &name, root)
        } else {
            Err(Error::UnsupportedFileType {
                path: path.to_path_buf(),
                kind: format!("{file_type:?}"),
            })
        }
    }

    /// `logical` relative to the base; `None` for the base itself.
    fn archive_name(&self, logical: &Path) -> Result<Option<PathBuf>> {
        let rel = etok_fs::relative_to(logical, self.base);
        if rel.as_os_str().is_empty() {
            return Ok(None);
        }
        if rel.starts_with("..") {
            return Err(Error::OutsideBase {
                path: logical.to_path_buf(),
                base: self.base.to_path_buf(),
            });
        }
        Ok(Some(rel))
    }

    fn append_dir(&mut self, path: &Path, name: &Path, metadata: &Metadata) -> Result<()> {
        let mut header = header_for(EntryType::Directory, metadata);
        header.set_size(0);
        self.builder
            .append_data(&mut header, name, io::empty())
            .map_err(|e| write_error(e, path))?;

        self.meta.files.push(format!("{}/", etok_fs::to_slash(name)));
        Ok(())
    }

    /// Archive the regular file at `path`; `metadata` describes its content.
    fn append_file(&mut self, path: &Path, name: &Path, metadata: &Metadata) -> Result<()> {
        let size = metadata.len();
        let mut header = header_for(EntryType::Regular, metadata);
        header.set_size(size);

        let file = File::open(path).map_err(|e| Error::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.builder
            .append_data(&mut header, name, file.take(size))
            .map_err(|e| write_error(e, path))?;

        self.meta.files.push(etok_fs::to_slash(name));
        self.meta.size += size;
        Ok(())
    }

    fn append_symlink(
        &mut self,
        path: &Path,
        logical: &Path,
        name: &Path,
        root: &Path,
    ) -> Result<()> {
        let target = fs::canonicalize(path).map_err(|e| Error::PathResolution {
            path: path.to_path_buf(),
            source: e,
        })?;

        if target.starts_with(root) {
            let parent = path.parent().unwrap_or(path);
            let parent = fs::canonicalize(parent).map_err(|e| Error::PathResolution {
                path: parent.to_path_buf(),
                source: e,
            })?;
            let mut link = etok_fs::relative_to(&target, &parent);
            if link.as_os_str().is_empty() {
                link.push(".");
            }

            let metadata = symlink_metadata(path)?;
            let mut header = header_for(EntryType::Symlink, &metadata);
            header.set_size(0);
            self.builder
                .append_link(&mut header, name, &link)
                .map_err(|e| write_error(e, path))?;

            self.meta.files.push(etok_fs::to_slash(name));
            return Ok(());
        }

        if !self.options.dereference {
            debug!(
                path = %path.display(),
                target = %target.display(),
                "skipping symlink leaving the module"
            );
            return Ok(());
        }

        let metadata = symlink_metadata(&target)?;
        if metadata.is_dir() {
            debug!(
                path = %path.display(),
                target = %target.display(),
                "dereferencing directory symlink"
            );
            self.walk(&target, logical)
        } else if metadata.is_file() {
            debug!(
                path = %path.display(),
                target = %target.display(),
                "dereferencing file symlink"
            );
            self.append_file(&target, name, &metadata)
        } else {
            Err(Error::UnsupportedFileType {
                path: target,
                kind: format!("{:?}", metadata.file_type()),
            })
        }
    }
}

fn symlink_metadata(path: &Path) -> Result<Metadata> {
    fs::symlink_metadata(path).map_err(|e| Error::Read {
        path: path.to_path_buf(),
        source: e,
    })
}

/// A header carrying only type, mode and mtime, so equal trees pack equal.
fn header_for(kind: EntryType, metadata: &Metadata) -> Header {
    let mut header = Header::new_gnu();
    header.set_entry_type(kind);
    header.set_mode(etok_fs::mode_of(metadata));
    header.set_uid(0);
    header.set_gid(0);
    header.set_mtime(mtime(metadata));
    header
}

fn mtime(metadata: &Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_secs())
}

fn write_error(err: io::Error, path: &Path) -> Error {
    match max_size_error(&err) {
        Some(max) => Error::SizeExceeded { limit: max.0 },
        None => Error::Write {
            path: path.to_path_buf(),
            source: err,
        },
    }
}

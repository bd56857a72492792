use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::ignore::RuleSet;
use crate::meta::Meta;
use crate::modules;
use crate::options::ArchiveOptions;
use crate::pack;
use crate::payload::{Payload, PayloadOptions};

/// A root module, the local modules it calls, and where to pack them from.
///
/// ```no_run
/// use etok_archive::{Archive, ArchiveOptions};
///
/// let mut archive = Archive::new("infra/envs/prod", "infra", ArchiveOptions::default())?;
/// archive.walk()?;
///
/// let mut slug = Vec::new();
/// let meta = archive.pack(&mut slug)?;
/// println!("{} files, {} bytes compressed", meta.files.len(), meta.compressed_size);
/// # Ok::<(), etok_archive::Error>(())
/// ```
#[derive(Clone)]
pub struct Archive {
    root: PathBuf,
    base: PathBuf,
    modules: Vec<PathBuf>,
    options: ArchiveOptions,
}

impl Archive {
    /// `root` is the module to package; archive entry names are relative
    /// to `base`, typically the repository root.
    pub fn new(
        root: impl AsRef<Path>,
        base: impl AsRef<Path>,
        options: ArchiveOptions,
    ) -> Result<Self> {
        let root = etok_fs::absolute(root)?;
        let base = etok_fs::absolute(base)?;
        Ok(Self {
            modules: vec![root.clone()],
            root,
            base,
            options,
        })
    }

    /// Add every local module reachable from the root.
    pub fn walk(&mut self) -> Result<()> {
        let found = modules::resolve(&self.root, self.options.parser.as_ref())?;
        debug!(root = %self.root.display(), modules = found.len(), "resolved local modules");
        self.modules.extend(found);
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// The root first, then any modules found by [`Archive::walk`].
    pub fn modules(&self) -> &[PathBuf] {
        &self.modules
    }

    /// Where the root module sits inside the extracted slug.
    pub fn root_path(&self) -> Result<PathBuf> {
        let rel = etok_fs::relative_to(&self.root, &self.base);
        if rel.starts_with("..") {
            return Err(Error::OutsideBase {
                path: self.root.clone(),
                base: self.base.clone(),
            });
        }
        Ok(rel)
    }

    /// Ignore rules for this job, read fresh on every call.
    pub fn rules(&self) -> Result<RuleSet> {
        RuleSet::discover(&self.root, &self.options.ignore_file_name)
    }

    pub fn pack<W: Write>(&self, sink: W) -> Result<Meta> {
        let rules = self.rules()?;
        pack::pack(&self.modules, &self.base, &rules, &self.options, sink)
    }

    pub fn pack_to_vec(&self) -> Result<(Vec<u8>, Meta)> {
        let mut slug = Vec::new();
        let meta = self.pack(&mut slug)?;
        Ok((slug, meta))
    }

    /// Pack and wrap the slug in a record ready for the cluster.
    pub fn payload(
        &self,
        name: impl Into<String>,
        namespace: impl Into<String>,
        options: &PayloadOptions,
    ) -> Result<Payload> {
        let (slug, _) = self.pack_to_vec()?;
        Payload::new(name, namespace, slug, options)
    }
}

//! Discovery of local module calls.
//!
//! Only `./` and `../` sources are followed. Registry, VCS and URL sources
//! are vendored into `.terraform/modules` by `terraform init`, which the
//! default ignore rules keep.

mod scanner;

pub use scanner::{TfScanner, scan_module_sources};

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;

/// Source of the module-call addresses declared in a directory.
pub trait ModuleCallParser: Send + Sync {
    /// Every `source` address declared in `dir`, in declaration order.
    fn module_sources(&self, dir: &Path) -> Result<Vec<String>>;
}

/// A filesystem path source, as opposed to a registry or VCS address.
pub fn is_local_source(source: &str) -> bool {
    source.starts_with("./") || source.starts_with("../")
}

/// Every local module reachable from `root`, depth first in call order.
///
/// `root` itself is not part of the result. Each module is listed and
/// descended into once, so reference cycles terminate.
pub fn resolve(root: &Path, parser: &dyn ModuleCallParser) -> Result<Vec<PathBuf>> {
    let root = etok_fs::absolute(root)?;
    let mut visited = HashSet::from([root.clone()]);
    let mut found = Vec::new();
    walk(&root, parser, &mut visited, &mut found)?;
    Ok(found)
}

fn walk(
    dir: &Path,
    parser: &dyn ModuleCallParser,
    visited: &mut HashSet<PathBuf>,
    found: &mut Vec<PathBuf>,
) -> Result<()> {
    for source in parser.module_sources(dir)? {
        if !is_local_source(&source) {
            continue;
        }

        let module = etok_fs::normalize(&dir.join(&source));
        if !visited.insert(module.clone()) {
            debug!(module = %module.display(), "local module already resolved");
            continue;
        }

        debug!(module = %module.display(), "adding local module to archive");
        found.push(module.clone());
        walk(&module, parser, visited, found)?;
    }
    Ok(())
}

use std::path::Path;

use crate::{Error, Result};

/// Create `link` pointing at `target`, storing `target` verbatim.
pub fn create_symlink(target: impl AsRef<Path>, link: impl AsRef<Path>) -> Result<()> {
    let target = target.as_ref();
    let link = link.as_ref();

    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link).map_err(|e| Error::Symlink {
            target: target.to_path_buf(),
            link: link.to_path_buf(),
            source: e,
        })
    }

    #[cfg(windows)]
    {
        let resolved = link
            .parent()
            .map(|p| p.join(target))
            .unwrap_or_else(|| target.to_path_buf());
        let created = if resolved.is_dir() {
            std::os::windows::fs::symlink_dir(target, link)
        } else {
            std::os::windows::fs::symlink_file(target, link)
        };
        created.map_err(|e| Error::Symlink {
            target: target.to_path_buf(),
            link: link.to_path_buf(),
            source: e,
        })
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = (target, link);
        Err(Error::SymlinkNotSupported)
    }
}

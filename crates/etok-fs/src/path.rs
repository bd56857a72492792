//! Lexical path arithmetic.
//!
//! Nothing here touches the filesystem except [`absolute`], which may need
//! the current working directory. Symlinks are never resolved.

use std::path::{Component, Path, PathBuf};

use crate::{Error, Result};

/// Make `path` absolute against the working directory and clean it.
pub fn absolute(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    if path.is_absolute() {
        return Ok(normalize(path));
    }
    let cwd = std::env::current_dir().map_err(|e| Error::Absolute {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(normalize(&cwd.join(path)))
}

/// Resolve `.` and `..` components without consulting the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();

    for component in path.components() {
        match component {
            Component::ParentDir => match result.components().next_back() {
                Some(Component::Normal(_)) => {
                    result.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => result.push(".."),
            },
            Component::Normal(part) => result.push(part),
            Component::RootDir => result.push(Component::RootDir.as_os_str()),
            Component::Prefix(prefix) => result.push(prefix.as_os_str()),
            Component::CurDir => {}
        }
    }

    result
}

/// The path that leads from `base` to `path`.
///
/// Both are expected to be normalized and either both absolute or both
/// relative. Equal inputs yield an empty path; a `path` outside `base`
/// starts with `..` components.
pub fn relative_to(path: &Path, base: &Path) -> PathBuf {
    let path: Vec<Component<'_>> = path.components().collect();
    let base: Vec<Component<'_>> = base.components().collect();

    let common = path
        .iter()
        .zip(base.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for _ in common..base.len() {
        rel.push("..");
    }
    for component in &path[common..] {
        rel.push(component.as_os_str());
    }
    rel
}

/// Whether `child` lies strictly below `parent`.
pub fn is_nested(child: &Path, parent: &Path) -> bool {
    child != parent && child.starts_with(parent)
}

/// Collapse `paths` into a set where no element is nested in another.
///
/// Order follows first occurrence. A candidate below an accepted path is
/// dropped; accepted paths below a later candidate are replaced by it.
/// Repeats of an accepted path are dropped.
pub fn remove_nested_paths<P: AsRef<Path>>(paths: &[P]) -> Vec<PathBuf> {
    let mut unnested: Vec<PathBuf> = Vec::with_capacity(paths.len());

    for candidate in paths {
        let candidate = candidate.as_ref();
        if unnested.iter().any(|p| candidate.starts_with(p)) {
            continue;
        }
        unnested.retain(|p| !p.starts_with(candidate));
        unnested.push(candidate.to_path_buf());
    }

    unnested
}

/// Join the components of a relative path with `/`, whatever the platform.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_resolves_dots() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), Path::new("/a/c"));
        assert_eq!(normalize(Path::new("a/../../b")), Path::new("../b"));
        assert_eq!(normalize(Path::new("/../a")), Path::new("/a"));
        assert_eq!(normalize(Path::new("../../a")), Path::new("../../a"));
    }

    #[test]
    fn absolute_keeps_absolute_input() {
        assert_eq!(absolute("/x/y/../z").unwrap(), Path::new("/x/z"));
    }

    #[test]
    fn absolute_joins_relative_input() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(absolute("sub").unwrap(), normalize(&cwd.join("sub")));
    }

    #[test]
    fn relative_below_base() {
        assert_eq!(
            relative_to(Path::new("/r/m0/main.tf"), Path::new("/r")),
            Path::new("m0/main.tf")
        );
    }

    #[test]
    fn relative_equal_is_empty() {
        assert_eq!(relative_to(Path::new("/r"), Path::new("/r")), PathBuf::new());
    }

    #[test]
    fn relative_outside_base() {
        assert_eq!(
            relative_to(Path::new("/a/b"), Path::new("/a/c/d")),
            Path::new("../../b")
        );
    }

    #[test]
    fn nested_is_component_wise() {
        assert!(is_nested(Path::new("/r/mod/x"), Path::new("/r/mod")));
        assert!(!is_nested(Path::new("/r/module"), Path::new("/r/mod")));
        assert!(!is_nested(Path::new("/r/mod"), Path::new("/r/mod")));
    }

    #[test]
    fn remove_nested_drops_descendants() {
        let got = remove_nested_paths(&["/r/mod", "/r/mod/inner/mods/m2", "/outer/mods/m1"]);
        assert_eq!(
            got,
            vec![PathBuf::from("/r/mod"), PathBuf::from("/outer/mods/m1")]
        );
    }

    #[test]
    fn remove_nested_replaces_with_ancestor() {
        let got = remove_nested_paths(&["/r/a/b", "/s", "/r/a/c", "/r"]);
        assert_eq!(got, vec![PathBuf::from("/s"), PathBuf::from("/r")]);
    }

    #[test]
    fn remove_nested_drops_repeats() {
        let got = remove_nested_paths(&["/r/m1", "/r/m1", "/r/m2"]);
        assert_eq!(got, vec![PathBuf::from("/r/m1"), PathBuf::from("/r/m2")]);
    }

    #[test]
    fn remove_nested_leaves_no_nesting() {
        let input = ["/a", "/a/b", "/c/d", "/c", "/e/f/g", "/e/f", "/e/fg", "/a/b/c"];
        let got = remove_nested_paths(&input);
        for (i, a) in got.iter().enumerate() {
            for (j, b) in got.iter().enumerate() {
                if i != j {
                    assert!(
                        !a.starts_with(b),
                        "{} nested in {}",
                        a.display(),
                        b.display()
                    );
                }
            }
        }
        assert_eq!(
            got,
            vec![
                PathBuf::from("/a"),
                PathBuf::from("/c"),
                PathBuf::from("/e/f"),
                PathBuf::from("/e/fg"),
            ]
        );
    }

    #[test]
    fn to_slash_joins_components() {
        assert_eq!(to_slash(Path::new("a/b/c.txt")), "a/b/c.txt");
        assert_eq!(to_slash(Path::new("../x")), "../x");
        assert_eq!(to_slash(Path::new("")), "");
    }
}

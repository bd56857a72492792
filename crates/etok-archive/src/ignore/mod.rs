//! `.terraformignore` rule sets.
//!
//! Rules are evaluated in order and the last matching rule decides, so a
//! `!` rule late in a file can carve an exception out of a broad exclusion.
//! Every rule set starts with [`DEFAULT_RULES`].

mod pattern;

pub use pattern::Rule;

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};

use crate::error::{Error, Result};

/// Rules applied before any file rules, as `(pattern, negated)`.
///
/// As they would appear in an ignore file:
///
/// ```text
/// .git/
/// .terraform/
/// !.terraform/modules/
/// ```
pub const DEFAULT_RULES: [(&str, bool); 3] = [
    ("**/.git/**", false),
    ("**/.terraform/**", false),
    ("**/.terraform/modules/**", true),
];

/// Ordered rules plus the directory they are relative to.
#[derive(Clone, Debug)]
pub struct RuleSet {
    base: PathBuf,
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Only the default rules, relative to `base`.
    pub fn defaults(base: impl Into<PathBuf>) -> Result<Self> {
        let rules = DEFAULT_RULES
            .iter()
            .map(|(pattern, negated)| Rule::new(*pattern, *negated))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            base: base.into(),
            rules,
        })
    }

    /// Defaults followed by the rules read from `reader`.
    ///
    /// A read failure is reported as [`Error::IgnoreFileRead`], which
    /// [`RuleSet::discover`] recovers from; pattern failures are fatal.
    pub fn from_reader<R: BufRead>(reader: R, base: impl Into<PathBuf>) -> Result<Self> {
        let mut set = Self::defaults(base)?;
        for line in reader.lines() {
            let line = line.map_err(|e| Error::IgnoreFileRead {
                path: set.base.clone(),
                source: e,
            })?;
            if let Some(rule) = Rule::parse(&line)? {
                set.rules.push(rule);
            }
        }
        Ok(set)
    }

    /// Search `start` and then each ancestor for `file_name`.
    ///
    /// The first file found wins and its directory becomes the base. Without
    /// one, or when it cannot be read, the defaults apply relative to `start`.
    pub fn discover(start: &Path, file_name: &str) -> Result<Self> {
        let mut dir = Some(start);
        while let Some(current) = dir {
            let candidate = current.join(file_name);
            let read = File::open(&candidate)
                .map_err(|e| Error::IgnoreFileRead {
                    path: candidate.clone(),
                    source: e,
                })
                .and_then(|file| Self::from_reader(BufReader::new(file), current));

            match read {
                Ok(set) => {
                    debug!(
                        path = %candidate.display(),
                        rules = set.rules.len(),
                        "found ignore file"
                    );
                    return Ok(set);
                }
                Err(Error::IgnoreFileRead { source, .. })
                    if source.kind() == io::ErrorKind::NotFound =>
                {
                    dir = current.parent();
                }
                Err(Error::IgnoreFileRead { source, .. }) => {
                    warn!(
                        path = %candidate.display(),
                        error = %source,
                        "error reading ignore file, default exclusions will apply"
                    );
                    return Self::defaults(start);
                }
                Err(e) => return Err(e),
            }
        }

        debug!(path = %start.display(), "ignore file not found, default exclusions apply");
        Self::defaults(start)
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Whether `path` (absolute, normalized) should be left out.
    ///
    /// The base directory itself is always excluded. Directories are tested
    /// with a trailing `/` so directory-only rules apply to them.
    pub fn is_excluded(&self, path: &Path, is_dir: bool) -> bool {
        let rel = etok_fs::relative_to(path, &self.base);
        let mut candidate = etok_fs::to_slash(&rel);
        if candidate.is_empty() {
            return true;
        }
        if is_dir {
            candidate.push('/');
        }

        let mut excluded = false;
        for rule in &self.rules {
            if rule.matches(&candidate) {
                excluded = !rule.is_negated();
            }
        }

        if excluded {
            trace!(path = %candidate, "skipping excluded path");
        }
        excluded
    }

    pub fn is_included(&self, path: &Path, is_dir: bool) -> bool {
        !self.is_excluded(path, is_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn from_lines(lines: &str) -> RuleSet {
        RuleSet::from_reader(Cursor::new(lines.to_owned()), "/repo").unwrap()
    }

    #[test]
    fn defaults_exclude_vcs_and_cache() {
        let set = RuleSet::defaults("/repo").unwrap();
        assert_eq!(set.rules().len(), 3);
        assert!(set.is_excluded(Path::new("/repo/.git/HEAD"), false));
        assert!(set.is_excluded(Path::new("/repo/.git"), true));
        assert!(set.is_excluded(Path::new("/repo/m0/.terraform/x"), false));
        assert!(set.is_included(Path::new("/repo/main.tf"), false));
    }

    #[test]
    fn defaults_reinclude_vendored_modules() {
        let set = RuleSet::defaults("/repo").unwrap();
        assert!(set.is_excluded(Path::new("/repo/.terraform"), true));
        assert!(set.is_included(Path::new("/repo/.terraform/modules"), true));
        assert!(set.is_included(Path::new("/repo/.terraform/modules/m1/readme"), false));
    }

    #[test]
    fn base_itself_is_excluded() {
        let set = RuleSet::defaults("/repo").unwrap();
        assert!(set.is_excluded(Path::new("/repo"), true));
    }

    #[test]
    fn file_rules_follow_defaults() {
        let set = from_lines("# comment\n\n*.txt\n!keep.txt\n");
        assert_eq!(set.rules().len(), 5);
        assert_eq!(set.rules()[3].pattern(), "**/*.txt");
    }

    #[test]
    fn last_match_wins() {
        let set = from_lines("*.txt\n!keep.txt\n");
        assert!(set.is_included(Path::new("/repo/keep.txt"), false));
        assert!(set.is_excluded(Path::new("/repo/other.txt"), false));
        assert!(set.is_excluded(Path::new("/repo/sub/notes.txt"), false));
        assert!(set.is_included(Path::new("/repo/main.tf"), false));
    }

    #[test]
    fn later_exclusion_overrides_negation() {
        let set = from_lines("!keep.txt\n*.txt\n");
        assert!(set.is_excluded(Path::new("/repo/keep.txt"), false));
    }

    #[test]
    fn directory_rule_applies_to_directory_and_contents() {
        let set = from_lines("sub/\n");
        assert!(set.is_excluded(Path::new("/repo/m0/sub"), true));
        assert!(set.is_excluded(Path::new("/repo/m0/sub/zip.txt"), false));
        assert!(set.is_included(Path::new("/repo/m0/sub"), false));
    }

    #[test]
    fn bad_pattern_is_fatal() {
        let err = RuleSet::from_reader(Cursor::new("[oops\n"), "/repo").unwrap_err();
        assert!(matches!(err, Error::Pattern { .. }));
    }

    #[test]
    fn sets_are_independent() {
        let mut a = RuleSet::defaults("/a").unwrap();
        a.rules.push(Rule::parse("*.tf").unwrap().unwrap());
        let b = RuleSet::defaults("/b").unwrap();
        assert_eq!(a.rules().len(), 4);
        assert_eq!(b.rules().len(), 3);
    }

    #[test]
    fn discover_without_file_uses_defaults_at_start() {
        let dir = tempfile::tempdir().unwrap();
        let set = RuleSet::discover(dir.path(), ".etok-test-absent-ignore").unwrap();
        assert_eq!(set.rules().len(), 3);
        assert_eq!(set.base(), dir.path());
    }

    #[test]
    fn discover_finds_file_in_ancestor() {
        let dir = tempfile::tempdir().unwrap();
        let module = dir.path().join("m0/sub");
        std::fs::create_dir_all(&module).unwrap();
        std::fs::write(dir.path().join(".terraformignore"), "*.txt\n/bar\n").unwrap();

        let set = RuleSet::discover(&module, ".terraformignore").unwrap();
        assert_eq!(set.rules().len(), 5);
        assert_eq!(set.base(), dir.path());
    }

    #[test]
    fn discover_prefers_nearest_file() {
        let dir = tempfile::tempdir().unwrap();
        let module = dir.path().join("m0");
        std::fs::create_dir_all(&module).unwrap();
        std::fs::write(dir.path().join(".terraformignore"), "a\nb\n").unwrap();
        std::fs::write(module.join(".terraformignore"), "c\n").unwrap();

        let set = RuleSet::discover(&module, ".terraformignore").unwrap();
        assert_eq!(set.rules().len(), 4);
        assert_eq!(set.base(), module);
    }

    #[test]
    fn discover_unreadable_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        // a directory where the file should be cannot be read as lines
        std::fs::create_dir(dir.path().join(".terraformignore")).unwrap();

        let set = RuleSet::discover(dir.path(), ".terraformignore").unwrap();
        assert_eq!(set.rules().len(), 3);
        assert_eq!(set.base(), dir.path());
    }
}

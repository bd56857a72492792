use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};
use crate::modules::{ModuleCallParser, TfScanner};

/// Ceiling on the compressed slug.
///
/// A ConfigMap (and etcd behind it) accepts at most 1 MiB of payload.
pub const MAX_CONFIG_SIZE: u64 = 1024 * 1024;

/// Name of the ignore file searched for above the root module.
pub const DEFAULT_IGNORE_FILE: &str = ".terraformignore";

/// Per-job configuration for [`Archive`](crate::Archive).
#[derive(Clone)]
pub struct ArchiveOptions {
    /// Compressed-size ceiling in bytes; `0` disables the check.
    pub max_size: u64,
    /// Copy in the targets of symlinks that leave the module being walked.
    pub dereference: bool,
    pub ignore_file_name: String,
    pub cancel: Option<Arc<AtomicBool>>,
    pub parser: Arc<dyn ModuleCallParser>,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            max_size: MAX_CONFIG_SIZE,
            dereference: true,
            ignore_file_name: DEFAULT_IGNORE_FILE.to_owned(),
            cancel: None,
            parser: Arc::new(TfScanner),
        }
    }
}

impl ArchiveOptions {
    pub fn max_size(mut self, bytes: u64) -> Self {
        self.max_size = bytes;
        self
    }

    pub fn dereference(mut self, enabled: bool) -> Self {
        self.dereference = enabled;
        self
    }

    pub fn ignore_file_name(mut self, name: impl Into<String>) -> Self {
        self.ignore_file_name = name.into();
        self
    }

    /// Stop at the next visited entry once `flag` is raised.
    pub fn cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn parser(mut self, parser: Arc<dyn ModuleCallParser>) -> Self {
        self.parser = parser;
        self
    }

    pub(crate) fn check_cancelled(&self) -> Result<()> {
        check_cancelled(self.cancel.as_deref())
    }
}

pub(crate) fn check_cancelled(flag: Option<&AtomicBool>) -> Result<()> {
    match flag {
        Some(flag) if flag.load(Ordering::Relaxed) => Err(Error::Cancelled),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_options_default() {
        let options = ArchiveOptions::default();
        assert_eq!(options.max_size, MAX_CONFIG_SIZE);
        assert!(options.dereference);
        assert_eq!(options.ignore_file_name, ".terraformignore");
        assert!(options.cancel.is_none());
    }

    #[test]
    fn archive_options_builder_pattern() {
        let options = ArchiveOptions::default()
            .max_size(0)
            .dereference(false)
            .ignore_file_name(".slugignore");

        assert_eq!(options.max_size, 0);
        assert!(!options.dereference);
        assert_eq!(options.ignore_file_name, ".slugignore");
    }

    #[test]
    fn cancel_flag_is_observed() {
        let flag = Arc::new(AtomicBool::new(false));
        let options = ArchiveOptions::default().cancel(flag.clone());
        assert!(options.check_cancelled().is_ok());

        flag.store(true, Ordering::Relaxed);
        assert!(matches!(options.check_cancelled(), Err(Error::Cancelled)));
    }
}

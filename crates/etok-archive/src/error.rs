use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to resolve path '{path}': {source}")]
    PathResolution { path: PathBuf, source: io::Error },

    #[error("'{path}' is outside the archive base directory '{base}'")]
    OutsideBase { path: PathBuf, base: PathBuf },

    #[error("failed to read module '{path}': {source}")]
    ModuleRead { path: PathBuf, source: io::Error },

    #[error("failed to parse module calls in '{module}': {message}")]
    ModuleParse { module: PathBuf, message: String },

    #[error("failed to read ignore file '{path}': {source}")]
    IgnoreFileRead { path: PathBuf, source: io::Error },

    #[error("invalid ignore pattern '{pattern}': {source}")]
    Pattern { pattern: String, source: regex::Error },

    #[error("max config size exceeded ({limit} bytes)")]
    SizeExceeded { limit: u64 },

    #[error("failed writing '{path}' to archive: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("failed reading '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("unexpected file type for '{path}': {kind}")]
    UnsupportedFileType { path: PathBuf, kind: String },

    #[error("failed creating '{path}': unsupported entry type {kind}")]
    UnsupportedEntryType { path: PathBuf, kind: String },

    #[error("invalid archive entry '{path}': {reason}")]
    InvalidEntry { path: PathBuf, reason: String },

    #[error("failed to read archive stream: {source}")]
    Decode { source: io::Error },

    #[error("failed to extract '{path}': {source}")]
    Extract { path: PathBuf, source: io::Error },

    #[error("failed to create directory '{path}': {source}")]
    DirectoryCreation { path: PathBuf, source: io::Error },

    #[error("archive operation cancelled")]
    Cancelled,

    #[error("payload of {size} bytes exceeds the record limit of {limit} bytes")]
    PayloadTooLarge { size: u64, limit: u64 },

    #[error("failed to render payload manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error(transparent)]
    Fs(#[from] etok_fs::Error),
}

impl Error {
    /// Whether the compressed output outgrew the configured ceiling.
    pub fn is_size_exceeded(&self) -> bool {
        matches!(self, Self::SizeExceeded { .. })
    }

    /// The configured ceiling carried by a size error.
    pub fn size_limit(&self) -> Option<u64> {
        match self {
            Self::SizeExceeded { limit } => Some(*limit),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

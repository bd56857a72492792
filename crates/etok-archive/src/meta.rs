use std::path::PathBuf;

/// What went into a slug.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Meta {
    /// Archived entry names in write order; directories end in `/`.
    pub files: Vec<String>,
    /// Uncompressed bytes of all file bodies.
    pub size: u64,
    /// Bytes of the finished gzip stream.
    pub compressed_size: u64,
}

/// What came out of a slug.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Unpacked {
    /// Destination paths in archive order.
    pub entries: Vec<PathBuf>,
    /// Bytes written to regular files.
    pub total_bytes: u64,
}

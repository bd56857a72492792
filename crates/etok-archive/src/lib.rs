//! Size-bounded, reproducible slugs of a terraform root module and every
//! local module it calls.
//!
//! # Architecture
//!
//! - `ignore/` - `.terraformignore` discovery and rule matching
//! - `modules/` - local module-call resolution
//! - `max_writer.rs` - compressed-size ceiling
//! - `pack.rs` - module trees to tar.gz
//! - `extract.rs` - tar.gz back to a directory
//! - `archive.rs` - the per-job [`Archive`]
//! - `payload.rs` - slug records for the cluster

pub use archive::Archive;
pub use error::{Error, Result};
pub use extract::{extract, extract_with};
pub use ignore::{DEFAULT_RULES, Rule, RuleSet};
pub use max_writer::{MaxSizeError, MaxWriter};
pub use meta::{Meta, Unpacked};
pub use modules::{ModuleCallParser, TfScanner, is_local_source};
pub use options::{ArchiveOptions, DEFAULT_IGNORE_FILE, MAX_CONFIG_SIZE};
pub use pack::pack;
pub use payload::{DEFAULT_PAYLOAD_KEY, Payload, PayloadOptions};

mod archive;
mod error;
pub mod extract;
pub mod ignore;
pub mod max_writer;
mod meta;
pub mod modules;
pub mod options;
pub mod pack;
pub mod payload;

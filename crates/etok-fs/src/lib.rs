//! Filesystem primitives shared by the etok archive crates.
//!
//! - `path` - lexical path arithmetic (absolute, relative, nesting)
//! - `permissions` - unix mode bits, with a best-effort mapping elsewhere
//! - `symlink` - link creation

mod error;
pub mod path;
pub mod permissions;
pub mod symlink;

pub use error::{Error, Result};
pub use path::{absolute, is_nested, normalize, relative_to, remove_nested_paths, to_slash};
pub use permissions::{WRITABLE_MODE, force_writable, mode_of, set_mode};
pub use symlink::create_symlink;

//! Zip bundling of document trees.
//!
//! A bundle is a zip archive with one deflated record per file, named by its
//! path relative to the bundled root with `/` separators. Directories get no
//! record of their own when a tree is packed; they are implied by file names.
//!
//! - [`pack`] / [`unpack`] work on in-memory [`ArchiveEntry`] lists and keep
//!   names verbatim.
//! - [`pack_dir`] / [`extract`] work on the file system. Extraction refuses
//!   names that would land outside the destination.
//!
//! Entry contents are streamed through a fixed 4 KiB buffer.

mod codec;
mod entry;
mod error;
mod fs;

pub use codec::{BUFFER_SIZE, pack, unpack};
pub use entry::ArchiveEntry;
pub use error::{ArchiveError, ArchiveResult};
pub use fs::{collect_tree, extract, pack_dir};

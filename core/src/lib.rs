//! A fixed-size, single-image storage engine for a small user-space
//! filesystem: bitmap allocators, an inode table with direct and indirect
//! block addressing, and packed directory pages, exposed through
//! [`Volume`] as a path-addressed API that a FUSE bridge (or anything
//! else) can drive.

mod bitmap;
mod dir;
mod error;
mod fileio;
mod inode;
mod layout;
mod ops;
mod path;
mod record;
mod volume;

pub use error::{FsError, FsResult};
pub use ops::Stat;
pub use path::ROOT_INODE;
pub use record::{S_IFDIR, S_IFMT, S_IFREG};
pub use volume::{Volume, DEFAULT_PAGE_COUNT};

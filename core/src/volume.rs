//! The public API surface: a single fixed-size image file exposed as a
//! small path-addressed filesystem.
//!
//! [`Volume`] owns the memory-mapped [`Pages`] backing store and performs
//! idempotent on-open initialization. It carries no internal locking —
//! serializing concurrent access (if any) is the caller's responsibility,
//! the same way `mount`'s FUSE bridge wraps its `Volume` in a `Mutex`.

use std::path::Path;

use log::info;

use crate::dir;
use crate::error::FsResult;
use crate::fileio;
use crate::inode;
use crate::layout::{Pages, DATA_REGION_START_PAGE, INODE_TABLE_PAGES, INODE_TABLE_START_PAGE};
use crate::ops::{self, Stat};
use crate::path::ROOT_INODE;
use crate::record::S_IFDIR;

/// Default page count for a freshly created image: enough for the
/// bookkeeping pages plus a modest data region.
pub const DEFAULT_PAGE_COUNT: usize = DATA_REGION_START_PAGE + 4096;

pub struct Volume {
    pages: Pages,
}

impl Volume {
    /// Opens (creating if necessary) the image at `image_path` and ensures
    /// it is initialized: zeroed bitmaps, a root inode, and the root
    /// directory's `.`/`..` entries. Initialization is idempotent — a
    /// previously-initialized image is detected by inode 0 already being
    /// marked in-use and is left untouched.
    pub fn open(image_path: &Path) -> FsResult<Self> {
        let pages = Pages::open(image_path, DEFAULT_PAGE_COUNT)?;
        let mut volume = Self { pages };
        volume.ensure_initialized()?;
        Ok(volume)
    }

    fn ensure_initialized(&mut self) -> FsResult<()> {
        let root = inode::read_inode(&self.pages, ROOT_INODE);
        if !root.is_free() {
            return Ok(());
        }

        info!(
            "initializing image: {} inode-table pages starting at page {}",
            INODE_TABLE_PAGES, INODE_TABLE_START_PAGE
        );

        let reserved = inode::reserve_inode(&mut self.pages)?;
        debug_assert_eq!(reserved, ROOT_INODE);
        inode::configure_inode(&mut self.pages, ROOT_INODE, S_IFDIR | 0o755, 0, 0);

        let root_block = inode::reserve_data_block(&mut self.pages)?;
        debug_assert_eq!(root_block, 0, "root directory must own data block 0");
        inode::add_block(&mut self.pages, ROOT_INODE, root_block)?;

        dir::add_entry(&mut self.pages, ROOT_INODE, ".", ROOT_INODE)?;
        dir::add_entry(&mut self.pages, ROOT_INODE, "..", ROOT_INODE)?;

        let mut record = inode::read_inode(&self.pages, ROOT_INODE);
        record.num_hard_links = 2;
        inode::write_inode(&mut self.pages, ROOT_INODE, &record);

        Ok(())
    }

    pub fn stat(&self, path: &str) -> FsResult<Stat> {
        ops::get_stat(&self.pages, path)
    }

    pub fn list(&self, path: &str) -> FsResult<Vec<String>> {
        ops::list(&self.pages, path)
    }

    pub fn create_file(&mut self, path: &str, mode: u32) -> FsResult<usize> {
        self.create_file_as(path, mode, 0, 0)
    }

    /// Like [`Self::create_file`], but with the caller's effective ids
    /// (as the `mount` bridge knows them from the FUSE request) stamped
    /// onto the new inode instead of the default `0`/`0`.
    pub fn create_file_as(&mut self, path: &str, mode: u32, uid: u32, gid: u32) -> FsResult<usize> {
        ops::create_inode_at_path(&mut self.pages, path, mode, uid, gid)
    }

    pub fn create_dir(&mut self, path: &str) -> FsResult<usize> {
        self.create_dir_as(path, 0, 0)
    }

    pub fn create_dir_as(&mut self, path: &str, uid: u32, gid: u32) -> FsResult<usize> {
        ops::create_dir(&mut self.pages, path, uid, gid)
    }

    pub fn link(&mut self, src: &str, dst: &str) -> FsResult<()> {
        ops::link(&mut self.pages, src, dst)
    }

    pub fn unlink(&mut self, path: &str) -> FsResult<()> {
        ops::unlink(&mut self.pages, path)
    }

    pub fn rename(&mut self, from: &str, to: &str) -> FsResult<()> {
        ops::rename(&mut self.pages, from, to)
    }

    pub fn remove_dir(&mut self, path: &str) -> FsResult<()> {
        ops::remove_dir(&mut self.pages, path)
    }

    pub fn set_time(&mut self, path: &str, atime: i64, mtime: i64) -> FsResult<()> {
        ops::set_time(&mut self.pages, path, atime, mtime)
    }

    pub fn set_mode(&mut self, path: &str, mode: u32) -> FsResult<()> {
        ops::set_mode(&mut self.pages, path, mode)
    }

    pub fn read(&self, path: &str, buf: &mut [u8], offset: usize) -> FsResult<usize> {
        let i = crate::path::resolve(&self.pages, path)?;
        fileio::read_at(&self.pages, i, buf, offset)
    }

    pub fn write(&mut self, path: &str, buf: &[u8], offset: usize) -> FsResult<usize> {
        let i = crate::path::resolve(&self.pages, path)?;
        fileio::write_at(&mut self.pages, i, buf, offset)
    }

    pub fn truncate(&mut self, path: &str, new_size: usize) -> FsResult<()> {
        let i = crate::path::resolve(&self.pages, path)?;
        fileio::truncate(&mut self.pages, i, new_size)
    }

    pub fn flush(&self) -> FsResult<()> {
        self.pages.flush()
    }
}

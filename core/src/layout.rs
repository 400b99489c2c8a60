//! Image layout: page geometry and the page-backed I/O the rest of the
//! engine builds on.
//!
//! Disk layout:
//! `[ data bitmap | inode bitmap | inode table (18 pages) | data blocks ]`
//!
//! This module owns the concrete realization of the "pages" collaborator
//! the distilled design treats as external: a fixed-size file mapped with
//! `memmap2`, divided into 4 KiB pages. Everything above this module only
//! ever asks for `page(i)` and never opens the file itself.

use std::fs::OpenOptions;
use std::path::Path;

use memmap2::MmapMut;
use zerocopy::{AsBytes, FromBytes};

use crate::error::{FsError, FsResult};
use crate::record::{DirPage, InodeRecord};

pub const PAGE_SIZE: usize = 4096;

pub const DATA_BITMAP_PAGE: usize = 0;
pub const INODE_BITMAP_PAGE: usize = 1;
pub const INODE_TABLE_START_PAGE: usize = 2;
pub const INODE_TABLE_PAGES: usize = 18;
pub const DATA_REGION_START_PAGE: usize = INODE_TABLE_START_PAGE + INODE_TABLE_PAGES;

/// Inode records packed per inode-table page.
pub const INODES_PER_PAGE: usize = PAGE_SIZE / InodeRecord::SIZE;

/// Total number of inodes addressable by this layout.
pub const INODE_COUNT: usize = INODES_PER_PAGE * INODE_TABLE_PAGES;

/// Bits available in the single-page data bitmap: the hard ceiling on how
/// many data blocks this image can ever address.
pub const MAX_DATA_BLOCKS: usize = PAGE_SIZE * 8;

/// Number of `i32` slots an indirect block can hold.
pub const INDIRECT_SLOTS: usize = PAGE_SIZE / core::mem::size_of::<i32>() - 1;

/// A fixed-size file mapped into memory and divided into [`PAGE_SIZE`]
/// pages. `page`/`page_mut` are the only way the rest of the engine touches
/// image bytes.
pub struct Pages {
    mmap: MmapMut,
}

impl Pages {
    /// Maps `path`, creating it and extending it to `page_count` pages if it
    /// doesn't already have at least that many.
    pub fn open(path: &Path, page_count: usize) -> FsResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let min_len = (page_count * PAGE_SIZE) as u64;
        if file.metadata()?.len() < min_len {
            file.set_len(min_len)?;
        }
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { mmap })
    }

    pub fn page_count(&self) -> usize {
        self.mmap.len() / PAGE_SIZE
    }

    pub fn page(&self, i: usize) -> &[u8] {
        &self.mmap[i * PAGE_SIZE..(i + 1) * PAGE_SIZE]
    }

    pub fn page_mut(&mut self, i: usize) -> &mut [u8] {
        &mut self.mmap[i * PAGE_SIZE..(i + 1) * PAGE_SIZE]
    }

    /// A byte range that may span several pages — used by file I/O to copy
    /// a contiguous run of data blocks in one slice operation.
    pub fn bytes(&self, offset: usize, len: usize) -> &[u8] {
        &self.mmap[offset..offset + len]
    }

    pub fn bytes_mut(&mut self, offset: usize, len: usize) -> &mut [u8] {
        &mut self.mmap[offset..offset + len]
    }

    /// Flushes the mapping to the backing file. Not required for
    /// correctness within a process lifetime — mutations are visible to the
    /// next call immediately — only for durability across restarts.
    pub fn flush(&self) -> FsResult<()> {
        self.mmap.flush().map_err(FsError::from)
    }
}

/// Byte offset of data-block index `b`'s page, relative to
/// [`DATA_REGION_START_PAGE`].
pub fn data_block_page(b: usize) -> usize {
    DATA_REGION_START_PAGE + b
}

/// Reads inode `i`'s record out of the inode table.
pub fn read_inode(pages: &Pages, i: usize) -> InodeRecord {
    let page_idx = INODE_TABLE_START_PAGE + i / INODES_PER_PAGE;
    let offset = (i % INODES_PER_PAGE) * InodeRecord::SIZE;
    let bytes = &pages.page(page_idx)[offset..offset + InodeRecord::SIZE];
    InodeRecord::read_from(bytes).expect("inode record slice is exactly InodeRecord::SIZE bytes")
}

/// Writes inode `i`'s record back into the inode table.
pub fn write_inode(pages: &mut Pages, i: usize, record: &InodeRecord) {
    let page_idx = INODE_TABLE_START_PAGE + i / INODES_PER_PAGE;
    let offset = (i % INODES_PER_PAGE) * InodeRecord::SIZE;
    let bytes = &mut pages.page_mut(page_idx)[offset..offset + InodeRecord::SIZE];
    record
        .write_to(bytes)
        .expect("inode record slice is exactly InodeRecord::SIZE bytes");
}

/// Reads data block `b` as a directory page.
pub fn read_dir_page(pages: &Pages, b: usize) -> DirPage {
    let bytes = &pages.page(data_block_page(b))[..DirPage::SIZE];
    DirPage::read_from(bytes).expect("dir page slice is exactly DirPage::SIZE bytes")
}

/// Writes a directory page back into data block `b`.
pub fn write_dir_page(pages: &mut Pages, b: usize, page: &DirPage) {
    let bytes = &mut pages.page_mut(data_block_page(b))[..DirPage::SIZE];
    page.write_to(bytes)
        .expect("dir page slice is exactly DirPage::SIZE bytes");
}

/// Zeroes data block `b` entirely (directory pages and indirect blocks are
/// zeroed when freed; file pages are zeroed only implicitly by never being
/// read past `size`).
pub fn zero_data_block(pages: &mut Pages, b: usize) {
    pages.page_mut(data_block_page(b)).fill(0);
}

/// Reads the `n`th `i32` entry of the indirect block `b`.
pub fn read_indirect_entry(pages: &Pages, b: usize, n: usize) -> i32 {
    let offset = n * core::mem::size_of::<i32>();
    let bytes = &pages.page(data_block_page(b))[offset..offset + 4];
    i32::read_from(bytes).expect("4-byte slice")
}

/// Writes the `n`th `i32` entry of the indirect block `b`.
pub fn write_indirect_entry(pages: &mut Pages, b: usize, n: usize, value: i32) {
    let offset = n * core::mem::size_of::<i32>();
    let bytes = &mut pages.page_mut(data_block_page(b))[offset..offset + 4];
    value.write_to(bytes).expect("4-byte slice");
}

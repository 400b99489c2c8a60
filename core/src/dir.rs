//! Directory engine: packed entry slots inside directory pages.

use crate::bitmap;
use crate::error::{FsError, FsResult};
use crate::inode;
use crate::layout::{self, Pages};
use crate::record::{DirEntry, DirPage, ENTRIES_PER_PAGE};

/// Scans every directory page in inode `dir`'s block list, then every
/// occupied slot in each page, and returns the first inode index whose name
/// matches exactly.
pub fn lookup(pages: &Pages, dir: usize, name: &str) -> FsResult<usize> {
    let record = inode::read_inode(pages, dir);
    for b in inode::block_ids(pages, &record) {
        let page = layout::read_dir_page(pages, b);
        for slot in 0..ENTRIES_PER_PAGE {
            let entry = page.entries[slot];
            if bitmap::read(&page.entry_bitmap, slot) && entry.name() == name {
                return Ok(entry.inode as usize);
            }
        }
    }
    Err(FsError::NotFound)
}

/// Returns every entry name in directory inode `dir`, in no particular
/// order.
pub fn list(pages: &Pages, dir: usize) -> Vec<String> {
    let record = inode::read_inode(pages, dir);
    let mut names = Vec::new();
    for b in inode::block_ids(pages, &record) {
        let page = layout::read_dir_page(pages, b);
        for slot in 0..ENTRIES_PER_PAGE {
            if bitmap::read(&page.entry_bitmap, slot) {
                let entry = page.entries[slot];
                names.push(entry.name().to_string());
            }
        }
    }
    names
}

/// Places `(name, child)` into the first free slot of an existing directory
/// page, or allocates a fresh one if every page is full.
pub fn add_entry(pages: &mut Pages, dir: usize, name: &str, child: usize) -> FsResult<()> {
    if name.len() > crate::record::NAME_LIMIT {
        return Err(FsError::InvalidArgument);
    }

    let record = inode::read_inode(pages, dir);
    for b in inode::block_ids(pages, &record) {
        let mut page = layout::read_dir_page(pages, b);
        if let Some(slot) = bitmap::first_free(&page.entry_bitmap, ENTRIES_PER_PAGE) {
            write_entry(&mut page, slot, name, child);
            layout::write_dir_page(pages, b, &page);
            return Ok(());
        }
    }

    let new_block = inode::reserve_data_block(pages)?;
    if let Err(e) = inode::add_block(pages, dir, new_block) {
        inode::free_data_block(pages, new_block);
        return Err(e);
    }
    let mut page = DirPage::zeroed();
    write_entry(&mut page, 0, name, child);
    layout::write_dir_page(pages, new_block, &page);
    Ok(())
}

fn write_entry(page: &mut DirPage, slot: usize, name: &str, child: usize) {
    let mut entry = DirEntry::zeroed();
    entry.set_name(name);
    entry.inode = child as i32;
    page.entries[slot] = entry;
    bitmap::set(&mut page.entry_bitmap, slot, true);
}

/// Locates the slot named `name`, clears its bit, and zeros the slot
/// memory. Does not coalesce or free emptied directory pages, and does not
/// touch `num_hard_links` — that is the caller's responsibility.
pub fn remove_entry(pages: &mut Pages, dir: usize, name: &str) -> FsResult<()> {
    let record = inode::read_inode(pages, dir);
    for b in inode::block_ids(pages, &record) {
        let mut page = layout::read_dir_page(pages, b);
        for slot in 0..ENTRIES_PER_PAGE {
            let entry = page.entries[slot];
            if bitmap::read(&page.entry_bitmap, slot) && entry.name() == name {
                page.entries[slot] = DirEntry::zeroed();
                bitmap::set(&mut page.entry_bitmap, slot, false);
                layout::write_dir_page(pages, b, &page);
                return Ok(());
            }
        }
    }
    Err(FsError::NotFound)
}

/// A directory is empty when it contains nothing but `.` and `..`.
pub fn is_empty(pages: &Pages, dir: usize) -> bool {
    list(pages, dir)
        .iter()
        .all(|n| n == "." || n == "..")
}

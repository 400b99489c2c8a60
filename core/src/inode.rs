//! Inode engine: lifecycle, block-list traversal (direct slots plus one
//! indirect block), and block acquisition/release.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::bitmap;
use crate::error::{FsError, FsResult};
use crate::layout::{
    self, Pages, DATA_BITMAP_PAGE, INDIRECT_SLOTS, INODE_BITMAP_PAGE, INODE_COUNT,
    MAX_DATA_BLOCKS,
};
use crate::record::{InodeRecord, DIRECT_SLOTS, NO_BLOCK};

/// Seconds since the Unix epoch, used to stamp `atime`/`mtime`/`ctime`.
pub fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_secs() as i64
}

pub fn read_inode(pages: &Pages, i: usize) -> InodeRecord {
    layout::read_inode(pages, i)
}

pub fn write_inode(pages: &mut Pages, i: usize, record: &InodeRecord) {
    layout::write_inode(pages, i, record)
}

/// Flips the first free bit of the inode bitmap and returns its index.
pub fn reserve_inode(pages: &mut Pages) -> FsResult<usize> {
    let bm = pages.page(INODE_BITMAP_PAGE);
    let i = bitmap::first_free(bm, INODE_COUNT).ok_or(FsError::NoInodes)?;
    bitmap::set(pages.page_mut(INODE_BITMAP_PAGE), i, true);
    Ok(i)
}

/// Releases all blocks referenced by inode `i`, zeros its record, and
/// clears its bitmap bit.
pub fn free_inode(pages: &mut Pages, i: usize) {
    free_all_blocks(pages, i);
    write_inode(pages, i, &InodeRecord::zeroed());
    bitmap::set(pages.page_mut(INODE_BITMAP_PAGE), i, false);
}

/// Writes metadata for a freshly reserved inode: zero size, no blocks,
/// `num_hard_links = 1`, owner set to `(uid, gid)`, all three times stamped
/// to "now".
pub fn configure_inode(pages: &mut Pages, i: usize, mode: u32, uid: u32, gid: u32) {
    let t = now();
    let record = InodeRecord {
        atime: t,
        mtime: t,
        ctime: t,
        mode: mode as i32,
        num_hard_links: 1,
        user_id: uid as i32,
        group_id: gid as i32,
        size: 0,
        data_block_ids: [NO_BLOCK; DIRECT_SLOTS],
        indirect_data_block_id: NO_BLOCK,
    };
    write_inode(pages, i, &record);
}

/// The ordered list of data blocks reachable from `record`: direct slots in
/// order (skipping unused ones), then, if present, the indirect block's
/// entries up to the first zero.
pub fn block_ids(pages: &Pages, record: &InodeRecord) -> Vec<usize> {
    let mut out = Vec::new();
    for &slot in &record.data_block_ids {
        if slot != NO_BLOCK {
            out.push(slot as usize);
        }
    }
    if record.indirect_data_block_id != NO_BLOCK {
        let ib = record.indirect_data_block_id as usize;
        for n in 0..INDIRECT_SLOTS {
            let entry = layout::read_indirect_entry(pages, ib, n);
            if entry == 0 {
                break;
            }
            out.push(entry as usize);
        }
    }
    out
}

/// Reserves a single free data block, marks it used, and returns its index.
pub fn reserve_data_block(pages: &mut Pages) -> FsResult<usize> {
    let bm = pages.page(DATA_BITMAP_PAGE);
    let b = bitmap::first_free(bm, MAX_DATA_BLOCKS.min(usable_data_blocks(pages)))
        .ok_or(FsError::NoSpace)?;
    bitmap::set(pages.page_mut(DATA_BITMAP_PAGE), b, true);
    Ok(b)
}

/// Releases data block `b`: zeros its contents and clears its bitmap bit.
pub fn free_data_block(pages: &mut Pages, b: usize) {
    layout::zero_data_block(pages, b);
    bitmap::set(pages.page_mut(DATA_BITMAP_PAGE), b, false);
}

fn usable_data_blocks(pages: &Pages) -> usize {
    pages.page_count().saturating_sub(crate::layout::DATA_REGION_START_PAGE)
}

/// Appends `block_id` to inode `i`'s block list: fills the next free direct
/// slot, or falls back to the indirect block (allocating it on first use).
pub fn add_block(pages: &mut Pages, i: usize, block_id: usize) -> FsResult<()> {
    let mut record = read_inode(pages, i);
    if let Some(slot) = record
        .data_block_ids
        .iter()
        .position(|&s| s == NO_BLOCK)
    {
        record.data_block_ids[slot] = block_id as i32;
        write_inode(pages, i, &record);
        return Ok(());
    }

    let used_indirect = block_ids(pages, &record).len() - DIRECT_SLOTS;
    if used_indirect >= INDIRECT_SLOTS {
        return Err(FsError::NoSpace);
    }

    if record.indirect_data_block_id == NO_BLOCK {
        let ib = reserve_data_block(pages)?;
        record.indirect_data_block_id = ib as i32;
        write_inode(pages, i, &record);
    }

    let ib = record.indirect_data_block_id as usize;
    layout::write_indirect_entry(pages, ib, used_indirect, block_id as i32);
    Ok(())
}

/// Releases every block in inode `i`'s list (direct, indirect entries, and
/// the indirect block itself) and zeros the block-id state.
pub fn free_all_blocks(pages: &mut Pages, i: usize) {
    let record = read_inode(pages, i);
    for b in block_ids(pages, &record) {
        free_data_block(pages, b);
    }
    if record.indirect_data_block_id != NO_BLOCK {
        free_data_block(pages, record.indirect_data_block_id as usize);
    }
    let mut record = record;
    record.data_block_ids = [NO_BLOCK; DIRECT_SLOTS];
    record.indirect_data_block_id = NO_BLOCK;
    write_inode(pages, i, &record);
}

/// Attempts to grow inode `i`'s block list by `n` blocks via a contiguous
/// range first, falling back to per-block allocation. On any failure
/// partway through, releases *everything* the inode holds (not just the
/// newly acquired blocks) and returns `ENOSPC`.
pub fn reserve_blocks_for(pages: &mut Pages, i: usize, n: usize) -> FsResult<()> {
    if n == 0 {
        return Ok(());
    }

    let bm = pages.page(DATA_BITMAP_PAGE);
    let size = MAX_DATA_BLOCKS.min(usable_data_blocks(pages));
    if let Some(start) = bitmap::find_range(bm, n, size) {
        for b in start..start + n {
            bitmap::set(pages.page_mut(DATA_BITMAP_PAGE), b, true);
            if add_block(pages, i, b).is_err() {
                // b's bit was set above but it was never linked into the
                // inode's block list, so free_all_blocks below won't find
                // it; clear it here or its bit leaks with no owner.
                free_data_block(pages, b);
                free_all_blocks(pages, i);
                return Err(FsError::NoSpace);
            }
        }
        return Ok(());
    }

    for _ in 0..n {
        let b = match reserve_data_block(pages) {
            Ok(b) => b,
            Err(e) => {
                free_all_blocks(pages, i);
                return Err(e);
            }
        };
        if add_block(pages, i, b).is_err() {
            free_data_block(pages, b);
            free_all_blocks(pages, i);
            return Err(FsError::NoSpace);
        }
    }
    Ok(())
}

/// Frees the last `n` direct-slot blocks of inode `i`, descending from the
/// highest-index used slot. Does not shrink the indirect block — a request
/// that would need to reach into the indirect region is rejected with
/// `ENOSPC` rather than silently generalized.
pub fn remove_trailing_blocks(pages: &mut Pages, i: usize, n: usize) -> FsResult<()> {
    if n == 0 {
        return Ok(());
    }
    let record = read_inode(pages, i);
    let used = block_ids(pages, &record).len();
    let direct_used = used.min(DIRECT_SLOTS);
    let indirect_used = used - direct_used;
    if indirect_used > 0 {
        // The blocks being shrunk away live (at least partly) past the
        // direct slots; walking the indirect block to free them is out of
        // scope for this engine.
        return Err(FsError::NoSpace);
    }
    if n > direct_used {
        return Err(FsError::NoSpace);
    }

    let mut record = record;
    let mut remaining = n;
    for slot in (0..DIRECT_SLOTS).rev() {
        if remaining == 0 {
            break;
        }
        if record.data_block_ids[slot] != NO_BLOCK {
            free_data_block(pages, record.data_block_ids[slot] as usize);
            record.data_block_ids[slot] = NO_BLOCK;
            remaining -= 1;
        }
    }
    if remaining > 0 {
        return Err(FsError::NoSpace);
    }
    write_inode(pages, i, &record);
    Ok(())
}

//! File byte I/O: reads and writes spanning block boundaries, coalescing
//! numerically contiguous runs of data blocks into single memory copies.

use crate::error::{FsError, FsResult};
use crate::inode;
use crate::layout::{self, Pages, PAGE_SIZE};

/// Copies up to `buf.len()` bytes of inode `i`'s content starting at
/// `offset` into `buf`. Requires a regular file.
pub fn read_at(pages: &Pages, i: usize, buf: &mut [u8], offset: usize) -> FsResult<usize> {
    let record = inode::read_inode(pages, i);
    if !record.is_regular_file() {
        return Err(FsError::IsADirectory);
    }
    let size = record.size as usize;
    if offset >= size {
        return Ok(0);
    }
    let n = buf.len().min(size - offset);
    let blocks = inode::block_ids(pages, &record);

    let mut done = 0;
    while done < n {
        let (start_page, span_bytes, within) = span_at(&blocks, offset + done, n - done);
        let src = pages.bytes(start_page * PAGE_SIZE + within, span_bytes);
        buf[done..done + span_bytes].copy_from_slice(src);
        done += span_bytes;
    }
    Ok(n)
}

/// Copies `buf` into inode `i`'s content at `offset`, growing the file via
/// [`set_file_to_size`] first if the write extends past the current size.
/// Stamps `mtime`/`ctime` to "now" on success. Requires a regular file.
pub fn write_at(pages: &mut Pages, i: usize, buf: &[u8], offset: usize) -> FsResult<usize> {
    {
        let record = inode::read_inode(pages, i);
        if !record.is_regular_file() {
            return Err(FsError::IsADirectory);
        }
    }

    let needed = offset + buf.len();
    if needed > inode::read_inode(pages, i).size as usize {
        set_file_to_size(pages, i, needed)?;
    }

    let record = inode::read_inode(pages, i);
    let blocks = inode::block_ids(pages, &record);

    let mut done = 0;
    while done < buf.len() {
        let (start_page, span_bytes, within) = span_at(&blocks, offset + done, buf.len() - done);
        let dst = pages.bytes_mut(start_page * PAGE_SIZE + within, span_bytes);
        dst.copy_from_slice(&buf[done..done + span_bytes]);
        done += span_bytes;
    }

    let mut record = inode::read_inode(pages, i);
    let t = inode::now();
    record.mtime = t;
    record.ctime = t;
    inode::write_inode(pages, i, &record);
    Ok(done)
}

/// Given the inode's block list, the absolute byte offset of the next byte
/// of interest, and how many bytes remain wanted, returns
/// `(start_page, span_bytes, within_first_block)` for the largest prefix
/// that is backed by numerically contiguous data blocks.
fn span_at(blocks: &[usize], offset: usize, remaining: usize) -> (usize, usize, usize) {
    let logical_block = offset / PAGE_SIZE;
    let within = offset % PAGE_SIZE;

    let mut span_blocks = 1usize;
    let max_blocks = blocks.len() - logical_block;
    while span_blocks < max_blocks
        && blocks[logical_block + span_blocks] == blocks[logical_block + span_blocks - 1] + 1
        && span_blocks * PAGE_SIZE < within + remaining
    {
        span_blocks += 1;
    }

    let available = span_blocks * PAGE_SIZE - within;
    let span_bytes = available.min(remaining);
    let start_page = layout::data_block_page(blocks[logical_block]);
    (start_page, span_bytes, within)
}

/// Resizes inode `i` to `new_size`, adding or removing whole data blocks as
/// needed. Growth does not zero the newly allocated blocks; they are only
/// zeroed when freed.
pub fn set_file_to_size(pages: &mut Pages, i: usize, new_size: usize) -> FsResult<()> {
    let record = inode::read_inode(pages, i);
    let current_blocks = inode::block_ids(pages, &record).len();
    let needed_blocks = new_size.div_ceil(PAGE_SIZE);

    if needed_blocks > current_blocks {
        inode::reserve_blocks_for(pages, i, needed_blocks - current_blocks)?;
    } else if needed_blocks < current_blocks {
        inode::remove_trailing_blocks(pages, i, current_blocks - needed_blocks)?;
    }

    let mut record = inode::read_inode(pages, i);
    record.size = new_size as i32;
    inode::write_inode(pages, i, &record);
    Ok(())
}

/// Unconditionally releases all of inode `i`'s blocks, then resizes to
/// `new_size`. This is a destructive reset, not a "shrink to N".
pub fn truncate(pages: &mut Pages, i: usize, new_size: usize) -> FsResult<()> {
    inode::free_all_blocks(pages, i);
    set_file_to_size(pages, i, new_size)
}

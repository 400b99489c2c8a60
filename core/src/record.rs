//! On-disk record layouts.
//!
//! These structs are the byte-for-byte contents of an inode-table slot and
//! of a directory page. They derive [`AsBytes`]/[`FromBytes`] so a page's
//! byte region can be reinterpreted in place without manual pointer casts
//! or a serialization pass.

use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

/// Sentinel stored in a direct slot or the indirect-block field to mean
/// "unused".
pub const NO_BLOCK: i32 = -1;

pub const DIRECT_SLOTS: usize = 10;

/// A file-type bit, stored in the low bits of `mode` the same way the POSIX
/// `st_mode` field packs `S_IFREG`/`S_IFDIR`.
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFREG: u32 = 0o100000;
pub const S_IFMT: u32 = 0o170000;

/// On-disk inode record.
///
/// Field order groups the three 64-bit timestamps before the 32-bit fields
/// so that `#[repr(C)]` introduces no padding; the record is exactly 88
/// bytes wide regardless of host alignment rules.
#[derive(Copy, Clone, Debug, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
pub struct InodeRecord {
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
    pub mode: i32,
    pub num_hard_links: i32,
    pub user_id: i32,
    pub group_id: i32,
    pub size: i32,
    pub data_block_ids: [i32; DIRECT_SLOTS],
    pub indirect_data_block_id: i32,
}

impl InodeRecord {
    pub const SIZE: usize = core::mem::size_of::<InodeRecord>();

    pub fn zeroed() -> Self {
        Self {
            atime: 0,
            mtime: 0,
            ctime: 0,
            mode: 0,
            num_hard_links: 0,
            user_id: 0,
            group_id: 0,
            size: 0,
            data_block_ids: [NO_BLOCK; DIRECT_SLOTS],
            indirect_data_block_id: NO_BLOCK,
        }
    }

    pub fn is_free(&self) -> bool {
        self.mode == 0
    }

    pub fn is_dir(&self) -> bool {
        (self.mode as u32 & S_IFMT) == S_IFDIR
    }

    pub fn is_regular_file(&self) -> bool {
        (self.mode as u32 & S_IFMT) == S_IFREG
    }
}

/// Maximum length of a directory-entry name, not counting the NUL
/// terminator.
pub const NAME_LIMIT: usize = 255;
const NAME_FIELD: usize = 256;

/// Number of packed entry slots in one directory page.
pub const ENTRIES_PER_PAGE: usize = 15;

/// One `(name, inode index)` pair inside a directory page.
#[derive(Copy, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
pub struct DirEntry {
    name: [u8; NAME_FIELD],
    pub inode: i32,
}

impl DirEntry {
    pub fn zeroed() -> Self {
        Self {
            name: [0; NAME_FIELD],
            inode: 0,
        }
    }

    /// Writes `name` as a NUL-terminated fixed-width string.
    ///
    /// Returns `false` if `name` does not fit in [`NAME_LIMIT`] bytes.
    pub fn set_name(&mut self, name: &str) -> bool {
        let bytes = name.as_bytes();
        if bytes.len() > NAME_LIMIT {
            return false;
        }
        self.name = [0; NAME_FIELD];
        self.name[..bytes.len()].copy_from_slice(bytes);
        true
    }

    pub fn name(&self) -> &str {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_FIELD);
        core::str::from_utf8(&self.name[..len]).unwrap_or("")
    }
}

/// The bitmap of in-use slots is sized for [`ENTRIES_PER_PAGE`] bits.
pub const ENTRY_BITMAP_BYTES: usize = (ENTRIES_PER_PAGE + 7) / 8;

/// The content of a directory inode's data block: which of the 15 slots in
/// `entries` are occupied, plus the slots themselves.
#[derive(Copy, Clone, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C, packed)]
pub struct DirPage {
    pub entry_bitmap: [u8; ENTRY_BITMAP_BYTES],
    pub entries: [DirEntry; ENTRIES_PER_PAGE],
}

impl DirPage {
    pub const SIZE: usize = core::mem::size_of::<DirPage>();

    pub fn zeroed() -> Self {
        Self {
            entry_bitmap: [0; ENTRY_BITMAP_BYTES],
            entries: [DirEntry::zeroed(); ENTRIES_PER_PAGE],
        }
    }
}

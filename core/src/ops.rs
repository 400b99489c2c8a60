//! Namespace operations: the path-level API the volume exposes.
//!
//! Every operation resolves its path(s) and required inode type up front;
//! on any error it returns immediately without partial mutation, except for
//! [`rename`]'s link-then-unlink sequence (see the module docs on
//! [`crate::volume::Volume`]).

use crate::dir;
use crate::error::{FsError, FsResult};
use crate::inode;
use crate::layout::Pages;
use crate::path;
use crate::record::S_IFDIR;

/// POSIX `stat`-shaped record returned by [`get_stat`].
#[derive(Copy, Clone, Debug)]
pub struct Stat {
    pub dev: i32,
    pub rdev: i32,
    pub ino: u64,
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub blksize: u32,
    pub blocks: u64,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
}

fn require_dir(pages: &Pages, i: usize) -> FsResult<()> {
    let record = inode::read_inode(pages, i);
    if record.is_dir() {
        Ok(())
    } else {
        Err(FsError::NotADirectory)
    }
}

/// Creates a regular file at `path` with the given mode, reserving a fresh
/// inode and linking it into its parent directory. `uid`/`gid` are the
/// caller's effective ids, supplied by the bridge (the engine itself has no
/// notion of a calling process).
pub fn create_inode_at_path(
    pages: &mut Pages,
    p: &str,
    mode: u32,
    uid: u32,
    gid: u32,
) -> FsResult<usize> {
    let parent = path::parent_of(pages, p)?;
    require_dir(pages, parent)?;
    let name = path::basename(p)?;
    if dir::lookup(pages, parent, &name).is_ok() {
        return Err(FsError::AlreadyExists);
    }

    let child = inode::reserve_inode(pages)?;
    inode::configure_inode(pages, child, mode, uid, gid);
    if let Err(e) = dir::add_entry(pages, parent, &name, child) {
        inode::free_inode(pages, child);
        return Err(e);
    }
    Ok(child)
}

/// Creates a directory at `path`, wired up with `.` and `..` and the nlink
/// convention `nlink = 2 + (number of child directories)`.
pub fn create_dir(pages: &mut Pages, p: &str, uid: u32, gid: u32) -> FsResult<usize> {
    let parent = path::parent_of(pages, p)?;
    require_dir(pages, parent)?;
    let name = path::basename(p)?;
    if dir::lookup(pages, parent, &name).is_ok() {
        return Err(FsError::AlreadyExists);
    }

    let child = inode::reserve_inode(pages)?;
    inode::configure_inode(pages, child, S_IFDIR | 0o755, uid, gid);

    if let Err(e) = dir::add_entry(pages, parent, &name, child) {
        inode::free_inode(pages, child);
        return Err(e);
    }
    if let Err(e) = dir::add_entry(pages, child, ".", child) {
        let _ = dir::remove_entry(pages, parent, &name);
        inode::free_inode(pages, child);
        return Err(e);
    }
    if let Err(e) = dir::add_entry(pages, child, "..", parent) {
        let _ = dir::remove_entry(pages, parent, &name);
        inode::free_inode(pages, child);
        return Err(e);
    }

    bump_nlink(pages, child, 1); // "." contributes the second reference.
    bump_nlink(pages, parent, 1); // child's ".." contributes to the parent.
    Ok(child)
}

fn bump_nlink(pages: &mut Pages, i: usize, delta: i32) {
    let mut record = inode::read_inode(pages, i);
    record.num_hard_links += delta;
    inode::write_inode(pages, i, &record);
}

/// Adds a new name `dst` for the inode already reachable at `src`,
/// incrementing its `num_hard_links`.
pub fn link(pages: &mut Pages, src: &str, dst: &str) -> FsResult<()> {
    let target = path::resolve(pages, src)?;
    let parent = path::parent_of(pages, dst)?;
    require_dir(pages, parent)?;
    let name = path::basename(dst)?;
    if dir::lookup(pages, parent, &name).is_ok() {
        return Err(FsError::AlreadyExists);
    }

    dir::add_entry(pages, parent, &name, target)?;
    bump_nlink(pages, target, 1);
    let mut record = inode::read_inode(pages, target);
    record.ctime = inode::now();
    inode::write_inode(pages, target, &record);
    Ok(())
}

/// Removes `path`'s directory entry and decrements its `num_hard_links`,
/// freeing the inode if it reaches zero. Rejects directories with
/// `EISDIR`; directory removal goes solely through [`remove_dir`].
pub fn unlink(pages: &mut Pages, p: &str) -> FsResult<()> {
    let target = path::resolve(pages, p)?;
    let record = inode::read_inode(pages, target);
    if record.is_dir() {
        return Err(FsError::IsADirectory);
    }
    unlink_entry(pages, p, target)
}

/// Removes the directory entry at `p` and drops `target`'s link count,
/// freeing it at zero. Only valid for inodes with a baseline
/// `num_hard_links` of 1 (regular files) — directories use [`remove_dir`]'s
/// own unconditional free instead.
fn unlink_entry(pages: &mut Pages, p: &str, target: usize) -> FsResult<()> {
    let parent = path::parent_of(pages, p)?;
    let name = path::basename(p)?;
    dir::remove_entry(pages, parent, &name)?;

    let mut record = inode::read_inode(pages, target);
    record.num_hard_links -= 1;
    record.ctime = inode::now();
    let freed = record.num_hard_links <= 0;
    if !freed {
        inode::write_inode(pages, target, &record);
    }
    if freed {
        inode::free_inode(pages, target);
    }
    Ok(())
}

/// Implemented as `link(from, to)` followed by `unlink(from)`. Non-atomic:
/// a failure in the `unlink` step after a successful `link` leaves the file
/// reachable at both names.
pub fn rename(pages: &mut Pages, from: &str, to: &str) -> FsResult<()> {
    link(pages, from, to)?;
    unlink(pages, from)
}

/// Removes an empty directory. Rejects non-empty directories with
/// `ENOTEMPTY`. Undoes the child's `..` contribution to the parent's
/// `num_hard_links`, then removes the directory's own entry and frees its
/// inode directly — a directory's baseline `num_hard_links` is 2, not 1, so
/// routing through [`unlink`]'s single-decrement-then-free-at-zero logic
/// (built for regular files) would leave it allocated and unreachable.
pub fn remove_dir(pages: &mut Pages, p: &str) -> FsResult<()> {
    let target = path::resolve(pages, p)?;
    require_dir(pages, target)?;
    if !dir::is_empty(pages, target) {
        return Err(FsError::NotEmpty);
    }

    let parent = path::parent_of(pages, p)?;
    let name = path::basename(p)?;
    bump_nlink(pages, parent, -1);
    dir::remove_entry(pages, parent, &name)?;
    inode::free_inode(pages, target);
    Ok(())
}

/// Writes `atime`/`mtime` and stamps `ctime` to "now".
pub fn set_time(pages: &mut Pages, p: &str, atime: i64, mtime: i64) -> FsResult<()> {
    let i = path::resolve(pages, p)?;
    let mut record = inode::read_inode(pages, i);
    record.atime = atime;
    record.mtime = mtime;
    record.ctime = inode::now();
    inode::write_inode(pages, i, &record);
    Ok(())
}

/// Overwrites `mode` unconditionally and stamps `ctime` to "now". The
/// caller is responsible for preserving the file-type bits if it wants
/// them preserved.
pub fn set_mode(pages: &mut Pages, p: &str, mode: u32) -> FsResult<()> {
    let i = path::resolve(pages, p)?;
    let mut record = inode::read_inode(pages, i);
    record.mode = mode as i32;
    record.ctime = inode::now();
    inode::write_inode(pages, i, &record);
    Ok(())
}

/// Populates a POSIX `stat`-shaped record for `path`.
pub fn get_stat(pages: &Pages, p: &str) -> FsResult<Stat> {
    let i = path::resolve(pages, p)?;
    let record = inode::read_inode(pages, i);
    Ok(Stat {
        dev: 0,
        rdev: 0,
        ino: i as u64,
        mode: record.mode as u32,
        nlink: record.num_hard_links as u32,
        uid: record.user_id as u32,
        gid: record.group_id as u32,
        size: record.size as u64,
        blksize: 4096,
        blocks: (record.size as u64).div_ceil(512),
        atime: record.atime,
        mtime: record.mtime,
        ctime: record.ctime,
    })
}

/// Returns every entry name in the directory at `path`.
pub fn list(pages: &Pages, p: &str) -> FsResult<Vec<String>> {
    let i = path::resolve(pages, p)?;
    require_dir(pages, i)?;
    Ok(dir::list(pages, i))
}

//! Translates `fuser` callbacks into [`imgfs_core::Volume`] calls.
//!
//! The engine addresses everything by path, while FUSE addresses
//! everything by a 64-bit inode number assigned by the kernel. [`Bridge`]
//! keeps the smallest table that reconciles the two: a FUSE inode number is
//! just "the path we told the kernel about when we first `lookup`'d or
//! `readdir`'d this name", recovered on every callback and never persisted
//! across a remount.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry,
    ReplyWrite, Request, TimeOrNow,
};
use imgfs_core::{Stat, Volume, S_IFDIR};
use log::warn;

const TTL: Duration = Duration::from_secs(1);
const ROOT_FUSE_INO: u64 = 1;

/// Maps FUSE inode numbers to engine paths. Inode 1 is always `/`, matching
/// [`ROOT_INODE`]'s position as the engine's path root.
struct InoTable {
    paths: HashMap<u64, PathBuf>,
    next: u64,
}

impl InoTable {
    fn new() -> Self {
        let mut paths = HashMap::new();
        paths.insert(ROOT_FUSE_INO, PathBuf::from("/"));
        Self { paths, next: ROOT_FUSE_INO + 1 }
    }

    fn path(&self, ino: u64) -> Option<&Path> {
        self.paths.get(&ino).map(PathBuf::as_path)
    }

    /// Returns the inode already assigned to `path`, or mints a fresh one.
    fn intern(&mut self, path: PathBuf) -> u64 {
        if let Some((&ino, _)) = self.paths.iter().find(|(_, p)| **p == path) {
            return ino;
        }
        let ino = self.next;
        self.next += 1;
        self.paths.insert(ino, path);
        ino
    }

    fn join(&self, parent: u64, name: &OsStr) -> Option<PathBuf> {
        let parent_path = self.path(parent)?;
        let name = name.to_str()?;
        Some(if parent_path == Path::new("/") {
            PathBuf::from(format!("/{name}"))
        } else {
            parent_path.join(name)
        })
    }
}

/// The `fuser::Filesystem` implementation. Holds the volume and the inode
/// table behind one mutex: every callback is a single short-lived critical
/// section, mirroring the engine's no-internal-locking design.
pub struct Bridge {
    state: Mutex<(Volume, InoTable)>,
}

impl Bridge {
    pub fn new(volume: Volume) -> Self {
        Self { state: Mutex::new((volume, InoTable::new())) }
    }
}

fn file_type(stat: &Stat) -> FileType {
    if stat.mode & S_IFDIR == S_IFDIR {
        FileType::Directory
    } else {
        FileType::RegularFile
    }
}

fn to_file_attr(ino: u64, stat: &Stat) -> FileAttr {
    let secs_to_time = |secs: i64| UNIX_EPOCH + Duration::from_secs(secs.max(0) as u64);
    FileAttr {
        ino,
        size: stat.size,
        blocks: stat.blocks,
        atime: secs_to_time(stat.atime),
        mtime: secs_to_time(stat.mtime),
        ctime: secs_to_time(stat.ctime),
        crtime: secs_to_time(stat.ctime),
        kind: file_type(stat),
        perm: (stat.mode & 0o7777) as u16,
        nlink: stat.nlink,
        uid: stat.uid,
        gid: stat.gid,
        rdev: stat.rdev as u32,
        blksize: stat.blksize,
        flags: 0,
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl Filesystem for Bridge {
    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let mut guard = self.state.lock().unwrap();
        let (volume, table) = &mut *guard;
        let Some(path) = table.join(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        match volume.stat(&path_str(&path)) {
            Ok(stat) => {
                let ino = table.intern(path);
                reply.entry(&TTL, &to_file_attr(ino, &stat), 0);
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn getattr(&mut self, _req: &Request, ino: u64, reply: ReplyAttr) {
        let guard = self.state.lock().unwrap();
        let (volume, table) = &*guard;
        let Some(path) = table.path(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match volume.stat(&path_str(path)) {
            Ok(stat) => reply.attr(&TTL, &to_file_attr(ino, &stat)),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request,
        ino: u64,
        mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let mut guard = self.state.lock().unwrap();
        let (volume, table) = &mut *guard;
        let Some(path) = table.path(ino).map(Path::to_path_buf) else {
            reply.error(libc::ENOENT);
            return;
        };
        let p = path_str(&path);

        if let Some(mode) = mode {
            if let Err(e) = volume.set_mode(&p, mode) {
                reply.error(e.errno());
                return;
            }
        }
        if let Some(size) = size {
            if let Err(e) = volume.truncate(&p, size as usize) {
                reply.error(e.errno());
                return;
            }
        }
        if atime.is_some() || mtime.is_some() {
            let secs = |t: TimeOrNow| match t {
                TimeOrNow::SpecificTime(t) => {
                    t.duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
                }
                TimeOrNow::Now => now(),
            };
            let current = volume.stat(&p).map(|s| (s.atime, s.mtime)).unwrap_or((0, 0));
            let a = atime.map(secs).unwrap_or(current.0);
            let m = mtime.map(secs).unwrap_or(current.1);
            if let Err(e) = volume.set_time(&p, a, m) {
                reply.error(e.errno());
                return;
            }
        }

        match volume.stat(&p) {
            Ok(stat) => reply.attr(&TTL, &to_file_attr(ino, &stat)),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let guard = self.state.lock().unwrap();
        let (volume, table) = &*guard;
        let Some(path) = table.path(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let mut buf = vec![0u8; size as usize];
        match volume.read(&path_str(path), &mut buf, offset as usize) {
            Ok(n) => reply.data(&buf[..n]),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn write(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let mut guard = self.state.lock().unwrap();
        let (volume, table) = &mut *guard;
        let Some(path) = table.path(ino).map(Path::to_path_buf) else {
            reply.error(libc::ENOENT);
            return;
        };
        match volume.write(&path_str(&path), data, offset as usize) {
            Ok(n) => reply.written(n as u32),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn mknod(
        &mut self,
        req: &Request,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        _rdev: u32,
        reply: ReplyEntry,
    ) {
        let mut guard = self.state.lock().unwrap();
        let (volume, table) = &mut *guard;
        let Some(path) = table.join(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        match volume.create_file_as(&path_str(&path), mode, req.uid(), req.gid()) {
            Ok(_) => {
                let ino = table.intern(path.clone());
                match volume.stat(&path_str(&path)) {
                    Ok(stat) => reply.entry(&TTL, &to_file_attr(ino, &stat), 0),
                    Err(e) => reply.error(e.errno()),
                }
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn mkdir(
        &mut self,
        req: &Request,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let mut guard = self.state.lock().unwrap();
        let (volume, table) = &mut *guard;
        let Some(path) = table.join(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        match volume.create_dir_as(&path_str(&path), req.uid(), req.gid()) {
            Ok(_) => {
                let ino = table.intern(path.clone());
                match volume.stat(&path_str(&path)) {
                    Ok(stat) => reply.entry(&TTL, &to_file_attr(ino, &stat), 0),
                    Err(e) => reply.error(e.errno()),
                }
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn unlink(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let mut guard = self.state.lock().unwrap();
        let (volume, table) = &mut *guard;
        let Some(path) = table.join(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        match volume.unlink(&path_str(&path)) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn rmdir(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let mut guard = self.state.lock().unwrap();
        let (volume, table) = &mut *guard;
        let Some(path) = table.join(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        match volume.remove_dir(&path_str(&path)) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn link(
        &mut self,
        _req: &Request,
        ino: u64,
        newparent: u64,
        newname: &OsStr,
        reply: ReplyEntry,
    ) {
        let mut guard = self.state.lock().unwrap();
        let (volume, table) = &mut *guard;
        let (Some(src), Some(dst)) = (table.path(ino).map(Path::to_path_buf), table.join(newparent, newname)) else {
            reply.error(libc::ENOENT);
            return;
        };
        match volume.link(&path_str(&src), &path_str(&dst)) {
            Ok(()) => match volume.stat(&path_str(&dst)) {
                Ok(stat) => {
                    let ino = table.intern(dst);
                    reply.entry(&TTL, &to_file_attr(ino, &stat), 0);
                }
                Err(e) => reply.error(e.errno()),
            },
            Err(e) => reply.error(e.errno()),
        }
    }

    fn rename(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        let mut guard = self.state.lock().unwrap();
        let (volume, table) = &mut *guard;
        let (Some(from), Some(to)) = (table.join(parent, name), table.join(newparent, newname)) else {
            reply.error(libc::ENOENT);
            return;
        };
        match volume.rename(&path_str(&from), &path_str(&to)) {
            Ok(()) => {
                table.paths.retain(|_, p| *p != from);
                reply.ok();
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let mut guard = self.state.lock().unwrap();
        let (volume, table) = &mut *guard;
        let Some(path) = table.path(ino).map(Path::to_path_buf) else {
            reply.error(libc::ENOENT);
            return;
        };
        let names = match volume.list(&path_str(&path)) {
            Ok(names) => names,
            Err(e) => {
                reply.error(e.errno());
                return;
            }
        };

        for (i, name) in names.into_iter().enumerate().skip(offset as usize) {
            let child_path = if name == "." {
                path.clone()
            } else if name == ".." {
                path.parent().map(Path::to_path_buf).unwrap_or_else(|| path.clone())
            } else if path == Path::new("/") {
                PathBuf::from(format!("/{name}"))
            } else {
                path.join(&name)
            };
            let kind = match volume.stat(&path_str(&child_path)) {
                Ok(stat) => file_type(&stat),
                Err(_) => {
                    warn!("readdir: stat failed for {}", child_path.display());
                    continue;
                }
            };
            let child_ino = table.intern(child_path);
            if reply.add(child_ino, (i + 1) as i64, kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn open(&mut self, _req: &Request, _ino: u64, _flags: i32, reply: fuser::ReplyOpen) {
        reply.opened(0, 0);
    }

    fn opendir(&mut self, _req: &Request, _ino: u64, _flags: i32, reply: fuser::ReplyOpen) {
        reply.opened(0, 0);
    }
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

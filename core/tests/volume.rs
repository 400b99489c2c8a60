//! End-to-end scenarios driving a `Volume` over a `tempfile`-backed image,
//! exercising the engine the way the `mount` bridge does: through the public
//! path-addressed API only.

use imgfs_core::{Volume, S_IFDIR};

fn open_temp() -> (tempfile::TempDir, Volume) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("image.fs");
    let volume = Volume::open(&path).unwrap();
    (dir, volume)
}

#[test]
fn root_exists_and_is_a_directory() {
    let (_dir, volume) = open_temp();
    let stat = volume.stat("/").unwrap();
    assert_eq!(stat.mode & S_IFDIR, S_IFDIR);
    assert_eq!(stat.nlink, 2);
}

#[test]
fn reopening_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("image.fs");
    {
        let mut volume = Volume::open(&path).unwrap();
        volume.create_file("/a", 0o100644).unwrap();
    }
    let volume = Volume::open(&path).unwrap();
    assert!(volume.list("/").unwrap().contains(&"a".to_string()));
}

#[test]
fn write_read_round_trip() {
    let (_dir, mut volume) = open_temp();
    volume.create_file("/hello", 0o100644).unwrap();
    let n = volume.write("/hello", b"hello world", 0).unwrap();
    assert_eq!(n, 11);
    let mut buf = [0u8; 11];
    let n = volume.read("/hello", &mut buf, 0).unwrap();
    assert_eq!(n, 11);
    assert_eq!(&buf, b"hello world");
}

#[test]
fn hard_link_and_unlink_nlink_bookkeeping() {
    let (_dir, mut volume) = open_temp();
    volume.create_file("/a", 0o100644).unwrap();
    volume.link("/a", "/b").unwrap();
    assert_eq!(volume.stat("/a").unwrap().nlink, 2);
    volume.unlink("/a").unwrap();
    assert_eq!(volume.stat("/b").unwrap().nlink, 1);
    volume.unlink("/b").unwrap();
    assert!(volume.stat("/b").is_err());
}

#[test]
fn unlink_rejects_directories() {
    let (_dir, mut volume) = open_temp();
    volume.create_dir("/d").unwrap();
    assert!(volume.unlink("/d").is_err());
}

#[test]
fn remove_dir_rejects_non_empty_then_succeeds() {
    let (_dir, mut volume) = open_temp();
    volume.create_dir("/d").unwrap();
    volume.create_file("/d/f", 0o100644).unwrap();
    assert!(volume.remove_dir("/d").is_err());
    volume.unlink("/d/f").unwrap();
    volume.remove_dir("/d").unwrap();
    assert!(volume.stat("/d").is_err());
}

#[test]
fn truncate_after_write_frees_blocks() {
    let (_dir, mut volume) = open_temp();
    volume.create_file("/big", 0o100644).unwrap();
    let data = vec![7u8; 4096 * 3];
    volume.write("/big", &data, 0).unwrap();
    volume.truncate("/big", 10).unwrap();
    assert_eq!(volume.stat("/big").unwrap().size, 10);
}

#[test]
fn write_spanning_eleven_blocks_forces_indirect_allocation() {
    let (_dir, mut volume) = open_temp();
    volume.create_file("/f", 0o100644).unwrap();
    let data = vec![1u8; 4096 * 11];
    volume.write("/f", &data, 0).unwrap();
    let mut buf = vec![0u8; 4096 * 11];
    volume.read("/f", &mut buf, 0).unwrap();
    assert_eq!(buf, data);
}

#[test]
fn sixteenth_directory_entry_forces_a_second_page() {
    let (_dir, mut volume) = open_temp();
    volume.create_dir("/d").unwrap();
    for n in 0..16 {
        volume.create_file(&format!("/d/f{n}"), 0o100644).unwrap();
    }
    let names = volume.list("/d").unwrap();
    assert_eq!(names.len(), 18); // 16 files plus "." and "..".
}

/// A mkdir/rmdir cycle must return the directory's inode (and its data
/// block) to the free pool. With 828 inodes total, looping past that count
/// on a single path would exhaust the inode bitmap if either leaked.
#[test]
fn mkdir_rmdir_cycle_does_not_leak_inodes() {
    let (_dir, mut volume) = open_temp();
    for _ in 0..1000 {
        volume.create_dir("/d").unwrap();
        volume.remove_dir("/d").unwrap();
    }
}

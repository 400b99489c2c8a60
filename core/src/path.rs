//! Path resolver: tokenizer and stepwise descent from the root inode.
//!
//! The resolver does not interpret `.` or `..` itself; they resolve only
//! because directory entries named `.` and `..` exist in every directory.

use crate::dir;
use crate::error::{FsError, FsResult};
use crate::layout::Pages;

pub const ROOT_INODE: usize = 0;

/// Splits `path` on `/`, dropping empty components produced by repeated or
/// trailing slashes.
fn components(path: &str) -> FsResult<Vec<&str>> {
    if !path.starts_with('/') {
        return Err(FsError::NotFound);
    }
    Ok(path
        .split('/')
        .filter(|c| !c.is_empty())
        .collect())
}

/// Resolves `path` to an inode index, starting from [`ROOT_INODE`].
pub fn resolve(pages: &Pages, path: &str) -> FsResult<usize> {
    let parts = components(path)?;
    let mut current = ROOT_INODE;
    for name in parts {
        current = dir::lookup(pages, current, name)?;
    }
    Ok(current)
}

/// Resolves the inode of `path` with its last component dropped.
pub fn parent_of(pages: &Pages, path: &str) -> FsResult<usize> {
    let parts = components(path)?;
    if parts.is_empty() {
        return Err(FsError::NotFound);
    }
    let mut current = ROOT_INODE;
    for name in &parts[..parts.len() - 1] {
        current = dir::lookup(pages, current, name)?;
    }
    Ok(current)
}

/// Returns the last path component as an owned string.
pub fn basename(path: &str) -> FsResult<String> {
    let parts = components(path)?;
    parts
        .last()
        .map(|s| s.to_string())
        .ok_or(FsError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_relative_paths() {
        assert!(components("a/b").is_err());
        assert!(components("").is_err());
    }

    #[test]
    fn collapses_repeated_and_trailing_slashes() {
        assert_eq!(components("/a//b/").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn basename_of_root_like_path() {
        assert_eq!(basename("/a/b/c").unwrap(), "c");
    }
}

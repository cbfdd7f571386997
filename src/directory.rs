//! Recursive tree copy
//!
//! The walker classifies each entry with a non-following `fstatat`, copies
//! directories by recursing with a pair of open directory handles (source,
//! destination) and hands every other entry to the node copier. Each
//! recursion frame owns its two handles and releases them before it returns,
//! on success and on error alike, so the number of open descriptors grows
//! with tree depth and never with tree size.
//!
//! The walk is fail-fast: the first failing entry stops the enumeration of
//! its directory and is returned through every enclosing level unchanged.
//! Whatever was copied before the failure stays in place.
//!
//! # Destination reconciliation
//!
//! Directories are reconciled here; non-directories by
//! [`node::reconcile_destination`] inside [`node::copy_entry`].
//!
//! | Source | Destination | Action |
//! |---|---|---|
//! | directory | missing | `mkdirat(0700)` |
//! | directory | directory | reuse |
//! | directory | non-directory | `force_rewrite` ? unlink + mkdir : `TypeConflict` |
//! | regular file | regular file | truncate |
//! | non-directory | other non-directory | unlink, then create |
//! | non-directory | directory | `force_rewrite` ? remove tree + create : `TypeConflict` |

use crate::config::CopyOptions;
use crate::error::{CopyError, Result};
use crate::node::{self, entry_path, CopiedNode, FilesystemEntry};
use dirfd_fs::{is_dot_or_dotdot, DirectoryFd, EntryKind};
use std::ffi::CStr;
use tracing::{debug, warn};

/// Mode of directories created at the destination
pub const DIRECTORY_MODE: u32 = 0o700;

/// Counters for one copy operation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CopyStats {
    /// Regular files copied
    pub files_copied: u64,
    /// Bytes of regular file content copied
    pub bytes_copied: u64,
    /// Symlinks recreated
    pub symlinks_copied: u64,
    /// FIFOs and device nodes recreated
    pub special_files_copied: u64,
    /// Directories whose content was copied
    pub directories_copied: u64,
}

impl CopyStats {
    fn record(&mut self, node: CopiedNode) {
        match node {
            CopiedNode::File { bytes } => {
                self.files_copied += 1;
                self.bytes_copied += bytes;
            }
            CopiedNode::Symlink => self.symlinks_copied += 1,
            CopiedNode::Special => self.special_files_copied += 1,
        }
    }
}

/// Depth-first copier for one tree
///
/// Holds the options for the whole operation and the running statistics.
/// A `TreeCopier` can be reused for several roots; statistics accumulate.
#[derive(Debug, Default)]
pub struct TreeCopier {
    options: CopyOptions,
    stats: CopyStats,
}

impl TreeCopier {
    /// Create a copier with the given options
    pub fn new(options: CopyOptions) -> Self {
        Self {
            options,
            stats: CopyStats::default(),
        }
    }

    /// Options this copier applies
    pub fn options(&self) -> &CopyOptions {
        &self.options
    }

    /// Statistics so far
    pub fn stats(&self) -> &CopyStats {
        &self.stats
    }

    /// Consume the copier, returning its statistics
    pub fn into_stats(self) -> CopyStats {
        self.stats
    }

    /// Copy the entry `source_name` of `source_parent` to `dest_name` in
    /// `dest_parent`
    ///
    /// Directories are copied recursively; `.` and `..` are skipped without
    /// being examined.
    ///
    /// # Errors
    ///
    /// Returns the first failure met, depth-first in enumeration order.
    pub fn copy_path(
        &mut self,
        source_parent: &DirectoryFd,
        source_name: &CStr,
        dest_parent: &DirectoryFd,
        dest_name: &CStr,
    ) -> Result<()> {
        if is_dot_or_dotdot(source_name) {
            return Ok(());
        }

        let entry = FilesystemEntry::query(source_parent, source_name)?;
        if entry.kind() == EntryKind::Directory {
            return self.copy_directory(source_parent, &entry, dest_parent, dest_name);
        }

        let copied = node::copy_entry(
            &entry,
            source_parent,
            dest_parent,
            dest_name,
            &self.options,
        )?;
        self.stats.record(copied);
        Ok(())
    }

    /// Copy every entry of `source_dir` into `dest_dir`
    ///
    /// # Errors
    ///
    /// Returns the first failing entry; an enumeration error is reported as
    /// an open failure on `source_dir`.
    pub fn copy_tree(&mut self, source_dir: &DirectoryFd, dest_dir: &DirectoryFd) -> Result<()> {
        let entries = source_dir.entries().map_err(|source| CopyError::Open {
            path: source_dir.path().to_path_buf(),
            source,
        })?;

        for name in entries {
            let name = name.map_err(|source| CopyError::Open {
                path: source_dir.path().to_path_buf(),
                source,
            })?;
            if is_dot_or_dotdot(&name) {
                continue;
            }
            self.copy_path(source_dir, &name, dest_dir, &name)?;
        }
        Ok(())
    }

    fn copy_directory(
        &mut self,
        source_parent: &DirectoryFd,
        entry: &FilesystemEntry,
        dest_parent: &DirectoryFd,
        dest_name: &CStr,
    ) -> Result<()> {
        let source_dir = source_parent
            .open_dir_at(&entry.name)
            .map_err(|source| CopyError::Open {
                path: entry_path(source_parent, &entry.name),
                source,
            })?;
        let dest_dir = self.open_dest_directory(dest_parent, dest_name)?;
        debug!(
            "copying directory {} -> {}",
            source_dir.path().display(),
            dest_dir.path().display()
        );

        let result = self.copy_tree(&source_dir, &dest_dir);
        drop(source_dir);
        result?;

        let dest_path = dest_dir.path().to_path_buf();
        dest_dir
            .close()
            .map_err(|source| CopyError::Flush {
                path: dest_path,
                source,
            })?;
        self.stats.directories_copied += 1;
        Ok(())
    }

    /// Open the destination directory, creating or replacing it as needed
    fn open_dest_directory(&self, dest_parent: &DirectoryFd, dest_name: &CStr) -> Result<DirectoryFd> {
        let path = entry_path(dest_parent, dest_name);
        match dest_parent.open_dir_at(dest_name) {
            Ok(dir) => return Ok(dir),
            Err(e) if e.is_not_found() => {}
            Err(e) if e.is_not_directory() => {
                if !self.options.force_rewrite {
                    return Err(CopyError::TypeConflict {
                        path,
                        expected: "directory",
                    });
                }
                warn!("replacing {} with a directory", path.display());
                dest_parent
                    .unlink_at(dest_name)
                    .map_err(|source| CopyError::NodeCreate {
                        path: path.clone(),
                        source,
                    })?;
            }
            Err(source) => return Err(CopyError::Open { path, source }),
        }

        dest_parent
            .create_dir_at(dest_name, DIRECTORY_MODE)
            .map_err(|source| CopyError::NodeCreate {
                path: path.clone(),
                source,
            })?;
        dest_parent
            .open_dir_at(dest_name)
            .map_err(|source| CopyError::Open { path, source })
    }
}

/// Copy one named entry (recursively, for a directory)
///
/// This is the engine's entry point. The caller supplies the resolved pair of
/// parent directories and names; see [`crate::resolve`] for turning two user
/// paths into them.
///
/// # Errors
///
/// Returns the first failure met; the destination may be partially populated.
pub fn copy_path(
    source_parent: &DirectoryFd,
    source_name: &CStr,
    dest_parent: &DirectoryFd,
    dest_name: &CStr,
    options: CopyOptions,
) -> Result<CopyStats> {
    let mut copier = TreeCopier::new(options);
    copier.copy_path(source_parent, source_name, dest_parent, dest_name)?;
    Ok(copier.into_stats())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use std::ffi::CString;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn name(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    fn copy_named(root: &Path, src: &str, dst: &str, options: CopyOptions) -> Result<CopyStats> {
        let parent = DirectoryFd::open(root).unwrap();
        copy_path(&parent, &name(src), &parent, &name(dst), options)
    }

    #[test]
    fn test_dot_entries_are_skipped() {
        let temp = TempDir::new().unwrap();
        let stats = copy_named(temp.path(), ".", "copy", CopyOptions::default()).unwrap();
        assert_eq!(stats, CopyStats::default());
        assert!(!temp.path().join("copy").exists());

        let stats = copy_named(temp.path(), "..", "copy", CopyOptions::default()).unwrap();
        assert_eq!(stats, CopyStats::default());
    }

    #[test]
    fn test_nested_tree_and_stats() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("a/b")).unwrap();
        fs::write(src.join("top.txt"), b"top").unwrap();
        fs::write(src.join("a/b/deep.txt"), b"deeper").unwrap();
        std::os::unix::fs::symlink("top.txt", src.join("link")).unwrap();

        let stats = copy_named(temp.path(), "src", "dst", CopyOptions::default()).unwrap();
        assert_eq!(stats.files_copied, 2);
        assert_eq!(stats.bytes_copied, 9);
        assert_eq!(stats.symlinks_copied, 1);
        assert_eq!(stats.directories_copied, 3);

        let dst = temp.path().join("dst");
        assert_eq!(fs::read(dst.join("a/b/deep.txt")).unwrap(), b"deeper");
        assert_eq!(fs::read_link(dst.join("link")).unwrap(), Path::new("top.txt"));
    }

    #[test]
    fn test_directory_onto_file_conflict() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("src")).unwrap();
        fs::write(temp.path().join("src/f"), b"x").unwrap();
        fs::write(temp.path().join("dst"), b"i am a file").unwrap();

        let err = copy_named(temp.path(), "src", "dst", CopyOptions::default()).unwrap_err();
        assert_eq!(err.kind(), FailureKind::TypeConflict);
        assert_eq!(fs::read(temp.path().join("dst")).unwrap(), b"i am a file");

        let forced = CopyOptions::default().with_force_rewrite(true);
        copy_named(temp.path(), "src", "dst", forced).unwrap();
        assert_eq!(fs::read(temp.path().join("dst/f")).unwrap(), b"x");
    }

    #[test]
    fn test_file_onto_directory_conflict() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("src"), b"content").unwrap();
        fs::create_dir_all(temp.path().join("dst/inner")).unwrap();
        fs::write(temp.path().join("dst/inner/old"), b"old").unwrap();

        let err = copy_named(temp.path(), "src", "dst", CopyOptions::default()).unwrap_err();
        assert_eq!(err.kind(), FailureKind::TypeConflict);
        assert!(temp.path().join("dst/inner/old").exists());

        let forced = CopyOptions::default().with_force_rewrite(true);
        copy_named(temp.path(), "src", "dst", forced).unwrap();
        assert_eq!(fs::read(temp.path().join("dst")).unwrap(), b"content");
    }

    #[test]
    fn test_existing_symlink_destination_is_replaced_not_followed() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("src"), b"new").unwrap();
        fs::write(temp.path().join("victim"), b"untouched").unwrap();
        std::os::unix::fs::symlink("victim", temp.path().join("dst")).unwrap();

        copy_named(temp.path(), "src", "dst", CopyOptions::default()).unwrap();

        let dst = fs::symlink_metadata(temp.path().join("dst")).unwrap();
        assert!(dst.file_type().is_file());
        assert_eq!(fs::read(temp.path().join("dst")).unwrap(), b"new");
        assert_eq!(fs::read(temp.path().join("victim")).unwrap(), b"untouched");
    }

    #[test]
    fn test_symlink_to_directory_destination_needs_force() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("src")).unwrap();
        fs::create_dir(temp.path().join("elsewhere")).unwrap();
        std::os::unix::fs::symlink("elsewhere", temp.path().join("dst")).unwrap();

        let err = copy_named(temp.path(), "src", "dst", CopyOptions::default()).unwrap_err();
        assert_eq!(err.kind(), FailureKind::TypeConflict);

        let forced = CopyOptions::default().with_force_rewrite(true);
        copy_named(temp.path(), "src", "dst", forced).unwrap();
        assert!(fs::symlink_metadata(temp.path().join("dst")).unwrap().is_dir());
        assert!(temp.path().join("elsewhere").is_dir());
    }

    #[test]
    fn test_missing_source_is_stat_failure() {
        let temp = TempDir::new().unwrap();
        let err = copy_named(temp.path(), "absent", "dst", CopyOptions::default()).unwrap_err();
        assert_eq!(err.kind(), FailureKind::StatFailure);
        assert_eq!(err.path(), temp.path().join("absent"));
    }

    #[test]
    fn test_copier_accumulates_across_roots() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("one"), b"1").unwrap();
        fs::write(temp.path().join("two"), b"22").unwrap();
        let parent = DirectoryFd::open(temp.path()).unwrap();

        let mut copier = TreeCopier::new(CopyOptions::default());
        copier.copy_path(&parent, &name("one"), &parent, &name("one.bak")).unwrap();
        copier.copy_path(&parent, &name("two"), &parent, &name("two.bak")).unwrap();
        assert_eq!(copier.stats().files_copied, 2);
        assert_eq!(copier.into_stats().bytes_copied, 3);
    }
}

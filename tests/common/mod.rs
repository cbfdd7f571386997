//! Common test helpers for integration tests

#![allow(dead_code)]

use std::ffi::CString;
use std::fs;
use std::os::unix::fs::{symlink, FileTypeExt};
use std::path::{Path, PathBuf};

/// One entry of a fixture tree, relative to its root
pub enum Node<'a> {
    File(&'a str, &'a [u8]),
    Dir(&'a str),
    Symlink(&'a str, &'a str),
}

/// Create the entries under `root` (created if missing), in order
pub fn build_tree(root: &Path, nodes: &[Node<'_>]) {
    fs::create_dir_all(root).unwrap();
    for node in nodes {
        match node {
            Node::File(name, content) => fs::write(root.join(name), content).unwrap(),
            Node::Dir(name) => fs::create_dir_all(root.join(name)).unwrap(),
            Node::Symlink(name, target) => symlink(target, root.join(name)).unwrap(),
        }
    }
}

/// Name as the engine takes it
pub fn c_name(name: &str) -> CString {
    CString::new(name).unwrap()
}

/// Every path below `root` (root excluded), relative and sorted
pub fn relative_entries(root: &Path) -> Vec<PathBuf> {
    let mut entries: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .map(|e| e.unwrap().path().strip_prefix(root).unwrap().to_path_buf())
        .collect();
    entries.sort();
    entries
}

/// Compare two trees for identical names, types, contents and link targets
///
/// Symlinks are compared by target text, never followed.
pub fn compare_trees(source: &Path, dest: &Path) -> Result<(), String> {
    let entries1 = relative_entries(source);
    let entries2 = relative_entries(dest);
    if entries1 != entries2 {
        return Err(format!(
            "Different entries:\n  source: {entries1:?}\n  dest:   {entries2:?}"
        ));
    }

    for rel_path in &entries1 {
        let entry1 = source.join(rel_path);
        let entry2 = dest.join(rel_path);
        let meta1 = fs::symlink_metadata(&entry1).unwrap();
        let meta2 = fs::symlink_metadata(&entry2).unwrap();

        let (type1, type2) = (meta1.file_type(), meta2.file_type());
        if type1.is_file() != type2.is_file()
            || type1.is_dir() != type2.is_dir()
            || type1.is_symlink() != type2.is_symlink()
            || type1.is_fifo() != type2.is_fifo()
        {
            return Err(format!("Type mismatch for {}", rel_path.display()));
        }

        if type1.is_file() && fs::read(&entry1).unwrap() != fs::read(&entry2).unwrap() {
            return Err(format!("Content differs for {}", rel_path.display()));
        }

        if type1.is_symlink() {
            let target1 = fs::read_link(&entry1).unwrap();
            let target2 = fs::read_link(&entry2).unwrap();
            if target1 != target2 {
                return Err(format!(
                    "Symlink target differs for {}: {:?} vs {:?}",
                    rel_path.display(),
                    target1,
                    target2
                ));
            }
        }
    }

    Ok(())
}

/// Names in `dir` in the order the kernel enumerates them
pub fn enumeration_order(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect()
}

pub fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

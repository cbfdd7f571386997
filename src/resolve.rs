//! Turning a (source, destination) path pair into a copy root
//!
//! Before the engine runs, the two user paths are classified and mapped to
//! directory handles plus single names:
//!
//! | Destination | Source is a non-directory | Source is a directory |
//! |---|---|---|
//! | missing | [`CopyPlan::CreateAsFile`] | [`CopyPlan::CreateAsDirectory`] |
//! | non-directory | [`CopyPlan::CreateAsFile`] (overwrite) | [`CopyPlan::RejectDirIntoFile`] |
//! | directory | [`CopyPlan::CopyIntoDirectory`] | [`CopyPlan::CopyIntoDirectory`] |
//!
//! A missing destination needs an existing parent directory. The source is
//! classified without following a final symlink; the destination follows
//! one, so a link to a directory receives the copy.

use dirfd_fs::{DirectoryFd, FsError};
use std::ffi::CString;
use std::fs;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// What the source is, for planning purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceShape {
    /// File, symlink, FIFO, device, ...
    NonDirectory,
    /// Directory
    Directory,
}

/// What currently sits at the destination path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationState {
    /// Nothing (the parent directory exists)
    Missing,
    /// An entry that is not a directory
    NonDirectory,
    /// A directory, possibly reached through a symlink
    Directory,
}

/// Decision of the pre-resolution step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyPlan {
    /// Create (or overwrite) the destination path as a non-directory
    CreateAsFile,
    /// Create the destination path as a directory
    CreateAsDirectory,
    /// Copy the source under its own name into the destination directory
    CopyIntoDirectory,
    /// A directory cannot be copied onto a file
    RejectDirIntoFile,
}

/// Map a (source, destination) classification to a plan
pub fn plan(source: SourceShape, destination: DestinationState) -> CopyPlan {
    match (destination, source) {
        (DestinationState::Directory, _) => CopyPlan::CopyIntoDirectory,
        (DestinationState::Missing, SourceShape::Directory) => CopyPlan::CreateAsDirectory,
        (DestinationState::Missing, SourceShape::NonDirectory) => CopyPlan::CreateAsFile,
        (DestinationState::NonDirectory, SourceShape::NonDirectory) => CopyPlan::CreateAsFile,
        (DestinationState::NonDirectory, SourceShape::Directory) => CopyPlan::RejectDirIntoFile,
    }
}

/// Errors while resolving the two paths
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The source cannot be examined
    #[error("cannot stat source {}: {source}", path.display())]
    Source {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The destination cannot be examined
    #[error("cannot stat destination {}: {source}", path.display())]
    Destination {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A missing destination whose parent is not an existing directory
    #[error("no such directory: {}", path.display())]
    NoSuchDirectory { path: PathBuf },

    /// The path has no final component to copy to or from
    #[error("cannot copy {}: path has no final component", path.display())]
    NoFileName { path: PathBuf },

    /// A directory source onto an existing non-directory
    #[error("cannot copy directory {} onto non-directory {}", source_path.display(), dest_path.display())]
    DirectoryIntoFile {
        source_path: PathBuf,
        dest_path: PathBuf,
    },

    /// A directory copy whose destination lies inside the source
    #[error("cannot copy directory {} into itself ({})", source_path.display(), dest_path.display())]
    IntoItself {
        source_path: PathBuf,
        dest_path: PathBuf,
    },

    /// Source and destination are the same file
    #[error("{} and {} are the same file", source_path.display(), dest_path.display())]
    SameFile {
        source_path: PathBuf,
        dest_path: PathBuf,
    },

    /// A path component contains a nul byte
    #[error("invalid name {}: contains a nul byte", path.display())]
    InvalidName { path: PathBuf },

    /// Opening a parent directory failed
    #[error("cannot open directory: {0}")]
    Open(#[from] FsError),
}

/// Resolved input of the copy engine
#[derive(Debug)]
pub struct CopyRoot {
    /// The decision that produced this root
    pub plan: CopyPlan,
    /// Directory containing the source entry
    pub source_parent: DirectoryFd,
    /// Name of the source entry in `source_parent`
    pub source_name: CString,
    /// Directory receiving the copy
    pub dest_parent: DirectoryFd,
    /// Name of the copy in `dest_parent`
    pub dest_name: CString,
}

impl CopyRoot {
    /// Display path of the source entry
    pub fn source_path(&self) -> PathBuf {
        crate::node::entry_path(&self.source_parent, &self.source_name)
    }

    /// Display path of the destination entry
    pub fn dest_path(&self) -> PathBuf {
        crate::node::entry_path(&self.dest_parent, &self.dest_name)
    }
}

/// Classify `source` and `destination` and open the two parent directories
///
/// # Errors
///
/// Returns a [`ResolveError`] when the source is missing, the destination's
/// parent is not a directory, the plan is [`CopyPlan::RejectDirIntoFile`],
/// the copy would land inside the source directory or on the source itself,
/// or a parent directory cannot be opened.
pub fn plan_copy(source: &Path, destination: &Path) -> Result<CopyRoot, ResolveError> {
    let source_meta = fs::symlink_metadata(source).map_err(|e| ResolveError::Source {
        path: source.to_path_buf(),
        source: e,
    })?;
    let shape = if source_meta.is_dir() {
        SourceShape::Directory
    } else {
        SourceShape::NonDirectory
    };
    let (source_dir, source_name) = split_source(source)?;

    let state = destination_state(destination)?;
    let copy_plan = plan(shape, state);
    debug!("resolved {:?} onto {:?}: {:?}", shape, state, copy_plan);

    let (dest_dir, dest_name) = match copy_plan {
        CopyPlan::RejectDirIntoFile => {
            return Err(ResolveError::DirectoryIntoFile {
                source_path: source.to_path_buf(),
                dest_path: destination.to_path_buf(),
            })
        }
        CopyPlan::CopyIntoDirectory => (destination.to_path_buf(), source_name.clone()),
        CopyPlan::CreateAsFile | CopyPlan::CreateAsDirectory => {
            let name = destination
                .file_name()
                .ok_or_else(|| ResolveError::NoFileName {
                    path: destination.to_path_buf(),
                })?;
            (parent_or_current(destination), PathBuf::from(name))
        }
    };

    let final_dest = dest_dir.join(&dest_name);
    match shape {
        SourceShape::Directory => check_not_into_itself(source, &dest_dir, &dest_name)?,
        SourceShape::NonDirectory => check_not_same_file(&source_meta, source, &final_dest)?,
    }

    Ok(CopyRoot {
        plan: copy_plan,
        source_parent: DirectoryFd::open(&source_dir)?,
        source_name: to_cstring(&source_name)?,
        dest_parent: DirectoryFd::open(&dest_dir)?,
        dest_name: to_cstring(&dest_name)?,
    })
}

/// Split the source into (parent directory, final name)
///
/// Paths without a usable final component (`.`, `..`, `dir/..`) are
/// canonicalized first; `/` itself cannot be split.
fn split_source(source: &Path) -> Result<(PathBuf, PathBuf), ResolveError> {
    let source = match source.file_name() {
        Some(_) => source.to_path_buf(),
        None => fs::canonicalize(source).map_err(|e| ResolveError::Source {
            path: source.to_path_buf(),
            source: e,
        })?,
    };
    let name = source.file_name().ok_or_else(|| ResolveError::NoFileName {
        path: source.clone(),
    })?;
    Ok((parent_or_current(&source), PathBuf::from(name)))
}

fn destination_state(destination: &Path) -> Result<DestinationState, ResolveError> {
    match fs::metadata(destination) {
        Ok(meta) if meta.is_dir() => Ok(DestinationState::Directory),
        Ok(_) => Ok(DestinationState::NonDirectory),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            // A dangling symlink is an existing non-directory
            if fs::symlink_metadata(destination).is_ok() {
                return Ok(DestinationState::NonDirectory);
            }
            let parent = parent_or_current(destination);
            match fs::metadata(&parent) {
                Ok(meta) if meta.is_dir() => Ok(DestinationState::Missing),
                _ => Err(ResolveError::NoSuchDirectory { path: parent }),
            }
        }
        Err(e) => Err(ResolveError::Destination {
            path: destination.to_path_buf(),
            source: e,
        }),
    }
}

fn check_not_into_itself(
    source: &Path,
    dest_dir: &Path,
    dest_name: &Path,
) -> Result<(), ResolveError> {
    let canonical_source = fs::canonicalize(source).map_err(|e| ResolveError::Source {
        path: source.to_path_buf(),
        source: e,
    })?;
    let canonical_dest = fs::canonicalize(dest_dir)
        .map_err(|e| ResolveError::Destination {
            path: dest_dir.to_path_buf(),
            source: e,
        })?
        .join(dest_name);

    if canonical_dest.starts_with(&canonical_source) {
        return Err(ResolveError::IntoItself {
            source_path: source.to_path_buf(),
            dest_path: canonical_dest,
        });
    }
    Ok(())
}

fn check_not_same_file(
    source_meta: &fs::Metadata,
    source: &Path,
    final_dest: &Path,
) -> Result<(), ResolveError> {
    if let Ok(dest_meta) = fs::symlink_metadata(final_dest) {
        if dest_meta.dev() == source_meta.dev() && dest_meta.ino() == source_meta.ino() {
            return Err(ResolveError::SameFile {
                source_path: source.to_path_buf(),
                dest_path: final_dest.to_path_buf(),
            });
        }
    }
    Ok(())
}

/// Parent directory of `path`, with `.` for a bare name
fn parent_or_current(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn to_cstring(name: &Path) -> Result<CString, ResolveError> {
    CString::new(name.as_os_str().as_bytes()).map_err(|_| ResolveError::InvalidName {
        path: name.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case(SourceShape::NonDirectory, DestinationState::Missing, CopyPlan::CreateAsFile)]
    #[case(SourceShape::Directory, DestinationState::Missing, CopyPlan::CreateAsDirectory)]
    #[case(SourceShape::NonDirectory, DestinationState::NonDirectory, CopyPlan::CreateAsFile)]
    #[case(SourceShape::Directory, DestinationState::NonDirectory, CopyPlan::RejectDirIntoFile)]
    #[case(SourceShape::NonDirectory, DestinationState::Directory, CopyPlan::CopyIntoDirectory)]
    #[case(SourceShape::Directory, DestinationState::Directory, CopyPlan::CopyIntoDirectory)]
    fn test_plan_table(
        #[case] source: SourceShape,
        #[case] destination: DestinationState,
        #[case] expected: CopyPlan,
    ) {
        assert_eq!(plan(source, destination), expected);
    }

    #[test]
    fn test_missing_destination_directory_source() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("src")).unwrap();

        let root = plan_copy(&temp.path().join("src"), &temp.path().join("out/")).unwrap();
        assert_eq!(root.plan, CopyPlan::CreateAsDirectory);
        assert_eq!(root.source_name.to_str().unwrap(), "src");
        assert_eq!(root.dest_name.to_str().unwrap(), "out");
        assert_eq!(root.dest_path(), temp.path().join("out"));
    }

    #[test]
    fn test_copy_into_existing_directory() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), b"hi").unwrap();
        fs::create_dir(temp.path().join("dir")).unwrap();

        let root = plan_copy(&temp.path().join("a.txt"), &temp.path().join("dir")).unwrap();
        assert_eq!(root.plan, CopyPlan::CopyIntoDirectory);
        assert_eq!(root.dest_path(), temp.path().join("dir/a.txt"));
    }

    #[test]
    fn test_directory_onto_file_rejected() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("src")).unwrap();
        fs::write(temp.path().join("file"), b"").unwrap();

        let err = plan_copy(&temp.path().join("src"), &temp.path().join("file")).unwrap_err();
        assert!(matches!(err, ResolveError::DirectoryIntoFile { .. }));
    }

    #[test]
    fn test_missing_destination_parent() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a"), b"").unwrap();

        let err = plan_copy(&temp.path().join("a"), &temp.path().join("no/such/x")).unwrap_err();
        assert!(matches!(err, ResolveError::NoSuchDirectory { .. }));
    }

    #[test]
    fn test_missing_source() {
        let temp = TempDir::new().unwrap();
        let err = plan_copy(&temp.path().join("nope"), &temp.path().join("x")).unwrap_err();
        assert!(matches!(err, ResolveError::Source { .. }));
    }

    #[test]
    fn test_into_itself_rejected() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("src/inner")).unwrap();

        let err = plan_copy(&temp.path().join("src"), &temp.path().join("src/inner")).unwrap_err();
        assert!(matches!(err, ResolveError::IntoItself { .. }));
    }

    #[test]
    fn test_same_file_rejected() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a"), b"keep").unwrap();

        let err = plan_copy(&temp.path().join("a"), &temp.path().join("a")).unwrap_err();
        assert!(matches!(err, ResolveError::SameFile { .. }));
        let err = plan_copy(&temp.path().join("a"), temp.path()).unwrap_err();
        assert!(matches!(err, ResolveError::SameFile { .. }));
    }

    #[test]
    fn test_source_dotdot_is_canonicalized() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("src/sub")).unwrap();

        let (parent, name) = split_source(&temp.path().join("src/sub/..")).unwrap();
        assert_eq!(name, PathBuf::from("src"));
        assert_eq!(parent, fs::canonicalize(temp.path()).unwrap());
    }

    #[test]
    fn test_root_source_rejected() {
        let err = split_source(Path::new("/")).unwrap_err();
        assert!(matches!(err, ResolveError::NoFileName { .. }));
    }

    #[test]
    fn test_bare_name_parent_is_current_dir() {
        assert_eq!(parent_or_current(Path::new("a")), PathBuf::from("."));
        assert_eq!(parent_or_current(Path::new("x/a")), PathBuf::from("x"));
    }

    #[test]
    fn test_symlink_source_not_followed() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("real")).unwrap();
        std::os::unix::fs::symlink("real", temp.path().join("link")).unwrap();
        fs::write(temp.path().join("file"), b"").unwrap();

        // A link to a directory is a non-directory source, so it may overwrite a file
        let root = plan_copy(&temp.path().join("link"), &temp.path().join("file")).unwrap();
        assert_eq!(root.plan, CopyPlan::CreateAsFile);
    }
}

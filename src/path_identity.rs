//! Decide whether two configured paths name the same file
//!
//! The output files usually do not exist yet, so a path is resolved through
//! its parent directory: the parent is canonicalized (following symlinks and
//! `..`) and the file name joined back on. An existing file is canonicalized
//! directly, which also follows a symlink at the final component. A symlink
//! whose target is still missing is followed link by link first.

use crate::error::{PkiError, Result};
use std::fs;
use std::path::{Path, PathBuf};

const MAX_SYMLINK_HOPS: usize = 40;

/// True if `a` and `b` resolve to the same underlying file
///
/// # Errors
/// Returns [`PkiError::PathResolution`] if either path has no file name or
/// its parent directory is missing or inaccessible.
pub fn same_file(a: &Path, b: &Path) -> Result<bool> {
    let resolved_a = resolve(a)?;
    let resolved_b = resolve(b)?;

    if let (Ok(meta_a), Ok(meta_b)) = (fs::metadata(&resolved_a), fs::metadata(&resolved_b)) {
        return Ok(same_inode(&meta_a, &meta_b, &resolved_a, &resolved_b));
    }
    Ok(resolved_a == resolved_b)
}

#[cfg(unix)]
fn same_inode(a: &fs::Metadata, b: &fs::Metadata, _: &Path, _: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    a.dev() == b.dev() && a.ino() == b.ino()
}

#[cfg(not(unix))]
fn same_inode(_: &fs::Metadata, _: &fs::Metadata, a: &Path, b: &Path) -> bool {
    a == b
}

/// Absolute, symlink-free form of `path`, whether or not the file exists yet
///
/// A symlink whose target does not exist yet is followed by hand, so a key
/// path linking to a certificate path that is about to be created resolves
/// to that certificate path.
pub fn resolve(path: &Path) -> Result<PathBuf> {
    let mut current = path.to_path_buf();

    for _ in 0..MAX_SYMLINK_HOPS {
        if let Ok(canonical) = fs::canonicalize(&current) {
            return Ok(canonical);
        }

        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => {
                let target = fs::read_link(&current).map_err(|e| PkiError::PathResolution {
                    path: path.to_path_buf(),
                    reason: format!("cannot read symlink {:?}: {}", current, e),
                })?;
                // Relative targets are relative to the directory holding the link
                current = match current.parent() {
                    Some(parent) => parent.join(target),
                    None => target,
                };
            }
            _ => return resolve_through_parent(&current, path),
        }
    }

    Err(PkiError::PathResolution {
        path: path.to_path_buf(),
        reason: "too many levels of symbolic links".to_string(),
    })
}

/// Canonical parent joined with the file name, for a path that does not exist
fn resolve_through_parent(current: &Path, requested: &Path) -> Result<PathBuf> {
    let file_name = current.file_name().ok_or_else(|| PkiError::PathResolution {
        path: requested.to_path_buf(),
        reason: "path does not name a file".to_string(),
    })?;

    let parent = match current.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let canonical_parent = fs::canonicalize(parent).map_err(|e| PkiError::PathResolution {
        path: requested.to_path_buf(),
        reason: format!("parent directory {:?} is not accessible: {}", parent, e),
    })?;

    Ok(canonical_parent.join(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_same_path_is_same_file() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("service.pem");
        assert!(same_file(&missing, &missing).unwrap());

        fs::write(&missing, b"x").unwrap();
        assert!(same_file(&missing, &missing).unwrap());
    }

    #[test]
    fn test_distinct_paths() {
        let dir = tempdir().unwrap();
        let cert = dir.path().join("service.pem");
        let key = dir.path().join("service-key.pem");
        assert!(!same_file(&cert, &key).unwrap());
    }

    #[test]
    fn test_dot_segments_normalized() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let direct = dir.path().join("service.pem");
        let roundabout = dir.path().join("sub").join("..").join("service.pem");
        assert!(same_file(&direct, &roundabout).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_to_existing_file() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("service.pem");
        let link = dir.path().join("link.pem");
        fs::write(&target, b"x").unwrap();
        std::os::unix::fs::symlink(&target, &link).unwrap();
        assert!(same_file(&target, &link).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory() {
        let dir = tempdir().unwrap();
        let real = dir.path().join("real");
        let alias = dir.path().join("alias");
        fs::create_dir(&real).unwrap();
        std::os::unix::fs::symlink(&real, &alias).unwrap();
        assert!(same_file(&real.join("service.pem"), &alias.join("service.pem")).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_to_future_file() {
        let dir = tempdir().unwrap();
        let cert = dir.path().join("service.pem");
        let link = dir.path().join("key-link.pem");
        std::os::unix::fs::symlink(&cert, &link).unwrap();
        assert!(same_file(&cert, &link).unwrap());
        assert_eq!(resolve(&link).unwrap(), resolve(&cert).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_relative_dangling_symlink_chain() {
        let dir = tempdir().unwrap();
        let cert = dir.path().join("service.pem");
        let hop = dir.path().join("hop.pem");
        let link = dir.path().join("key-link.pem");
        std::os::unix::fs::symlink("service.pem", &hop).unwrap();
        std::os::unix::fs::symlink("hop.pem", &link).unwrap();
        assert!(same_file(&cert, &link).unwrap());
        assert!(!same_file(&dir.path().join("other.pem"), &link).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_is_error() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.pem");
        let b = dir.path().join("b.pem");
        std::os::unix::fs::symlink(&b, &a).unwrap();
        std::os::unix::fs::symlink(&a, &b).unwrap();
        assert!(matches!(
            resolve(&a),
            Err(PkiError::PathResolution { .. })
        ));
    }

    #[test]
    fn test_missing_parent_is_error() {
        let dir = tempdir().unwrap();
        let orphan = dir.path().join("nope").join("service.pem");
        let ok = dir.path().join("service.pem");
        assert!(matches!(
            same_file(&orphan, &ok),
            Err(PkiError::PathResolution { .. })
        ));
    }
}

//! Owner-only file output
//!
//! Every output file is created through [`create_secure`], which asks the
//! kernel for mode `0600` in the `open(2)` call itself. The file is never
//! visible with wider permissions and then narrowed. The one exception is a
//! pre-existing file, which keeps its inode; its permissions are narrowed
//! before any new byte lands in it.
//!
//! [`append_secure`] only ever extends a file that is already there. It is
//! how the service key joins the service certificate when both are
//! configured to live in the same file.

use crate::error::{PkiError, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

#[cfg(unix)]
const OWNER_READ_WRITE: u32 = 0o600;

/// Create (or replace) `path` with owner-only permissions and write `bytes`
///
/// An existing file is narrowed to `0600` first and only then emptied, so a
/// failed chmod leaves its previous contents in place.
///
/// # Errors
/// Returns [`PkiError::FileWrite`] if the parent directory is missing, the
/// path is not writable, or the write does not complete.
pub fn create_secure(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(false);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(OWNER_READ_WRITE);
    }

    let file = options.open(path).map_err(|e| PkiError::write(path, e))?;

    // mode() only applies to newly created files
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(OWNER_READ_WRITE))
            .map_err(|e| PkiError::write(path, e))?;
    }

    file.set_len(0).map_err(|e| PkiError::write(path, e))?;

    write_fully(file, path, bytes)
}

/// Append `bytes` to the existing file at `path`, leaving its permissions alone
///
/// # Errors
/// - [`PkiError::FileNotFound`] if `path` does not exist; nothing is created
/// - [`PkiError::FileWrite`] for any other open or write failure
pub fn append_secure(path: &Path, bytes: &[u8]) -> Result<()> {
    let file = OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => PkiError::FileNotFound(path.to_path_buf()),
            _ => PkiError::write(path, e),
        })?;

    write_fully(file, path, bytes)
}

fn write_fully(mut file: File, path: &Path, bytes: &[u8]) -> Result<()> {
    file.write_all(bytes).map_err(|e| PkiError::write(path, e))?;
    file.sync_all().map_err(|e| PkiError::write(path, e))?;
    Ok(())
}

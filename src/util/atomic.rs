//! Atomic file writing via tempfile + rename.
//!
//! The writer callback fills a [`tempfile::NamedTempFile`] created in the
//! same directory as the target, which is then renamed over the target. A
//! failure at any point leaves no partial artifact behind: the temp file is
//! removed on drop and the destination is never opened for writing.

use std::fs::File;
use std::path::Path;

use crate::error::{TailorError, TailorResult};

/// Atomically produce `path` from whatever `write` puts into the temp file.
///
/// # Errors
///
/// Returns an error if the temp file cannot be created, `write` fails, or the
/// final rename fails (e.g., cross-device).
pub fn atomic_write<F>(path: &Path, write: F) -> TailorResult<()>
where
    F: FnOnce(&mut File) -> TailorResult<()>,
{
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let io_err = |source| TailorError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(io_err)?;
    write(tmp.as_file_mut())?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    Ok(())
}

//! Atomic filesystem primitives shared by the cache store.
//!
//! Every persisted file in this crate's callers goes through
//! [`write_atomic`] or [`write_atomic_json`]: write to a sibling temporary
//! file, then rename it into place. A crash or a failed write never leaves
//! a half-written file at the destination path.

use std::io;
use std::path::Path;

use serde::Serialize;
use tracing::warn;

/// Create `dir` and all of its parents if they don't already exist.
pub fn create_dir_all(dir: impl AsRef<Path>) -> io::Result<()> {
    fs_err::create_dir_all(dir)
}

/// Write `contents` to `path` atomically.
///
/// The parent directory is created if missing. On failure, the previous
/// contents of `path` (if any) are left untouched; the temporary file is
/// cleaned up and the error is returned to the caller to log and recover
/// from, never panicking.
pub fn write_atomic(path: impl AsRef<Path>, contents: &[u8]) -> io::Result<()> {
    let path = path.as_ref();
    let Some(dir) = path.parent() else {
        return fs_err::write(path, contents);
    };
    fs_err::create_dir_all(dir)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".esios-tmp-")
        .tempfile_in(dir)?;
    io::Write::write_all(&mut tmp, contents)?;
    tmp.as_file().sync_all()?;

    match tmp.persist(path) {
        Ok(_) => Ok(()),
        Err(err) => {
            warn!(path = %path.display(), error = %err.error, "atomic rename failed, leaving prior file intact");
            Err(err.error)
        }
    }
}

/// Serialize `value` as pretty JSON and write it atomically.
pub fn write_atomic_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> io::Result<()> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    write_atomic(path, &bytes)
}

/// Read and deserialize a JSON file, returning `None` on any I/O or parse
/// error. Corrupt files are left in place here — the caller decides whether
/// to delete them (see `esios_cache`'s read-then-delete-on-corruption policy).
pub fn read_json<T: serde::de::DeserializeOwned>(path: impl AsRef<Path>) -> Option<T> {
    let bytes = fs_err::read(path.as_ref()).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Remove `path` if it exists, ignoring a "not found" error.
pub fn remove_file_if_exists(path: impl AsRef<Path>) -> io::Result<()> {
    match fs_err::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

/// Recursively remove `dir`'s children, then prune now-empty directories
/// up to (but not including) `stop_at`. Returns the number of files removed.
pub fn remove_tree_pruning_empty_dirs(dir: &Path, stop_at: &Path) -> io::Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in walkdir::WalkDir::new(dir).contents_first(true) {
        let entry = entry.map_err(io::Error::from)?;
        let path = entry.path();
        if entry.file_type().is_dir() {
            // `read_dir` fails silently if the directory isn't empty; that's fine,
            // it means a file we don't own lives there.
            let _ = fs_err::remove_dir(path);
        } else {
            fs_err::remove_file(path)?;
            removed += 1;
        }
    }

    let mut parent = dir.parent();
    while let Some(p) = parent {
        if p == stop_at || !p.starts_with(stop_at) {
            break;
        }
        if fs_err::remove_dir(p).is_err() {
            break;
        }
        parent = p.parent();
    }

    Ok(removed)
}

/// True if `dir` exists and contains at least one entry.
pub fn dir_is_non_empty(dir: impl AsRef<Path>) -> bool {
    fs_err::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// Recursively copy every entry under `src` into `dst`, preserving the
/// relative directory structure. Intermediate directories are created as
/// needed; a missing `src` is a no-op.
pub fn copy_tree(src: &Path, dst: &Path) -> io::Result<()> {
    if !src.exists() {
        return Ok(());
    }
    for entry in walkdir::WalkDir::new(src) {
        let entry = entry.map_err(io::Error::from)?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .expect("walkdir yields only descendants of its own root");
        if rel.as_os_str().is_empty() {
            continue;
        }
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs_err::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs_err::create_dir_all(parent)?;
            }
            fs_err::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

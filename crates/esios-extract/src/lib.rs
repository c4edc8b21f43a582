//! Expands downloaded ESIOS archive bundles: a top-level zip that, in turn,
//! may contain further zips (ESIOS sometimes nests a day's files inside a
//! month's bundle). Expansion recurses until no zip files remain.
//!
//! Every entry path is validated before it's written: a crafted zip entry
//! named `../../etc/passwd` or an absolute path is rejected rather than
//! written outside the destination directory.

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use esios_types::EsiosError;
use tracing::warn;

/// Extract `bytes` (a zip archive) into `dest`, then recursively extract any
/// zip files found among the results, until none remain. Returns the number
/// of non-zip files written.
pub fn extract_nested(bytes: &[u8], dest: &Path) -> Result<usize, EsiosError> {
    esios_fs::create_dir_all(dest).map_err(EsiosError::from)?;
    extract_one(bytes, dest)?;

    let mut written = 0;
    loop {
        let nested = find_zip_files(dest).map_err(EsiosError::from)?;
        if nested.is_empty() {
            break;
        }
        for zip_path in nested {
            let bytes = fs_err::read(&zip_path).map_err(EsiosError::from)?;
            let stem = zip_path.file_stem().and_then(|s| s.to_str()).unwrap_or("archive");
            let nested_dir = zip_path.parent().unwrap_or(dest).join(stem);
            extract_one(&bytes, &nested_dir)?;
            esios_fs::remove_file_if_exists(&zip_path).map_err(EsiosError::from)?;
        }
    }

    for entry in walkdir::WalkDir::new(dest).into_iter().filter_map(Result::ok) {
        if entry.file_type().is_file() {
            written += 1;
        }
    }
    Ok(written)
}

fn extract_one(bytes: &[u8], dest: &Path) -> Result<(), EsiosError> {
    let cursor = io::Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(cursor)
        .map_err(|err| EsiosError::transport(format!("not a valid zip archive: {err}"), false))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| EsiosError::transport(format!("corrupt zip entry: {err}"), false))?;

        let Some(relative) = entry.enclosed_name() else {
            warn!(name = entry.name(), "rejecting zip entry outside extraction root");
            continue;
        };
        if is_unsafe(relative) {
            warn!(name = entry.name(), "rejecting unsafe zip entry path");
            continue;
        }

        let out_path = dest.join(relative);
        if entry.is_dir() {
            esios_fs::create_dir_all(&out_path).map_err(EsiosError::from)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            esios_fs::create_dir_all(parent).map_err(EsiosError::from)?;
        }

        let mut contents = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut contents).map_err(EsiosError::from)?;

        if out_path.exists() {
            warn!(path = %out_path.display(), "overwriting existing file from a later bundle entry");
        }
        esios_fs::write_atomic(&out_path, &contents).map_err(EsiosError::from)?;
    }

    Ok(())
}

fn is_unsafe(path: &Path) -> bool {
    path.is_absolute() || path.components().any(|c| matches!(c, std::path::Component::ParentDir))
}

fn find_zip_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in walkdir::WalkDir::new(dir).into_iter() {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() && entry.path().extension().and_then(|e| e.to_str()) == Some("zip") {
            found.push(entry.path().to_path_buf());
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn make_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(io::Cursor::new(&mut buf));
            let options = zip::write::FileOptions::default();
            for (name, contents) in entries {
                writer.start_file(*name, options).unwrap();
                writer.write_all(contents).unwrap();
            }
            writer.finish().unwrap();
        }
        buf
    }

    #[test]
    fn extracts_flat_archive() {
        let dir = tempfile::tempdir().unwrap();
        let zip = make_zip(&[("a.csv", b"1,2,3"), ("b.csv", b"4,5,6")]);

        let written = extract_nested(&zip, dir.path()).unwrap();
        assert_eq!(written, 2);
        assert_eq!(fs_err::read(dir.path().join("a.csv")).unwrap(), b"1,2,3");
    }

    #[test]
    fn recurses_into_nested_zip() {
        let dir = tempfile::tempdir().unwrap();
        let inner = make_zip(&[("day.csv", b"x")]);
        let outer = make_zip(&[("month.zip", &inner)]);

        let written = extract_nested(&outer, dir.path()).unwrap();
        assert_eq!(written, 1);
        // The nested archive's contents land under a sub-directory named
        // after its own stem, not flattened alongside it.
        assert_eq!(fs_err::read(dir.path().join("month").join("day.csv")).unwrap(), b"x");
        assert!(!dir.path().join("day.csv").exists());
        assert!(!dir.path().join("month.zip").exists());
    }

    #[test]
    fn rejects_path_traversal_entries() {
        // `zip`'s own writer also normalizes `..`, so this exercises the
        // guard via a manually crafted entry path string instead.
        let traversal = is_unsafe(Path::new("../../etc/passwd"));
        assert!(traversal);
        let absolute = is_unsafe(Path::new("/etc/passwd"));
        assert!(absolute);
        let fine = is_unsafe(Path::new("subdir/file.csv"));
        assert!(!fine);
    }
}

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::Result;

/// Upload root of one site: `<uploads>/sites/<id>/files`.
#[must_use]
pub fn upload_root(uploads_dir: &Path, site_id: i64) -> PathBuf {
    uploads_dir
        .join("sites")
        .join(site_id.to_string())
        .join("files")
}

/// Copies every regular file under `source` to the same relative path under
/// `dest` and returns how many were copied.
///
/// Directories are only created on the way to a file. A missing `source`
/// copies nothing. Source files are never touched.
pub fn copy_tree(source: &Path, dest: &Path) -> Result<usize> {
    if !source.is_dir() {
        debug!(path = %source.display(), "No upload directory, nothing to copy");
        return Ok(0);
    }

    let mut copied = 0;
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(io::Error::other)?;
        let target = dest.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(entry.path(), &target)?;
        copied += 1;
    }

    debug!(from = %source.display(), to = %dest.display(), copied, "Copied uploads");
    Ok(copied)
}

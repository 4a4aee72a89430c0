// src/fsutil.rs

//! Directory copy and relocation helpers

use crate::error::{Error, Result};
use std::fs;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Copy the tree at `src` to `dst`, creating `dst`
///
/// Symlinks are not followed; they are skipped.
pub fn copy_dir_all(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry
            .map_err(|e| Error::IoError(format!("Failed to walk {}: {}", src.display(), e)))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| Error::IoError(format!("{}: {}", entry.path().display(), e)))?;
        let target = dst.join(relative);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| Error::io("Failed to create", &target, e))?;
        } else if file_type.is_file() {
            fs::copy(entry.path(), &target).map_err(|e| {
                Error::IoError(format!(
                    "Failed to copy {} to {}: {}",
                    entry.path().display(),
                    target.display(),
                    e
                ))
            })?;
        } else {
            debug!("Skipping non-regular file {}", entry.path().display());
        }
    }
    Ok(())
}

/// Move the directory `src` to `dst`
///
/// Falls back to copy and delete when a rename is not possible, e.g. across
/// filesystems. `dst` must not exist.
pub fn move_dir(src: &Path, dst: &Path) -> Result<()> {
    if dst.exists() {
        return Err(Error::StateError(format!("{} already exists", dst.display())));
    }
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io("Failed to create", parent, e))?;
    }

    if let Err(e) = fs::rename(src, dst) {
        debug!(
            "Rename of {} failed ({}), copying instead",
            src.display(),
            e
        );
        copy_dir_all(src, dst)?;
        fs::remove_dir_all(src).map_err(|e| Error::io("Failed to remove", src, e))?;
    }
    Ok(())
}

/// Copy a single file, creating the parent directory of `dst`
pub fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io("Failed to create", parent, e))?;
    }
    fs::copy(src, dst).map_err(|e| {
        Error::IoError(format!(
            "Failed to copy {} to {}: {}",
            src.display(),
            dst.display(),
            e
        ))
    })?;
    Ok(())
}

/// True when `dir` does not exist or has no entries
pub fn is_empty_or_absent(dir: &Path) -> Result<bool> {
    if !dir.exists() {
        return Ok(true);
    }
    let mut entries = fs::read_dir(dir).map_err(|e| Error::io("Failed to list", dir, e))?;
    Ok(entries.next().is_none())
}

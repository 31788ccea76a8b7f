use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::model::{MediaKind, MediaUnit};
use crate::scan::is_media_path;

/// Physical delete/copy capabilities.
///
/// The synchronizer only ever mutates the filesystem through this trait, so
/// a dry run swaps in [`NullFileOps`] while every bit of catalog
/// bookkeeping, random selection, and diffing stays identical to a live run.
pub trait FileOps {
    fn delete(&self, base: &Path, unit: &MediaUnit) -> Result<()>;
    fn copy(&self, src_base: &Path, dst_base: &Path, unit: &MediaUnit) -> Result<()>;
}

/// Performs real filesystem operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiveFileOps;

impl FileOps for LiveFileOps {
    fn delete(&self, base: &Path, unit: &MediaUnit) -> Result<()> {
        delete_unit(base, unit)
    }

    fn copy(&self, src_base: &Path, dst_base: &Path, unit: &MediaUnit) -> Result<()> {
        copy_unit(src_base, dst_base, unit)
    }
}

/// Touches nothing. Injected for dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullFileOps;

impl FileOps for NullFileOps {
    fn delete(&self, _base: &Path, _unit: &MediaUnit) -> Result<()> {
        Ok(())
    }

    fn copy(&self, _src_base: &Path, _dst_base: &Path, _unit: &MediaUnit) -> Result<()> {
        Ok(())
    }
}

/// Removes a unit from disk, then prunes now-empty ancestor directories
/// upward until the first non-empty one. `base` itself is never removed.
fn delete_unit(base: &Path, unit: &MediaUnit) -> Result<()> {
    let full = base.join(&unit.path);
    let metadata =
        fs::metadata(&full).with_context(|| format!("failed to stat {}", full.display()))?;
    if metadata.is_dir() {
        fs::remove_dir_all(&full)
            .with_context(|| format!("failed to remove directory {}", full.display()))?;
    } else {
        fs::remove_file(&full)
            .with_context(|| format!("failed to remove file {}", full.display()))?;
    }

    let mut current = unit.path.parent();
    while let Some(dir_rel) = current {
        if dir_rel.as_os_str().is_empty() {
            break;
        }
        let dir_full = base.join(dir_rel);
        let mut entries = fs::read_dir(&dir_full)
            .with_context(|| format!("failed to list {}", dir_full.display()))?;
        if entries.next().is_some() {
            break;
        }
        fs::remove_dir(&dir_full)
            .with_context(|| format!("failed to remove directory {}", dir_full.display()))?;
        current = dir_rel.parent();
    }
    Ok(())
}

fn copy_unit(src_base: &Path, dst_base: &Path, unit: &MediaUnit) -> Result<()> {
    let src = src_base.join(&unit.path);
    let dst = dst_base.join(&unit.path);

    match unit.kind {
        MediaKind::File => {
            if let Some(parent) = dst.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            fs::copy(&src, &dst).with_context(|| {
                format!("failed to copy {} to {}", src.display(), dst.display())
            })?;
            Ok(())
        }
        MediaKind::Album => {
            // Leftovers from an earlier partial run are replaced wholesale.
            if dst.is_dir() {
                fs::remove_dir_all(&dst)
                    .with_context(|| format!("failed to clear {}", dst.display()))?;
            }
            copy_album_tree(&src, &dst)
        }
    }
}

/// Recursively copies an album directory, skipping files whose extension is
/// not a recognized media extension.
fn copy_album_tree(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).with_context(|| format!("failed to create {}", dst.display()))?;
    let reader =
        fs::read_dir(src).with_context(|| format!("failed to list {}", src.display()))?;

    for entry in reader {
        let entry = entry.with_context(|| format!("failed to read entry in {}", src.display()))?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let metadata = fs::metadata(&from)
            .with_context(|| format!("failed to stat {}", from.display()))?;
        if metadata.is_dir() {
            copy_album_tree(&from, &to)?;
        } else if is_media_path(&from) {
            fs::copy(&from, &to).with_context(|| {
                format!("failed to copy {} to {}", from.display(), to.display())
            })?;
        }
    }
    Ok(())
}

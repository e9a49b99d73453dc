//! Copying source files into the output tree.
//!
//! Staleness is a single timestamp comparison: a target is rewritten when it
//! is missing or its mtime is older than the source's. Nothing is hashed.
//!
//! ```text
//! source/style/main.css   →  generated/style/main.css
//! source/images/          →  generated/images/      (recursive)
//! source/favicon.ico      →  generated/favicon.ico  (a file keeps its name)
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Failed to copy {} to {}: {source}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
    #[error("Failed to walk {}: {source}", root.display())]
    Walk {
        root: PathBuf,
        source: walkdir::Error,
    },
}

/// Whether `target` exists and is at least as new as `source`.
pub fn is_up_to_date(source: &Path, target: &Path) -> bool {
    let modified = |p: &Path| fs::metadata(p).and_then(|m| m.modified());
    match (modified(source), modified(target)) {
        (Ok(src), Ok(dst)) => dst >= src,
        _ => false,
    }
}

/// Copy `source` to `target` unless the target is up to date. Returns
/// whether a copy happened.
pub fn copy_if_stale(source: &Path, target: &Path) -> Result<bool, SyncError> {
    if is_up_to_date(source, target) {
        log::debug!("Up to date: {}", target.display());
        return Ok(false);
    }
    let copy_err = |e| SyncError::Copy {
        from: source.to_path_buf(),
        to: target.to_path_buf(),
        source: e,
    };
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(copy_err)?;
    }
    fs::copy(source, target).map_err(copy_err)?;
    log::info!("{} -> {}", source.display(), target.display());
    Ok(true)
}

/// Copy every configured static path into `output`. Returns the number of
/// files written. Missing paths are logged and skipped.
pub fn sync_static_paths(paths: &[PathBuf], output: &Path) -> Result<usize, SyncError> {
    let mut copied = 0;
    for path in paths {
        let Some(name) = path.file_name() else {
            log::warn!("Static path {} has no name, skipping", path.display());
            continue;
        };
        if path.is_file() {
            copied += usize::from(copy_if_stale(path, &output.join(name))?);
        } else if path.is_dir() {
            copied += sync_dir(path, &output.join(name))?;
        } else {
            log::warn!("Static path {} does not exist, skipping", path.display());
        }
    }
    Ok(copied)
}

fn sync_dir(src: &Path, dst: &Path) -> Result<usize, SyncError> {
    let mut copied = 0;
    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry.map_err(|e| SyncError::Walk {
            root: src.to_path_buf(),
            source: e,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        copied += usize::from(copy_if_stale(entry.path(), &dst.join(relative))?);
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::write_file;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn set_mtime(path: &Path, time: SystemTime) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(time).unwrap();
    }

    #[test]
    fn missing_target_is_stale() {
        let tmp = TempDir::new().unwrap();
        let src = write_file(&tmp.path().join("a.txt"), "a");
        assert!(!is_up_to_date(&src, &tmp.path().join("b.txt")));
    }

    #[test]
    fn older_target_is_stale() {
        let tmp = TempDir::new().unwrap();
        let src = write_file(&tmp.path().join("a.txt"), "new");
        let dst = write_file(&tmp.path().join("b.txt"), "old");
        let now = SystemTime::now();
        set_mtime(&dst, now - Duration::from_secs(60));
        set_mtime(&src, now);
        assert!(!is_up_to_date(&src, &dst));
        assert!(copy_if_stale(&src, &dst).unwrap());
        assert_eq!(fs::read_to_string(&dst).unwrap(), "new");
    }

    #[test]
    fn newer_target_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let src = write_file(&tmp.path().join("a.txt"), "source");
        let dst = write_file(&tmp.path().join("b.txt"), "kept");
        let now = SystemTime::now();
        set_mtime(&src, now - Duration::from_secs(60));
        set_mtime(&dst, now);
        assert!(!copy_if_stale(&src, &dst).unwrap());
        assert_eq!(fs::read_to_string(&dst).unwrap(), "kept");
    }

    #[test]
    fn static_dirs_and_files() {
        let tmp = TempDir::new().unwrap();
        let style = tmp.path().join("src/style");
        write_file(&style.join("main.css"), "body{}");
        write_file(&style.join("fonts/a.woff"), "font");
        let icon = write_file(&tmp.path().join("src/favicon.ico"), "ico");
        let out = tmp.path().join("out");

        let copied = sync_static_paths(
            &[style, icon, tmp.path().join("src/missing")],
            &out,
        )
        .unwrap();
        assert_eq!(copied, 3);
        assert!(out.join("style/main.css").is_file());
        assert!(out.join("style/fonts/a.woff").is_file());
        assert!(out.join("favicon.ico").is_file());
    }

    #[test]
    fn second_sync_copies_nothing() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("images");
        write_file(&dir.join("a.png"), "png");
        let out = tmp.path().join("out");
        assert_eq!(sync_static_paths(std::slice::from_ref(&dir), &out).unwrap(), 1);
        assert_eq!(sync_static_paths(&[dir], &out).unwrap(), 0);
    }
}

// Copies a day's images off the network drive into the local work directory.

use std::fs;
use std::path::Path;
use timelapse_common::candidate::has_extension;
use tracing::{error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    #[error("failed to create destination {0}: {1}")]
    CreateDestination(String, std::io::Error),
    #[error("failed to list {0}: {1}")]
    ListSource(String, std::io::Error),
    #[error("failed to clear stale image {0}: {1}")]
    ClearStale(String, std::io::Error),
}

/// Copy every `extension` file from `source_dir` into `dest_dir`, keeping
/// modification times so the copies still sort by capture time.
///
/// Files left in `dest_dir` by an earlier day are removed first, so a kept
/// folder never leaks old frames into a new video. A missing source
/// directory is logged and yields zero files; the build step then reports
/// that there is nothing to do. Individual files that fail to copy are
/// logged and skipped.
pub fn copy_day_images(
    source_dir: &Path,
    dest_dir: &Path,
    extension: &str,
) -> Result<usize, AcquireError> {
    if !dest_dir.exists() {
        fs::create_dir_all(dest_dir)
            .map_err(|e| AcquireError::CreateDestination(dest_dir.display().to_string(), e))?;
        info!(path = %dest_dir.display(), "created destination folder");
    } else {
        let removed = clear_stale_files(dest_dir)?;
        if removed > 0 {
            info!(path = %dest_dir.display(), removed, "removed images left from an earlier run");
        }
    }

    info!(
        source = %source_dir.display(),
        destination = %dest_dir.display(),
        "copying images from network drive"
    );

    if !source_dir.is_dir() {
        error!(source = %source_dir.display(), "source directory does not exist");
        return Ok(0);
    }

    let entries = fs::read_dir(source_dir)
        .map_err(|e| AcquireError::ListSource(source_dir.display().to_string(), e))?;

    let mut copied = 0;
    let mut failed = 0;
    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(source = %source_dir.display(), error = %e, "failed to read directory entry");
                failed += 1;
                continue;
            }
        };
        let source = entry.path();
        if !source.is_file() || !has_extension(&source, extension) {
            continue;
        }

        let dest = dest_dir.join(entry.file_name());
        match copy_preserving_mtime(&source, &dest) {
            Ok(()) => copied += 1,
            Err(e) => {
                warn!(file = %source.display(), error = %e, "failed to copy image, skipping");
                failed += 1;
            }
        }
    }

    info!(copied, failed, "copied images for timelapse creation");
    Ok(copied)
}

fn clear_stale_files(dir: &Path) -> Result<usize, AcquireError> {
    let entries =
        fs::read_dir(dir).map_err(|e| AcquireError::ListSource(dir.display().to_string(), e))?;
    let mut removed = 0;
    for entry in entries {
        let path = entry
            .map_err(|e| AcquireError::ListSource(dir.display().to_string(), e))?
            .path();
        if path.is_file() {
            fs::remove_file(&path)
                .map_err(|e| AcquireError::ClearStale(path.display().to_string(), e))?;
            removed += 1;
        }
    }
    Ok(removed)
}

fn copy_preserving_mtime(source: &Path, dest: &Path) -> std::io::Result<()> {
    fs::copy(source, dest)?;
    let modified = fs::metadata(source)?.modified()?;
    filetime::set_file_mtime(dest, filetime::FileTime::from_system_time(modified))
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;

    #[test]
    fn copies_matching_files_with_mtime() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let dest_dir = dst.path().join("cam_temp_images");

        let img = src.path().join("12-00-00.jpg");
        fs::write(&img, b"jpeg").unwrap();
        filetime::set_file_mtime(&img, FileTime::from_unix_time(1_700_000_123, 0)).unwrap();
        fs::write(src.path().join("12-00-30.avi"), b"movie").unwrap();
        fs::create_dir(src.path().join("thumbs.jpg")).unwrap();

        let copied = copy_day_images(src.path(), &dest_dir, "jpg").unwrap();
        assert_eq!(copied, 1);

        let copy = dest_dir.join("12-00-00.jpg");
        assert_eq!(fs::read(&copy).unwrap(), b"jpeg");
        let mtime = FileTime::from_last_modification_time(&fs::metadata(&copy).unwrap());
        assert_eq!(mtime.unix_seconds(), 1_700_000_123);
        assert!(!dest_dir.join("12-00-30.avi").exists());
    }

    #[test]
    fn stale_images_are_cleared_before_copying() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let dest_dir = dst.path().join("cam_temp_images");
        fs::create_dir(&dest_dir).unwrap();
        fs::write(dest_dir.join("yesterday.jpg"), b"old").unwrap();
        fs::write(src.path().join("today.jpg"), b"new").unwrap();

        let copied = copy_day_images(src.path(), &dest_dir, "jpg").unwrap();

        assert_eq!(copied, 1);
        assert!(!dest_dir.join("yesterday.jpg").exists());
        assert!(dest_dir.join("today.jpg").exists());
    }

    #[test]
    fn missing_source_copies_nothing() {
        let dst = tempfile::tempdir().unwrap();
        let dest_dir = dst.path().join("images");
        let copied = copy_day_images(&dst.path().join("absent"), &dest_dir, "jpg").unwrap();
        assert_eq!(copied, 0);
        assert!(dest_dir.is_dir());
    }
}

use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

/// A still image found in a day folder, ordered by its modification time.
///
/// Files are copied off the network drive with their timestamps preserved, so
/// the mtime stands in for the capture time. File names from the camera are
/// not guaranteed to sort chronologically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCandidate {
    pub path: PathBuf,
    pub modified: SystemTime,
}

impl ImageCandidate {
    pub fn new(path: PathBuf, modified: SystemTime) -> Self {
        Self { path, modified }
    }

    /// File name for logging, falling back to the full path.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

impl Ord for ImageCandidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.modified
            .cmp(&other.modified)
            .then_with(|| self.path.cmp(&other.path))
    }
}

impl PartialOrd for ImageCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Returns true if `path` has the given extension (no leading dot), ignoring case.
pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

/// List the files in `folder` with `extension`, oldest first.
///
/// Subdirectories are ignored. Entries whose metadata cannot be read are
/// logged and skipped; failing to read the folder itself is an error.
pub fn scan_folder(folder: &Path, extension: &str) -> std::io::Result<Vec<ImageCandidate>> {
    let mut candidates = Vec::new();

    for entry in std::fs::read_dir(folder)? {
        let entry = entry?;
        let path = entry.path();
        if !has_extension(&path, extension) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to stat image, skipping");
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }

        let modified = match metadata.modified() {
            Ok(t) => t,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "no modification time, skipping");
                continue;
            }
        };

        candidates.push(ImageCandidate::new(path, modified));
    }

    candidates.sort();
    debug!(folder = %folder.display(), count = candidates.len(), "scanned image folder");
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{set_file_mtime, FileTime};

    fn touch(dir: &Path, name: &str, unix_secs: i64) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"x").unwrap();
        set_file_mtime(&path, FileTime::from_unix_time(unix_secs, 0)).unwrap();
        path
    }

    #[test]
    fn sorts_by_mtime_not_name() {
        let dir = tempfile::tempdir().unwrap();
        let c = touch(dir.path(), "a.jpg", 1_700_000_300);
        let a = touch(dir.path(), "b.jpg", 1_700_000_100);
        let b = touch(dir.path(), "c.jpg", 1_700_000_200);

        let found: Vec<PathBuf> = scan_folder(dir.path(), "jpg")
            .unwrap()
            .into_iter()
            .map(|c| c.path)
            .collect();
        assert_eq!(found, vec![a, b, c]);
    }

    #[test]
    fn equal_mtimes_fall_back_to_name() {
        let dir = tempfile::tempdir().unwrap();
        let second = touch(dir.path(), "02.jpg", 1_700_000_000);
        let first = touch(dir.path(), "01.jpg", 1_700_000_000);

        let found: Vec<PathBuf> = scan_folder(dir.path(), "jpg")
            .unwrap()
            .into_iter()
            .map(|c| c.path)
            .collect();
        assert_eq!(found, vec![first, second]);
    }

    #[test]
    fn filters_extension_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "keep.JPG", 1_700_000_000);
        touch(dir.path(), "skip.png", 1_700_000_000);
        touch(dir.path(), "notes.txt", 1_700_000_000);
        std::fs::create_dir(dir.path().join("nested.jpg")).unwrap();

        let found = scan_folder(dir.path(), "jpg").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name(), "keep.JPG");
    }

    #[test]
    fn missing_folder_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(scan_folder(&dir.path().join("absent"), "jpg").is_err());
    }
}

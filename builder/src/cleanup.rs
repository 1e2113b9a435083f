use std::path::Path;
use timelapse_common::retry::RetryPolicy;
use tracing::{debug, error, info};

/// Counts from one cleanup run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub files_deleted: usize,
    pub files_failed: usize,
    pub dirs_removed: usize,
}

/// Delete the copied images and the encoded video, then their directories.
///
/// Each file deletion is retried under `policy`, since the video may still be
/// held open by an uploader or a sync client. Directory removal failures are
/// logged and counted but never fatal.
pub async fn delete_artifacts(
    image_dir: &Path,
    video_dir: &Path,
    policy: &RetryPolicy,
) -> CleanupReport {
    let mut report = CleanupReport::default();

    for dir in [image_dir, video_dir] {
        if dir.exists() {
            delete_files_in(dir, policy, &mut report).await;
        }
    }

    for dir in [image_dir, video_dir] {
        if !dir.exists() {
            continue;
        }
        match tokio::fs::remove_dir(dir).await {
            Ok(()) => {
                info!(path = %dir.display(), "deleted folder");
                report.dirs_removed += 1;
            }
            Err(e) => error!(path = %dir.display(), error = %e, "failed to delete folder"),
        }
    }

    report
}

async fn delete_files_in(dir: &Path, policy: &RetryPolicy, report: &mut CleanupReport) {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            error!(path = %dir.display(), error = %e, "failed to list folder for cleanup");
            return;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                error!(path = %dir.display(), error = %e, "failed to read folder entry");
                break;
            }
        };
        let path = entry.path();
        let what = path.display().to_string();
        match policy.run(&what, || tokio::fs::remove_file(&path)).await {
            Ok(()) => {
                debug!(path = what, "deleted file");
                report.files_deleted += 1;
            }
            Err(_) => report.files_failed += 1,
        }
    }
}

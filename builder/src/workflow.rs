use std::path::PathBuf;
use timelapse_common::config::{CameraConfig, Config};
use timelapse_common::retry::RetryPolicy;
use tracing::{info, warn};

use crate::acquire::{copy_day_images, AcquireError};
use crate::cleanup::{delete_artifacts, CleanupReport};
use crate::filter::traits::FrameFilter;
use crate::storage::{StorageError, VideoStorage};
use crate::timelapse::encoder::VideoBackend;
use crate::timelapse::keys::{image_dir_name, video_dir_name, video_file_name, video_key};
use crate::timelapse::{EmptyReason, Outcome, TimelapseBuilder, TimelapseError};

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("failed to create {0}: {1}")]
    CreateDir(String, std::io::Error),
    #[error(transparent)]
    Acquire(#[from] AcquireError),
    #[error(transparent)]
    Timelapse(#[from] TimelapseError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("camera {0} needs uploading but no [storage] section is configured")]
    StorageNotConfigured(String),
}

/// Local paths used while processing one camera-day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraPaths {
    pub image_dir: PathBuf,
    pub video_dir: PathBuf,
    pub video_path: PathBuf,
}

impl CameraPaths {
    pub fn new(config: &Config, camera: &CameraConfig, date: &str) -> Self {
        let image_dir = config.work_dir.join(image_dir_name(&camera.name));
        let video_dir = config.work_dir.join(video_dir_name(&camera.name));
        let video_path = video_dir.join(video_file_name(date));
        Self {
            image_dir,
            video_dir,
            video_path,
        }
    }
}

/// What happened for one camera-day.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraReport {
    pub copied: usize,
    pub outcome: Outcome,
    pub uploaded_key: Option<String>,
    pub cleanup: Option<CleanupReport>,
}

/// Runs the daily steps for each camera: copy, build, upload, clean up.
pub struct Workflow<'a, B: VideoBackend> {
    config: &'a Config,
    filter: &'a dyn FrameFilter,
    backend: &'a B,
    storage: Option<&'a VideoStorage>,
}

impl<'a, B: VideoBackend> Workflow<'a, B> {
    pub fn new(
        config: &'a Config,
        filter: &'a dyn FrameFilter,
        backend: &'a B,
        storage: Option<&'a VideoStorage>,
    ) -> Self {
        Self {
            config,
            filter,
            backend,
            storage,
        }
    }

    pub async fn run_camera(
        &self,
        camera: &CameraConfig,
        date: &str,
    ) -> Result<CameraReport, WorkflowError> {
        if !camera.skip_upload && self.storage.is_none() {
            return Err(WorkflowError::StorageNotConfigured(camera.name.clone()));
        }

        let paths = CameraPaths::new(self.config, camera, date);
        for dir in [&paths.image_dir, &paths.video_dir] {
            std::fs::create_dir_all(dir)
                .map_err(|e| WorkflowError::CreateDir(dir.display().to_string(), e))?;
        }

        let timelapse = &self.config.timelapse;
        let copied = copy_day_images(
            &camera.source_dir(date),
            &paths.image_dir,
            timelapse.extension(),
        )?;

        let outcome = TimelapseBuilder::new(
            self.filter,
            self.backend,
            timelapse.extension(),
            timelapse.fps,
        )
        .build(&paths.image_dir, &paths.video_path)
        .await?;

        let uploaded_key = match (&outcome, self.storage) {
            (Outcome::Produced { path, .. }, Some(storage)) if !camera.skip_upload => {
                let key = video_key(storage.prefix(), &camera.name, date);
                storage.put_video(&key, path).await?;
                Some(key)
            }
            (Outcome::NothingProduced(EmptyReason::NoImages), _) => {
                warn!(camera = camera.name, date, "no images for this day, nothing to upload");
                None
            }
            (Outcome::NothingProduced(EmptyReason::AllInvalid { total, unreadable }), _) => {
                warn!(
                    camera = camera.name,
                    date,
                    total,
                    unreadable,
                    "every image was rejected, nothing to upload"
                );
                None
            }
            _ => {
                info!(camera = camera.name, "upload skipped by configuration");
                None
            }
        };

        let cleanup = if camera.delete_on_success {
            let policy = RetryPolicy::from_config(&self.config.cleanup);
            Some(delete_artifacts(&paths.image_dir, &paths.video_dir, &policy).await)
        } else {
            None
        };

        Ok(CameraReport {
            copied,
            outcome,
            uploaded_key,
            cleanup,
        })
    }
}

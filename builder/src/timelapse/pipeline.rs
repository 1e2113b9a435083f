use image::RgbImage;
use std::path::{Path, PathBuf};
use timelapse_common::candidate::{scan_folder, ImageCandidate};
use tracing::{debug, info, warn};

use super::encoder::{EncoderError, FrameWriter, VideoBackend};
use crate::filter::load_frame;
use crate::filter::traits::FrameFilter;

/// What a timelapse build produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Produced {
        path: PathBuf,
        frames: u32,
        total: usize,
    },
    NothingProduced(EmptyReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    /// The folder held no images with the configured extension.
    NoImages,
    /// Images were present but every one was unreadable or rejected.
    AllInvalid { total: usize, unreadable: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum TimelapseError {
    #[error("failed to list images in {0}: {1}")]
    ScanFolder(String, std::io::Error),
    #[error(
        "frame {path} is {actual_width}x{actual_height} but the video is \
         {expected_width}x{expected_height}"
    )]
    DimensionMismatch {
        path: String,
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },
    #[error(transparent)]
    Encoder(#[from] EncoderError),
}

/// Assembles the images of one folder into a timelapse.
///
/// Candidates are visited oldest first. Each one is decoded and passed
/// through the filter; accepted frames go straight to the writer, which is
/// opened lazily at the size of the first accepted frame. If nothing is
/// accepted no writer is ever opened and no file is created.
pub struct TimelapseBuilder<'a, B: VideoBackend> {
    filter: &'a dyn FrameFilter,
    backend: &'a B,
    extension: String,
    fps: f64,
}

struct OpenVideo<W> {
    writer: W,
    width: u32,
    height: u32,
}

#[derive(Debug, Default)]
struct Tally {
    accepted: usize,
    rejected: usize,
    unreadable: usize,
}

impl<'a, B: VideoBackend> TimelapseBuilder<'a, B> {
    pub fn new(filter: &'a dyn FrameFilter, backend: &'a B, extension: &str, fps: f64) -> Self {
        Self {
            filter,
            backend,
            extension: extension.trim_start_matches('.').to_string(),
            fps,
        }
    }

    pub async fn build(&self, folder: &Path, output: &Path) -> Result<Outcome, TimelapseError> {
        info!(folder = %folder.display(), "looking for images");

        let candidates = scan_folder(folder, &self.extension)
            .map_err(|e| TimelapseError::ScanFolder(folder.display().to_string(), e))?;
        if candidates.is_empty() {
            warn!(folder = %folder.display(), extension = self.extension, "no images found in the directory");
            return Ok(Outcome::NothingProduced(EmptyReason::NoImages));
        }
        let total = candidates.len();

        let mut video: Option<OpenVideo<B::Writer>> = None;
        let tally = match self.write_frames(&candidates, output, &mut video).await {
            Ok(tally) => tally,
            Err(e) => {
                if let Some(open) = video.take() {
                    open.writer.abort().await;
                }
                return Err(e);
            }
        };

        let Some(open) = video else {
            warn!(
                folder = %folder.display(),
                total,
                rejected = tally.rejected,
                unreadable = tally.unreadable,
                filter = self.filter.name(),
                "no valid images found in the directory"
            );
            return Ok(Outcome::NothingProduced(EmptyReason::AllInvalid {
                total,
                unreadable: tally.unreadable,
            }));
        };

        info!(
            valid = tally.accepted,
            total,
            rejected = tally.rejected,
            unreadable = tally.unreadable,
            "{} of {} images are valid",
            tally.accepted,
            total
        );

        let frames = open.writer.finish().await?;
        info!(output = %output.display(), frames, "timelapse video created");

        Ok(Outcome::Produced {
            path: output.to_path_buf(),
            frames,
            total,
        })
    }

    async fn write_frames(
        &self,
        candidates: &[ImageCandidate],
        output: &Path,
        video: &mut Option<OpenVideo<B::Writer>>,
    ) -> Result<Tally, TimelapseError> {
        let mut tally = Tally::default();

        for candidate in candidates {
            let frame = match load_frame(&candidate.path) {
                Ok(f) => f,
                Err(e) => {
                    warn!(image = candidate.name(), error = %e, "unreadable image, skipping");
                    tally.unreadable += 1;
                    continue;
                }
            };

            let verdict = self.filter.evaluate(candidate, &frame);
            if !verdict.valid {
                debug!(
                    image = candidate.name(),
                    filter = self.filter.name(),
                    statistic = verdict.statistic,
                    threshold = verdict.threshold,
                    "frame rejected"
                );
                tally.rejected += 1;
                continue;
            }

            match video.as_ref() {
                Some(open) => check_dimensions(candidate, &frame, open.width, open.height)?,
                None => {
                    let (width, height) = frame.dimensions();
                    let writer = self.backend.open(output, self.fps, width, height).await?;
                    info!(
                        output = %output.display(),
                        width,
                        height,
                        fps = self.fps,
                        "opened video writer"
                    );
                    *video = Some(OpenVideo {
                        writer,
                        width,
                        height,
                    });
                }
            }

            if let Some(open) = video.as_mut() {
                open.writer.push_frame(&frame).await?;
            }
            tally.accepted += 1;
        }

        Ok(tally)
    }
}

fn check_dimensions(
    candidate: &ImageCandidate,
    frame: &RgbImage,
    width: u32,
    height: u32,
) -> Result<(), TimelapseError> {
    let (actual_width, actual_height) = frame.dimensions();
    if (actual_width, actual_height) == (width, height) {
        return Ok(());
    }
    Err(TimelapseError::DimensionMismatch {
        path: candidate.path.display().to_string(),
        expected_width: width,
        expected_height: height,
        actual_width,
        actual_height,
    })
}

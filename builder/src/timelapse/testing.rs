//! In-memory video backend and fixtures for exercising the pipeline without ffmpeg.

use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::encoder::{EncoderError, FrameWriter, VideoBackend};

#[derive(Debug, Clone)]
pub struct RecordedVideo {
    pub output_path: PathBuf,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    /// Red channel of each frame's top-left pixel, in write order.
    pub markers: Vec<u8>,
}

#[derive(Debug, Default)]
struct Recorded {
    finished: Vec<RecordedVideo>,
    opened: usize,
    aborted: usize,
}

/// Backend that keeps written frames in memory and writes a small stand-in
/// file at the output path when a video is finished.
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    state: Arc<Mutex<Recorded>>,
}

impl RecordingBackend {
    pub fn finished(&self) -> Vec<RecordedVideo> {
        self.state.lock().unwrap().finished.clone()
    }

    pub fn opened(&self) -> usize {
        self.state.lock().unwrap().opened
    }

    pub fn aborted(&self) -> usize {
        self.state.lock().unwrap().aborted
    }
}

pub struct RecordingWriter {
    state: Arc<Mutex<Recorded>>,
    video: RecordedVideo,
}

impl VideoBackend for RecordingBackend {
    type Writer = RecordingWriter;

    async fn open(
        &self,
        output_path: &Path,
        fps: f64,
        width: u32,
        height: u32,
    ) -> Result<RecordingWriter, EncoderError> {
        if width == 0 || height == 0 {
            return Err(EncoderError::InvalidSize { width, height });
        }
        self.state.lock().unwrap().opened += 1;
        Ok(RecordingWriter {
            state: Arc::clone(&self.state),
            video: RecordedVideo {
                output_path: output_path.to_path_buf(),
                fps,
                width,
                height,
                markers: Vec::new(),
            },
        })
    }
}

impl FrameWriter for RecordingWriter {
    async fn push_frame(&mut self, frame: &RgbImage) -> Result<(), EncoderError> {
        assert_eq!(frame.dimensions(), (self.video.width, self.video.height));
        self.video.markers.push(frame.get_pixel(0, 0).0[0]);
        Ok(())
    }

    async fn finish(self) -> Result<u32, EncoderError> {
        let count = self.video.markers.len() as u32;
        std::fs::write(&self.video.output_path, count.to_string()).map_err(|source| {
            EncoderError::Publish {
                path: self.video.output_path.display().to_string(),
                source,
            }
        })?;
        self.state.lock().unwrap().finished.push(self.video);
        Ok(count)
    }

    async fn abort(self) {
        self.state.lock().unwrap().aborted += 1;
    }
}

/// A high-contrast checkerboard whose dark tiles carry `marker` in the red
/// channel, so the top-left pixel identifies the frame.
pub fn marked_checkerboard(width: u32, height: u32, marker: u8) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        if (x / 10 + y / 10) % 2 == 0 {
            Rgb([marker, 0, 0])
        } else {
            Rgb([255, 255, 255])
        }
    })
}

/// A uniform mid-gray frame.
pub fn flat_gray(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([128, 128, 128]))
}

/// Save `image` as `dir/name` and set its modification time.
pub fn save_with_mtime(dir: &Path, name: &str, image: &RgbImage, unix_secs: i64) -> PathBuf {
    let path = dir.join(name);
    image.save(&path).unwrap();
    set_mtime(&path, unix_secs);
    path
}

pub fn set_mtime(path: &Path, unix_secs: i64) {
    filetime::set_file_mtime(path, filetime::FileTime::from_unix_time(unix_secs, 0)).unwrap();
}

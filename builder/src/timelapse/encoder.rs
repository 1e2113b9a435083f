use image::RgbImage;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tracing::{debug, error, info, warn};

/// Opens [`FrameWriter`]s for a given output file and frame geometry.
pub trait VideoBackend {
    type Writer: FrameWriter;

    async fn open(
        &self,
        output_path: &Path,
        fps: f64,
        width: u32,
        height: u32,
    ) -> Result<Self::Writer, EncoderError>;
}

/// An open video being written frame by frame.
///
/// Every writer must end in exactly one of `finish` or `abort`.
pub trait FrameWriter {
    async fn push_frame(&mut self, frame: &RgbImage) -> Result<(), EncoderError>;

    /// Flush, close and publish the video at its output path.
    /// Returns the number of frames written.
    async fn finish(self) -> Result<u32, EncoderError>;

    /// Stop encoding and remove any partial output.
    async fn abort(self);
}

#[derive(Debug, thiserror::Error)]
pub enum EncoderError {
    #[error("failed to spawn ffmpeg: {0}")]
    Spawn(String),
    #[error("failed to write frame to ffmpeg stdin: {0}")]
    Write(String),
    #[error("failed to wait for ffmpeg: {0}")]
    Wait(String),
    #[error("ffmpeg exited with non-zero status: {0}")]
    FfmpegFailed(String),
    #[error("failed to publish {path}: {source}")]
    Publish {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid frame size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
}

/// Path the encoder writes to before the video is complete.
///
/// `day_timelapse.mp4` becomes `day_timelapse.mp4.part` in the same
/// directory, so the final rename never crosses a filesystem.
pub fn partial_path(output_path: &Path) -> PathBuf {
    let mut name = output_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    output_path.with_file_name(name)
}

/// Encodes timelapses with an `ffmpeg` subprocess fed raw RGB frames on stdin.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    program: PathBuf,
    codec: String,
    crf: u32,
    preset: String,
}

impl FfmpegBackend {
    pub fn new(codec: &str, crf: u32, preset: &str) -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            codec: codec.to_string(),
            crf,
            preset: preset.to_string(),
        }
    }

    /// Run this executable instead of `ffmpeg` from PATH.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    fn vcodec(&self) -> &'static str {
        match self.codec.as_str() {
            "h265" => "libx265",
            _ => "libx264",
        }
    }
}

pub struct FfmpegWriter {
    child: Child,
    stdin: Option<ChildStdin>,
    partial_path: PathBuf,
    output_path: PathBuf,
    frame_count: u32,
}

impl VideoBackend for FfmpegBackend {
    type Writer = FfmpegWriter;

    /// Spawn an ffmpeg subprocess ready to receive `width`x`height` RGB24
    /// frames on stdin. Output goes to [`partial_path`] until `finish`.
    async fn open(
        &self,
        output_path: &Path,
        fps: f64,
        width: u32,
        height: u32,
    ) -> Result<FfmpegWriter, EncoderError> {
        if width == 0 || height == 0 {
            return Err(EncoderError::InvalidSize { width, height });
        }

        let partial_path = partial_path(output_path);
        let size = format!("{width}x{height}");
        let fps_str = fps.to_string();
        let crf_str = self.crf.to_string();
        let vcodec = self.vcodec();

        let mut cmd = Command::new(&self.program);
        cmd.args([
            "-hide_banner",
            "-loglevel", "error",
            "-f", "rawvideo",
            "-pix_fmt", "rgb24",
            "-s", &size,
            "-r", &fps_str,
            "-i", "pipe:0",
            // yuv420p needs even dimensions
            "-vf", "pad=ceil(iw/2)*2:ceil(ih/2)*2",
            "-c:v", vcodec,
            "-preset", &self.preset,
            "-crf", &crf_str,
            "-pix_fmt", "yuv420p",
            "-movflags", "+faststart",
            "-f", "mp4",
            "-y",
        ])
        .arg(&partial_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| EncoderError::Spawn(e.to_string()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EncoderError::Spawn("could not get stdin handle".into()))?;

        debug!(
            codec = vcodec,
            crf = self.crf,
            preset = self.preset,
            fps,
            width,
            height,
            output = %partial_path.display(),
            "ffmpeg encoder started"
        );

        Ok(FfmpegWriter {
            child,
            stdin: Some(stdin),
            partial_path,
            output_path: output_path.to_path_buf(),
            frame_count: 0,
        })
    }
}

impl FfmpegWriter {
    /// A broken pipe usually means ffmpeg already exited. Close stdin, reap
    /// the child and return its stderr, which says why.
    async fn write_failure(&mut self, write_err: std::io::Error) -> EncoderError {
        drop(self.stdin.take());

        let mut stderr = Vec::new();
        if let Some(mut pipe) = self.child.stderr.take() {
            if let Err(e) = pipe.read_to_end(&mut stderr).await {
                warn!(error = %e, "failed to read ffmpeg stderr");
            }
        }
        let status = self.child.wait().await.ok();

        let stderr = String::from_utf8_lossy(&stderr).trim().to_string();
        if stderr.is_empty() {
            error!(?status, error = %write_err, "ffmpeg stopped reading frames");
            return EncoderError::Write(write_err.to_string());
        }
        error!(?status, stderr, error = %write_err, "ffmpeg stopped reading frames");
        EncoderError::FfmpegFailed(stderr)
    }
}

impl FrameWriter for FfmpegWriter {
    /// Write a single RGB frame to ffmpeg's stdin pipe.
    async fn push_frame(&mut self, frame: &RgbImage) -> Result<(), EncoderError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| EncoderError::Write("stdin already closed".into()))?;
        let written = stdin.write_all(frame.as_raw()).await;
        if let Err(e) = written {
            return Err(self.write_failure(e).await);
        }
        self.frame_count += 1;
        debug!(frame_count = self.frame_count, "pushed frame to encoder");
        Ok(())
    }

    /// Close stdin, wait for ffmpeg to finish and rename the partial file
    /// into place.
    async fn finish(mut self) -> Result<u32, EncoderError> {
        // Close stdin so ffmpeg knows there are no more frames.
        drop(self.stdin.take());

        let output = self
            .child
            .wait_with_output()
            .await
            .map_err(|e| EncoderError::Wait(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(stderr = %stderr, "ffmpeg exited with error");
            let _ = tokio::fs::remove_file(&self.partial_path).await;
            return Err(EncoderError::FfmpegFailed(stderr.into_owned()));
        }

        if let Err(source) = tokio::fs::rename(&self.partial_path, &self.output_path).await {
            let _ = tokio::fs::remove_file(&self.partial_path).await;
            return Err(EncoderError::Publish {
                path: self.output_path.display().to_string(),
                source,
            });
        }

        info!(
            frame_count = self.frame_count,
            output = %self.output_path.display(),
            "video encoding complete"
        );
        Ok(self.frame_count)
    }

    async fn abort(mut self) {
        drop(self.stdin.take());
        // A writer that already failed has reaped its child.
        if let Ok(None) = self.child.try_wait() {
            if let Err(e) = self.child.kill().await {
                warn!(error = %e, "failed to kill ffmpeg");
            }
        }
        if let Err(e) = tokio::fs::remove_file(&self.partial_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    path = %self.partial_path.display(),
                    error = %e,
                    "failed to delete partial video"
                );
            }
        }
        warn!(
            frame_count = self.frame_count,
            output = %self.output_path.display(),
            "video encoding aborted"
        );
    }
}

/// Probe `ffmpeg -version` once at startup so a missing encoder shows up
/// before any images are copied. Only warns; cameras with no valid frames
/// never need ffmpeg.
pub async fn check_ffmpeg_available() {
    match Command::new("ffmpeg").arg("-version").output().await {
        Ok(out) if out.status.success() => {
            let version = String::from_utf8_lossy(&out.stdout);
            debug!(version = version.lines().next().unwrap_or(""), "found ffmpeg");
        }
        Ok(out) => warn!(status = %out.status, "`ffmpeg -version` failed, videos may not be written"),
        Err(e) => warn!(
            error = %e,
            "ffmpeg is not on PATH, days with valid frames will fail to encode"
        ),
    }
}

use image::RgbImage;
use timelapse_common::candidate::ImageCandidate;

/// Outcome of running a [`FrameFilter`] over one decoded frame.
///
/// Carries the statistic and threshold so callers can log why a frame was
/// dropped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub valid: bool,
    pub statistic: f64,
    pub threshold: f64,
}

/// Frame validity interface for timelapse assembly.
///
/// Implementations receive a decoded RGB frame and decide whether it is worth
/// including in the video. Decoding happens before the filter runs, so a
/// corrupt file never reaches `evaluate`.
pub trait FrameFilter: Send + Sync {
    /// Judge one frame. `candidate` identifies the source file for logging.
    fn evaluate(&self, candidate: &ImageCandidate, frame: &RgbImage) -> Verdict;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

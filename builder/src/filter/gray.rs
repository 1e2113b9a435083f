use image::RgbImage;
use timelapse_common::candidate::ImageCandidate;
use timelapse_common::config::RoiConfig;
use tracing::{debug, warn};

use super::traits::{FrameFilter, Verdict};

/// Gray-frame filter.
///
/// A camera that has lost its picture (night blindness, a dead sensor, a
/// network hiccup on the camera side) tends to emit uniformly gray frames.
/// The filter looks at one region of the frame, converts it to 8-bit luma
/// and rejects the frame if the intensity standard deviation is below the
/// threshold.
pub struct GrayFrameFilter {
    threshold: f64,
    roi: RoiConfig,
}

impl GrayFrameFilter {
    pub fn new(threshold: f64, roi: RoiConfig) -> Self {
        Self { threshold, roi }
    }

    /// Population standard deviation of luma over the configured region.
    ///
    /// Luma uses the BT.601 weights rounded to whole 0-255 levels, the same
    /// quantization an 8-bit grayscale conversion produces. An empty region
    /// yields 0.
    pub fn region_stddev(&self, frame: &RgbImage) -> f64 {
        let (x, y, w, h) = self.roi.pixel_rect(frame.width(), frame.height());
        if w == 0 || h == 0 {
            return 0.0;
        }

        let count = (w as f64) * (h as f64);
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        for py in y..y + h {
            for px in x..x + w {
                let l = luma(frame.get_pixel(px, py).0);
                sum += l;
                sum_sq += l * l;
            }
        }

        let mean = sum / count;
        let variance = (sum_sq / count - mean * mean).max(0.0);
        variance.sqrt()
    }
}

fn luma([r, g, b]: [u8; 3]) -> f64 {
    (0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64).round()
}

impl FrameFilter for GrayFrameFilter {
    fn evaluate(&self, candidate: &ImageCandidate, frame: &RgbImage) -> Verdict {
        let stddev = self.region_stddev(frame);
        let valid = stddev >= self.threshold;

        if valid {
            debug!(
                image = candidate.name(),
                stddev = format!("{:.4}", stddev),
                "frame accepted"
            );
        } else {
            warn!(
                image = %candidate.path.display(),
                stddev,
                threshold = self.threshold,
                "deviation below threshold, frame skipped"
            );
        }

        Verdict {
            valid,
            statistic: stddev,
            threshold: self.threshold,
        }
    }

    fn name(&self) -> &str {
        "gray"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::path::PathBuf;
    use std::time::SystemTime;

    fn candidate() -> ImageCandidate {
        ImageCandidate::new(PathBuf::from("frame.jpg"), SystemTime::UNIX_EPOCH)
    }

    fn uniform(w: u32, h: u32, value: u8) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([value, value, value]))
    }

    fn checkerboard(w: u32, h: u32, tile: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            if (x / tile + y / tile) % 2 == 0 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        })
    }

    fn filter(threshold: f64) -> GrayFrameFilter {
        GrayFrameFilter::new(threshold, RoiConfig::default())
    }

    #[test]
    fn uniform_gray_is_rejected() {
        let verdict = filter(0.05).evaluate(&candidate(), &uniform(100, 100, 128));
        assert!(!verdict.valid);
        assert_eq!(verdict.statistic, 0.0);
        assert_eq!(verdict.threshold, 0.05);
    }

    #[test]
    fn checkerboard_is_accepted() {
        let verdict = filter(0.05).evaluate(&candidate(), &checkerboard(100, 100, 25));
        assert!(verdict.valid);
        // Half black, half white: stddev is 127.5.
        assert!((verdict.statistic - 127.5).abs() < 1e-9, "{}", verdict.statistic);
    }

    #[test]
    fn only_the_top_right_quadrant_counts() {
        // Detail everywhere except the top-right quadrant.
        let mut frame = checkerboard(100, 100, 5);
        for y in 0..50 {
            for x in 50..100 {
                frame.put_pixel(x, y, Rgb([90, 90, 90]));
            }
        }
        assert!(!filter(0.05).evaluate(&candidate(), &frame).valid);

        // Detail only in the top-right quadrant.
        let mut frame = uniform(100, 100, 90);
        frame.put_pixel(75, 10, Rgb([255, 255, 255]));
        assert!(filter(0.05).evaluate(&candidate(), &frame).valid);
    }

    #[test]
    fn custom_region_is_honoured() {
        let mut frame = uniform(100, 100, 90);
        frame.put_pixel(10, 90, Rgb([255, 255, 255]));

        let bottom_left = RoiConfig {
            x_start: 0.0,
            x_end: 0.5,
            y_start: 0.5,
            y_end: 1.0,
        };
        assert!(!filter(0.05).evaluate(&candidate(), &frame).valid);
        assert!(GrayFrameFilter::new(0.05, bottom_left)
            .evaluate(&candidate(), &frame)
            .valid);
    }

    #[test]
    fn tiny_frame_has_empty_region() {
        let verdict = filter(0.05).evaluate(&candidate(), &checkerboard(1, 1, 1));
        assert!(!verdict.valid);
        assert_eq!(verdict.statistic, 0.0);
    }

    #[test]
    fn color_noise_below_one_luma_level_is_flat() {
        // Channel differences that round to the same luma level.
        let frame = RgbImage::from_fn(20, 20, |x, _| {
            if x % 2 == 0 {
                Rgb([100, 100, 100])
            } else {
                Rgb([100, 100, 101])
            }
        });
        assert_eq!(filter(0.05).region_stddev(&frame), 0.0);
    }

    #[test]
    fn deterministic_for_identical_pixels() {
        let f = filter(0.05);
        let a = checkerboard(64, 48, 3);
        let b = a.clone();
        assert_eq!(f.evaluate(&candidate(), &a), f.evaluate(&candidate(), &b));
    }

    #[test]
    fn threshold_is_monotonic() {
        let frames = [
            uniform(40, 40, 10),
            checkerboard(40, 40, 4),
            RgbImage::from_fn(40, 40, |x, y| Rgb([(x * 3) as u8, (y * 2) as u8, 7])),
            RgbImage::from_fn(40, 40, |x, _| Rgb([100 + (x % 2) as u8 * 2, 100, 100])),
        ];
        let thresholds = [0.0, 0.05, 0.5, 1.0, 10.0, 100.0, 200.0];

        for frame in &frames {
            let verdicts: Vec<bool> = thresholds
                .iter()
                .map(|&t| filter(t).evaluate(&candidate(), frame).valid)
                .collect();
            // Once a frame becomes invalid at some threshold, every higher
            // threshold must also reject it.
            for pair in verdicts.windows(2) {
                assert!(pair[0] || !pair[1], "verdicts not monotonic: {verdicts:?}");
            }
        }
    }

    #[test]
    fn zero_threshold_accepts_flat_frames() {
        assert!(filter(0.0).evaluate(&candidate(), &uniform(10, 10, 0)).valid);
    }
}

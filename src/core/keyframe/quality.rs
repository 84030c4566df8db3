use super::config::ValidityThresholds;
use super::frame::Frame;
use image::GrayImage;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityScore {
    /// 拉普拉斯响应的方差，越大越清晰
    pub sharpness: f64,
    pub mean_brightness: f64,
    pub brightness_std: f64,
    /// 空白帧和淡入淡出为 false
    pub is_valid_content: bool,
}

impl QualityScore {
    /// 平均亮度与中灰 (127.5) 的距离
    pub fn brightness_deviation(&self) -> f64 {
        (self.mean_brightness - 127.5).abs()
    }
}

pub struct QualityScorer {
    validity: ValidityThresholds,
}

impl QualityScorer {
    pub fn new(validity: ValidityThresholds) -> Self {
        Self { validity }
    }

    pub fn score(&self, frame: &Frame) -> QualityScore {
        let gray = frame.to_gray();
        let sharpness = Self::laplacian_variance(&gray);
        let (mean, std) = Self::brightness_stats(&gray);

        QualityScore {
            sharpness,
            mean_brightness: mean,
            brightness_std: std,
            is_valid_content: !self.is_blank_or_transition(mean, std),
        }
    }

    /// 黑场/白场淡变，或任何接近纯色的帧
    pub fn is_blank_or_transition(&self, mean: f64, std: f64) -> bool {
        let v = &self.validity;
        let at_extreme = mean < v.dark_max || mean > v.bright_min;
        (at_extreme && std < v.flat_std) || std < v.flat_std / 2.0
    }

    /// 4 邻域拉普拉斯，边界像素复制
    pub fn laplacian_variance(gray: &GrayImage) -> f64 {
        let (w, h) = gray.dimensions();
        if w == 0 || h == 0 {
            return 0.0;
        }
        let (w, h) = (w as i64, h as i64);
        let raw = gray.as_raw();
        let at = |x: i64, y: i64| -> f64 {
            let x = x.clamp(0, w - 1);
            let y = y.clamp(0, h - 1);
            raw[(y * w + x) as usize] as f64
        };

        let n = (w * h) as f64;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        for y in 0..h {
            for x in 0..w {
                let response =
                    at(x - 1, y) + at(x + 1, y) + at(x, y - 1) + at(x, y + 1) - 4.0 * at(x, y);
                sum += response;
                sum_sq += response * response;
            }
        }

        let mean = sum / n;
        (sum_sq / n - mean * mean).max(0.0)
    }

    fn brightness_stats(gray: &GrayImage) -> (f64, f64) {
        let raw = gray.as_raw();
        if raw.is_empty() {
            return (0.0, 0.0);
        }
        let n = raw.len() as f64;
        let mean = raw.iter().map(|&v| v as f64).sum::<f64>() / n;
        let var = raw
            .iter()
            .map(|&v| {
                let d = v as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        (mean, var.sqrt())
    }
}

impl Default for QualityScorer {
    fn default() -> Self {
        Self::new(ValidityThresholds::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{imageops, Luma};

    fn create_test_frame(width: u32, height: u32, fill: u8) -> Frame {
        Frame::new(width, height, vec![fill; (width * height * 4) as usize], 0, 0).unwrap()
    }

    fn checkerboard(size: u32, cell: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            if (x / cell + y / cell) % 2 == 0 {
                Luma([30u8])
            } else {
                Luma([220u8])
            }
        })
    }

    fn frame_from_gray(gray: &GrayImage) -> Frame {
        Frame::from_luma(gray.width(), gray.height(), gray.as_raw(), 0, 0).unwrap()
    }

    #[test]
    fn test_flat_frame_has_zero_sharpness() {
        let scorer = QualityScorer::default();
        let score = scorer.score(&create_test_frame(64, 64, 128));
        assert_eq!(score.sharpness, 0.0);
        assert_eq!(score.brightness_std, 0.0);
    }

    #[test]
    fn test_blur_lowers_sharpness() {
        let sharp = checkerboard(64, 4);
        let blurred = imageops::blur(&sharp, 2.0);

        let sharp_score = QualityScorer::laplacian_variance(&sharp);
        let blurred_score = QualityScorer::laplacian_variance(&blurred);
        assert!(sharp_score > blurred_score);
    }

    #[test]
    fn test_sharpening_does_not_lower_score() {
        let blurred = imageops::blur(&checkerboard(64, 8), 1.5);
        let sharpened = imageops::unsharpen(&blurred, 1.5, 0);

        let blurred_score = QualityScorer::laplacian_variance(&blurred);
        let sharpened_score = QualityScorer::laplacian_variance(&sharpened);
        assert!(sharpened_score >= blurred_score);
    }

    #[test]
    fn test_black_frame_is_invalid() {
        let scorer = QualityScorer::default();
        let score = scorer.score(&create_test_frame(32, 32, 5));
        assert!(!score.is_valid_content);
    }

    #[test]
    fn test_white_frame_is_invalid() {
        let scorer = QualityScorer::default();
        let score = scorer.score(&create_test_frame(32, 32, 250));
        assert!(!score.is_valid_content);
    }

    #[test]
    fn test_solid_mid_grey_is_invalid() {
        let scorer = QualityScorer::default();
        let score = scorer.score(&create_test_frame(32, 32, 128));
        assert!(!score.is_valid_content);
    }

    #[test]
    fn test_textured_frame_is_valid() {
        let scorer = QualityScorer::default();
        let score = scorer.score(&frame_from_gray(&checkerboard(32, 4)));
        assert!(score.is_valid_content);
        assert!(score.sharpness > 0.0);
        assert!((score.mean_brightness - 125.0).abs() < 1.0);
    }

    #[test]
    fn test_dark_but_textured_is_valid() {
        let scorer = QualityScorer::default();
        let gray = GrayImage::from_fn(32, 32, |x, _| Luma([if x % 2 == 0 { 0u8 } else { 45u8 }]));
        let score = scorer.score(&frame_from_gray(&gray));
        // 均值 22.5 偏暗，但标准差 22.5 高于平坦阈值
        assert!(score.is_valid_content);
    }
}

use super::cancel::CancelToken;
use super::error::{KeyframeError, Result};
use super::frame::Frame;
use super::source::{SignalSample, VideoDecoder};
use log::{info, warn};

/// 相邻帧的内容差异
///
/// 帧先降采样再转 HSV，逐通道比较；分数为 H、S、V 三通道平均绝对差的均值
/// (0-255 刻度，色相存为角度 / 2)。硬切通常远高于 27，静止镜头接近 0
pub struct ContentDiff {
    sample_size: (u32, u32),
    last_hsv: Option<Vec<[u8; 3]>>,
}

impl ContentDiff {
    pub fn new() -> Self {
        Self::with_sample_size(64, 64)
    }

    pub fn with_sample_size(width: u32, height: u32) -> Self {
        Self {
            sample_size: (width.max(1), height.max(1)),
            last_hsv: None,
        }
    }

    /// 重置后的第一帧返回 `None`
    pub fn score(&mut self, frame: &Frame) -> Result<Option<f64>> {
        let resized = frame.resize_to(self.sample_size.0, self.sample_size.1)?;
        let current = Self::to_hsv(&resized);

        let score = self
            .last_hsv
            .as_ref()
            .map(|last| Self::content_score(last, &current));

        self.last_hsv = Some(current);
        Ok(score)
    }

    pub fn reset(&mut self) {
        self.last_hsv = None;
    }

    fn to_hsv(frame: &Frame) -> Vec<[u8; 3]> {
        frame
            .data
            .chunks_exact(4)
            .map(|rgba| Self::rgb_to_hsv(rgba[0], rgba[1], rgba[2]))
            .collect()
    }

    fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
        let (r, g, b) = (r as i32, g as i32, b as i32);
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;

        let s = if max == 0 { 0 } else { delta * 255 / max };
        let h = if delta == 0 {
            0
        } else {
            let degrees = if max == r {
                60 * (g - b) / delta
            } else if max == g {
                120 + 60 * (b - r) / delta
            } else {
                240 + 60 * (r - g) / delta
            };
            degrees.rem_euclid(360) / 2
        };

        [h as u8, s as u8, max as u8]
    }

    pub fn content_score(a: &[[u8; 3]], b: &[[u8; 3]]) -> f64 {
        if a.is_empty() || a.len() != b.len() {
            return 0.0;
        }

        let mut sums = [0u64; 3];
        for (pa, pb) in a.iter().zip(b.iter()) {
            for c in 0..3 {
                sums[c] += (pa[c] as i32 - pb[c] as i32).unsigned_abs() as u64;
            }
        }

        let n = a.len() as f64;
        sums.iter().map(|&s| s as f64 / n).sum::<f64>() / 3.0
    }
}

impl Default for ContentDiff {
    fn default() -> Self {
        Self::new()
    }
}

/// 一个视频完整物化的变化信号
#[derive(Debug, Clone, Default)]
pub struct SignalTrace {
    pub samples: Vec<SignalSample>,
    /// 扫描因解码错误停止时的结束帧 (不含)
    pub truncated_at: Option<u64>,
}

impl SignalTrace {
    pub fn is_truncated(&self) -> bool {
        self.truncated_at.is_some()
    }

    pub fn peak(&self) -> f64 {
        self.samples.iter().map(|s| s.score).fold(0.0, f64::max)
    }
}

pub struct ChangeSignal;

impl ChangeSignal {
    const CANCEL_CHECK_INTERVAL: usize = 64;

    /// 对解码器的差异流完整扫描一次
    ///
    /// 第一次读取就失败视为致命 (`DecodeError`)，之后的失败只截断，保留已读部分
    pub fn scan(decoder: &mut dyn VideoDecoder, cancel: &CancelToken) -> Result<SignalTrace> {
        let mut trace = SignalTrace::default();

        for (i, item) in decoder.stream_pairs().enumerate() {
            if i % Self::CANCEL_CHECK_INTERVAL == 0 {
                cancel.check()?;
            }

            match item {
                Ok(sample) => trace.samples.push(sample),
                Err(e) => {
                    let Some(last) = trace.samples.last() else {
                        warn!("❌ Change signal unreadable: {}", e);
                        return Err(match e {
                            KeyframeError::Cancelled | KeyframeError::DecodeError { .. } => e,
                            other => KeyframeError::DecodeError {
                                frame_index: 0,
                                reason: other.to_string(),
                            },
                        });
                    };
                    if matches!(e, KeyframeError::Cancelled) {
                        return Err(e);
                    }
                    let end = last.frame_index + 1;
                    warn!("⚠️ Change signal truncated at frame {}: {}", end, e);
                    trace.truncated_at = Some(end);
                    break;
                }
            }
        }

        info!(
            "📈 Change signal: {} samples, peak {:.1}{}",
            trace.samples.len(),
            trace.peak(),
            if trace.is_truncated() { " (truncated)" } else { "" }
        );
        Ok(trace)
    }
}

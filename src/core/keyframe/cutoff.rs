//! 清晰度接受策略
//!
//! 门限只向策略要一个数字，这个数字怎么来 (固定、相对本次运行、相对随机预采样)
//! 都藏在 [`CutoffPolicy`] 后面

use super::config::{CutoffMode, KeyframeConfig};
use super::frame::Frame;
use super::quality::QualityScorer;
use super::source::VideoDecoder;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub trait CutoffPolicy {
    /// 分数不低于门限的候选通过清晰度门限
    fn compute_cutoff(&self, scores: &[f64]) -> f64;

    fn mode(&self) -> CutoffMode;
}

pub struct FixedCutoff {
    pub cutoff: f64,
}

impl CutoffPolicy for FixedCutoff {
    fn compute_cutoff(&self, _scores: &[f64]) -> f64 {
        self.cutoff
    }

    fn mode(&self) -> CutoffMode {
        CutoffMode::Fixed
    }
}

/// 保留本次运行中最清晰的约 `keep_fraction` 比例
pub struct PercentileCutoff {
    pub keep_fraction: f64,
}

impl CutoffPolicy for PercentileCutoff {
    fn compute_cutoff(&self, scores: &[f64]) -> f64 {
        if scores.is_empty() {
            return 0.0;
        }
        let mut sorted = scores.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let n = sorted.len();
        let keep = ((self.keep_fraction * n as f64).round() as usize).clamp(1, n);
        sorted[n - keep]
    }

    fn mode(&self) -> CutoffMode {
        CutoffMode::Percentile
    }
}

/// `scale × mean(baseline)`，baseline 来自运行前在随机位置解码的帧。
/// 预采样一无所获时退回本次运行自己的分数
pub struct DynamicBaselineCutoff {
    pub scale: f64,
    pub baseline: Vec<f64>,
}

impl DynamicBaselineCutoff {
    /// 在随机种子决定的时间点解码 `samples` 帧并打分
    pub fn presample(
        decoder: &mut dyn VideoDecoder,
        scorer: &QualityScorer,
        samples: usize,
        seed: u64,
        scale: f64,
    ) -> Self {
        let duration = decoder.info().duration;
        let mut rng = StdRng::seed_from_u64(seed);
        let mut baseline = Vec::with_capacity(samples);

        if duration > 0.0 {
            for _ in 0..samples {
                let timestamp = rng.gen_range(0.0..duration);
                match decoder.decode_at(timestamp) {
                    Ok(frame) => baseline.push(Self::sharpness(scorer, &frame)),
                    Err(e) => debug!("Baseline sample at {:.2}s skipped: {}", timestamp, e),
                }
            }
        }

        if baseline.is_empty() {
            warn!("⚠️ Dynamic baseline: no frames pre-sampled, using run scores");
        } else {
            info!(
                "📊 Dynamic baseline from {}/{} samples",
                baseline.len(),
                samples
            );
        }

        Self { scale, baseline }
    }

    fn sharpness(scorer: &QualityScorer, frame: &Frame) -> f64 {
        scorer.score(frame).sharpness
    }
}

impl CutoffPolicy for DynamicBaselineCutoff {
    fn compute_cutoff(&self, scores: &[f64]) -> f64 {
        let source = if self.baseline.is_empty() {
            scores
        } else {
            &self.baseline
        };
        if source.is_empty() {
            return 0.0;
        }
        let mean = source.iter().sum::<f64>() / source.len() as f64;
        self.scale * mean
    }

    fn mode(&self) -> CutoffMode {
        CutoffMode::DynamicBaseline
    }
}

/// 构建配置指定的策略，只有动态基线会用到解码器
pub fn policy_for(
    config: &KeyframeConfig,
    decoder: &mut dyn VideoDecoder,
    scorer: &QualityScorer,
) -> Box<dyn CutoffPolicy> {
    match config.sharpness_cutoff_mode {
        CutoffMode::Fixed => Box::new(FixedCutoff {
            cutoff: config.sharpness_cutoff_value,
        }),
        CutoffMode::Percentile => Box::new(PercentileCutoff {
            keep_fraction: config.sharpness_cutoff_value,
        }),
        CutoffMode::DynamicBaseline => Box::new(DynamicBaselineCutoff::presample(
            decoder,
            scorer,
            config.baseline_samples,
            config.baseline_seed,
            config.sharpness_cutoff_value,
        )),
    }
}

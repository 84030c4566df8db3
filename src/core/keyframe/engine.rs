//! 运行编排，保证结果非空
//!
//! 各阶段严格按顺序执行：分割 → 采样 → 打分 → 门限 → 去重。
//! 门限之后为空时逐级兜底：
//!
//! 1. 提升最清晰的有效候选；
//! 2. 候选全是空白帧时，保留最接近中灰的那张；
//! 3. 采样一无所获时，直接在视频中段解码一帧，不过门限。
//!
//! 只有完全无法解码的视频才会得到空结果。

use super::adaptive::AdaptiveSearch;
use super::cancel::CancelToken;
use super::candidate::{
    AcceptedFrame, Candidate, FallbackTier, ProcessingStats, RejectedFrame, RejectionCounts,
    RejectionReason, RunOutcome, RunStatus,
};
use super::change_signal::ChangeSignal;
use super::config::KeyframeConfig;
use super::cutoff::policy_for;
use super::deduplicator::FrameDeduplicator;
use super::error::{KeyframeError, Result};
use super::quality::QualityScorer;
use super::sampler::FrameSampler;
use super::segmenter::{Scene, SceneSegmenter};
use super::source::{VideoDecoder, VideoInfo, VideoOpener};
use log::{debug, error, info, warn};

/// 兜底解码位置，占时长的比例
const SAFETY_NET_POSITIONS: [f64; 4] = [0.5, 0.25, 0.75, 0.0];

/// 门限加兜底之后的结果
#[derive(Debug, Clone)]
pub struct Selection {
    pub accepted: Vec<Candidate>,
    pub rejected: Vec<RejectedFrame>,
    pub tier: Option<FallbackTier>,
}

pub struct GuaranteeEngine {
    config: KeyframeConfig,
    scorer: QualityScorer,
    segmenter: SceneSegmenter,
    deduplicator: FrameDeduplicator,
}

impl GuaranteeEngine {
    pub fn new() -> Self {
        Self::build(KeyframeConfig::default())
    }

    pub fn with_config(config: KeyframeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: KeyframeConfig) -> Self {
        Self {
            scorer: QualityScorer::new(config.validity),
            segmenter: SceneSegmenter::new(config.min_scene_len),
            deduplicator: FrameDeduplicator::with_threshold(config.dedup_hamming_bound),
            config,
        }
    }

    pub fn config(&self) -> &KeyframeConfig {
        &self.config
    }

    pub fn run(&self, opener: &dyn VideoOpener, video_path: &str) -> Result<RunOutcome> {
        self.run_with_cancel(opener, video_path, &CancelToken::new())
    }

    /// 打开视频并运行流水线。无法读取的视频不算错误，返回空结果，
    /// 状态为 `RunStatus::UnreadableVideo`。唯一的 `Err` 是 `Cancelled`
    pub fn run_with_cancel(
        &self,
        opener: &dyn VideoOpener,
        video_path: &str,
        cancel: &CancelToken,
    ) -> Result<RunOutcome> {
        info!("🎬 Processing: {}", video_path);
        cancel.check()?;

        let mut decoder = match opener.open(video_path) {
            Ok(decoder) => decoder,
            Err(KeyframeError::Cancelled) => return Err(KeyframeError::Cancelled),
            Err(e) => {
                error!("❌ Cannot open {}: {}", video_path, e);
                return Ok(self.empty_outcome(RunStatus::UnreadableVideo, None));
            }
        };

        self.run_decoder(decoder.as_mut(), cancel)
    }

    pub fn run_decoder(
        &self,
        decoder: &mut dyn VideoDecoder,
        cancel: &CancelToken,
    ) -> Result<RunOutcome> {
        let info = decoder.info();
        if !(info.duration > 0.0 && info.frame_rate > 0.0 && info.frame_count > 0) {
            error!("❌ Unusable stream info: {:?}", info);
            return Ok(self.empty_outcome(RunStatus::UnreadableVideo, Some(&info)));
        }

        let mut stats = ProcessingStats::empty(RunStatus::Success, self.config.sharpness_cutoff_mode);
        stats.video_duration = info.duration;

        // 分割
        let scenes = self.segment(decoder, &info, cancel, &mut stats)?;
        stats.scenes_found = scenes.len();
        stats.avg_scene_duration =
            scenes.iter().map(Scene::duration).sum::<f64>() / scenes.len() as f64;

        // 采样
        let mut candidates = Vec::with_capacity(scenes.len());
        for scene in &scenes {
            cancel.check()?;
            match FrameSampler::sample(decoder, scene) {
                Ok(candidate) => candidates.push(candidate),
                Err(KeyframeError::Cancelled) => return Err(KeyframeError::Cancelled),
                Err(e) => {
                    warn!("⚠️ Scene {} dropped: {}", scene.scene_id, e);
                    stats.scenes_dropped += 1;
                }
            }
        }
        stats.candidates_extracted = candidates.len();
        info!("✓ Extracted {} candidates", candidates.len());

        if candidates.is_empty() {
            return self.safety_net(decoder, &info, cancel, stats);
        }

        // 打分
        cancel.check()?;
        for candidate in candidates.iter_mut() {
            candidate.quality = Some(self.scorer.score(&candidate.frame));
        }

        // 门限 (含兜底层级 1、2)
        let policy = policy_for(&self.config, decoder, &self.scorer);
        let scores: Vec<f64> = candidates.iter().map(Candidate::sharpness).collect();
        let cutoff = policy.compute_cutoff(&scores);
        stats.cutoff_mode = policy.mode();
        stats.sharpness_cutoff = Some(cutoff);
        cancel.check()?;

        let Selection {
            accepted,
            mut rejected,
            tier,
        } = self.select(candidates, cutoff);

        // 去重
        let (kept, duplicates) = self.deduplicator.deduplicate(accepted);
        rejected.extend(duplicates.into_iter().map(|d| RejectedFrame {
            candidate: d.candidate,
            reason: RejectionReason::Duplicate,
        }));

        let accepted: Vec<AcceptedFrame> = kept
            .into_iter()
            .map(|c| AcceptedFrame::from_candidate(c, tier))
            .collect();

        stats.fallback_tier_used = tier;
        stats.status = if tier.is_some() {
            RunStatus::SuccessWithFallback
        } else {
            RunStatus::Success
        };
        Ok(self.finish(accepted, rejected, stats))
    }

    fn segment(
        &self,
        decoder: &mut dyn VideoDecoder,
        info: &VideoInfo,
        cancel: &CancelToken,
        stats: &mut ProcessingStats,
    ) -> Result<Vec<Scene>> {
        info!("[1] Scene detection...");
        let trace = match ChangeSignal::scan(decoder, cancel) {
            Ok(trace) => trace,
            Err(KeyframeError::Cancelled) => return Err(KeyframeError::Cancelled),
            Err(e) => {
                warn!("⚠️ Segmentation failed ({}), using whole video", e);
                stats.signal_truncated = true;
                stats.threshold_used = self.config.scene_threshold;
                return Ok(vec![Scene::whole(info)]);
            }
        };
        stats.signal_truncated = trace.is_truncated();

        let scenes = match self.config.adaptive_target_count {
            Some(target) => {
                let search =
                    AdaptiveSearch::new(target, self.config.adaptive_tolerance, self.config.search);
                let outcome = search.search(&self.segmenter, &trace, info);
                stats.threshold_used = outcome.threshold;
                stats.search_iterations = Some(outcome.iterations);
                stats.search_trace = outcome.trace;
                outcome.scenes
            }
            None => {
                stats.threshold_used = self.config.scene_threshold;
                self.segmenter
                    .segment(&trace, info, self.config.scene_threshold)
            }
        };

        info!(
            "✓ Detected {} scenes (threshold {:.2})",
            scenes.len(),
            stats.threshold_used
        );
        Ok(scenes)
    }

    /// 按门限和有效性划分候选，全部不通过时升级到兜底层级 1/2。不丢弃任何候选
    pub fn select(&self, candidates: Vec<Candidate>, cutoff: f64) -> Selection {
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();

        for candidate in candidates {
            let reason = if candidate.sharpness() < cutoff {
                Some(RejectionReason::Blurry)
            } else if !candidate.is_valid_content() {
                Some(RejectionReason::BlankOrTransition)
            } else {
                None
            };
            match reason {
                Some(reason) => {
                    debug!(
                        "Rejected @{:.2}s: {:?} (sharpness={:.1}, cutoff={:.1})",
                        candidate.timestamp,
                        reason,
                        candidate.sharpness(),
                        cutoff
                    );
                    rejected.push(RejectedFrame { candidate, reason });
                }
                None => accepted.push(candidate),
            }
        }

        let counts = RejectionCounts::from_rejected(&rejected);
        info!(
            "✓ Gate: {} passed, {} blurry, {} blank/transition",
            accepted.len(),
            counts.blurry,
            counts.blank_or_transition
        );

        if !accepted.is_empty() || rejected.is_empty() {
            return Selection {
                accepted,
                rejected,
                tier: None,
            };
        }

        let (tier, rescued) = self.rescue(&mut rejected);
        Selection {
            accepted: rescued,
            rejected,
            tier: Some(tier),
        }
    }

    /// 从 `rejected` 中取出被救回的候选，列表不能为空
    fn rescue(&self, rejected: &mut Vec<RejectedFrame>) -> (FallbackTier, Vec<Candidate>) {
        let mut valid: Vec<usize> = (0..rejected.len())
            .filter(|&i| rejected[i].candidate.is_valid_content())
            .collect();

        let (tier, mut picks) = if valid.is_empty() {
            let least_invalid = (0..rejected.len())
                .min_by(|&a, &b| {
                    deviation(&rejected[a].candidate).total_cmp(&deviation(&rejected[b].candidate))
                })
                .into_iter()
                .collect::<Vec<_>>();
            (FallbackTier::LeastInvalid, least_invalid)
        } else {
            // 稳定排序：分数相同保持时间顺序
            valid.sort_by(|&a, &b| {
                rejected[b]
                    .candidate
                    .sharpness()
                    .total_cmp(&rejected[a].candidate.sharpness())
            });
            valid.truncate(self.config.fallback_rescue_count);
            (FallbackTier::RescuedSharpest, valid)
        };

        warn!(
            "🛟 Fallback tier {}: rescuing {} candidate(s)",
            tier.level(),
            picks.len()
        );

        // 从后往前移除保证前面的下标不变，再恢复时间顺序
        picks.sort_unstable();
        let mut rescued: Vec<Candidate> = picks
            .iter()
            .rev()
            .map(|&i| rejected.remove(i).candidate)
            .collect();
        rescued.reverse();
        (tier, rescued)
    }

    /// 层级 3：直接解码，跳过分割和门限
    fn safety_net(
        &self,
        decoder: &mut dyn VideoDecoder,
        info: &VideoInfo,
        cancel: &CancelToken,
        mut stats: ProcessingStats,
    ) -> Result<RunOutcome> {
        warn!("🛟 Fallback tier 3: sampling failed for every scene");
        let whole = Scene::whole(info);

        for fraction in SAFETY_NET_POSITIONS {
            cancel.check()?;
            let timestamp = info.duration * fraction;
            match decoder.decode_at(timestamp) {
                Ok(frame) => {
                    let mut candidate = Candidate::new(whole, timestamp, frame);
                    candidate.quality = Some(self.scorer.score(&candidate.frame));
                    let accepted = vec![AcceptedFrame::from_candidate(
                        candidate,
                        Some(FallbackTier::MidpointSafetyNet),
                    )];
                    stats.fallback_tier_used = Some(FallbackTier::MidpointSafetyNet);
                    stats.status = RunStatus::SuccessWithFallback;
                    return Ok(self.finish(accepted, Vec::new(), stats));
                }
                Err(KeyframeError::Cancelled) => return Err(KeyframeError::Cancelled),
                Err(e) => debug!("Safety net decode at {:.2}s failed: {}", timestamp, e),
            }
        }

        error!("❌ No decodable frame anywhere in the video");
        stats.status = RunStatus::Undecodable;
        Ok(self.finish(Vec::new(), Vec::new(), stats))
    }

    fn finish(
        &self,
        accepted: Vec<AcceptedFrame>,
        rejected: Vec<RejectedFrame>,
        mut stats: ProcessingStats,
    ) -> RunOutcome {
        stats.accepted = accepted.len();
        stats.rejected_by_reason = RejectionCounts::from_rejected(&rejected);
        stats.record_sharpness(&accepted);
        log_summary(&stats);

        RunOutcome {
            accepted,
            rejected,
            stats,
        }
    }

    fn empty_outcome(&self, status: RunStatus, info: Option<&VideoInfo>) -> RunOutcome {
        let mut stats = ProcessingStats::empty(status, self.config.sharpness_cutoff_mode);
        stats.video_duration = info.map(|i| i.duration).unwrap_or(0.0);
        RunOutcome {
            accepted: Vec::new(),
            rejected: Vec::new(),
            stats,
        }
    }
}

impl Default for GuaranteeEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn deviation(candidate: &Candidate) -> f64 {
    candidate
        .quality
        .map(|q| q.brightness_deviation())
        .unwrap_or(f64::INFINITY)
}

fn log_summary(stats: &ProcessingStats) {
    info!("📊 Summary: {:?}", stats.status);
    info!(
        "  Scenes: {} (threshold {:.2}, avg {:.2}s)",
        stats.scenes_found, stats.threshold_used, stats.avg_scene_duration
    );
    info!(
        "  Candidates: {} extracted, {} scenes dropped",
        stats.candidates_extracted, stats.scenes_dropped
    );
    info!(
        "  Rejected: {} blurry, {} blank/transition, {} duplicate",
        stats.rejected_by_reason.blurry,
        stats.rejected_by_reason.blank_or_transition,
        stats.rejected_by_reason.duplicate
    );
    info!(
        "  Final keyframes: {} (fallback tier: {:?})",
        stats.accepted,
        stats.fallback_tier_used.map(|t| t.level())
    );
}

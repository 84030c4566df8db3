use super::adaptive::SearchIteration;
use super::config::CutoffMode;
use super::frame::Frame;
use super::quality::QualityScore;
use super::segmenter::Scene;
use serde::{Serialize, Serializer};

/// 经过打分、门限和去重的采样帧
#[derive(Debug, Clone)]
pub struct Candidate {
    pub scene: Scene,
    /// 请求的采样时间 (秒)
    pub timestamp: f64,
    pub frame: Frame,
    pub quality: Option<QualityScore>,
    pub perceptual_hash: Option<u64>,
}

impl Candidate {
    pub fn new(scene: Scene, timestamp: f64, frame: Frame) -> Self {
        Self {
            scene,
            timestamp,
            frame,
            quality: None,
            perceptual_hash: None,
        }
    }

    pub fn sharpness(&self) -> f64 {
        self.quality.map(|q| q.sharpness).unwrap_or(0.0)
    }

    pub fn is_valid_content(&self) -> bool {
        self.quality.map(|q| q.is_valid_content).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    Blurry,
    BlankOrTransition,
    Duplicate,
}

#[derive(Debug, Clone)]
pub struct RejectedFrame {
    pub candidate: Candidate,
    pub reason: RejectionReason,
}

/// 逐级降级，只在严格路径为空时使用
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FallbackTier {
    /// 最清晰的有效候选越过门限被提升
    RescuedSharpest = 1,
    /// 全部候选都是空白帧，保留最不空白的一张
    LeastInvalid = 2,
    /// 采样一无所获，在视频中段解码一帧
    MidpointSafetyNet = 3,
}

impl FallbackTier {
    pub fn level(self) -> u8 {
        self as u8
    }
}

/// 序列化为层级数字 1/2/3，与报告中的 `fallback_tier` 一致
impl Serialize for FallbackTier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.level())
    }
}

#[derive(Debug, Clone)]
pub struct AcceptedFrame {
    pub source_scene: Scene,
    pub timestamp: f64,
    pub frame: Frame,
    pub sharpness: f64,
    pub is_valid_content: bool,
    pub perceptual_hash: Option<u64>,
    /// 由兜底层级救回时为 `Some`
    pub fallback_tier: Option<FallbackTier>,
}

impl AcceptedFrame {
    pub fn from_candidate(candidate: Candidate, fallback_tier: Option<FallbackTier>) -> Self {
        let sharpness = candidate.sharpness();
        let is_valid_content = candidate.is_valid_content();
        Self {
            source_scene: candidate.scene,
            timestamp: candidate.timestamp,
            frame: candidate.frame,
            sharpness,
            is_valid_content,
            perceptual_hash: candidate.perceptual_hash,
            fallback_tier,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RejectionCounts {
    pub blurry: usize,
    pub blank_or_transition: usize,
    pub duplicate: usize,
}

impl RejectionCounts {
    pub fn from_rejected(rejected: &[RejectedFrame]) -> Self {
        let mut counts = Self::default();
        for r in rejected {
            match r.reason {
                RejectionReason::Blurry => counts.blurry += 1,
                RejectionReason::BlankOrTransition => counts.blank_or_transition += 1,
                RejectionReason::Duplicate => counts.duplicate += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.blurry + self.blank_or_transition + self.duplicate
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    SuccessWithFallback,
    UnreadableVideo,
    /// 能打开，但一帧都解码不出来
    Undecodable,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessingStats {
    pub status: RunStatus,
    pub video_duration: f64,
    pub scenes_found: usize,
    pub avg_scene_duration: f64,
    pub threshold_used: f64,
    pub search_iterations: Option<u32>,
    pub search_trace: Vec<SearchIteration>,
    pub signal_truncated: bool,
    pub scenes_dropped: usize,
    pub candidates_extracted: usize,
    pub cutoff_mode: CutoffMode,
    pub sharpness_cutoff: Option<f64>,
    pub accepted: usize,
    pub rejected_by_reason: RejectionCounts,
    pub fallback_tier_used: Option<FallbackTier>,
    pub min_sharpness: f64,
    pub avg_sharpness: f64,
    pub max_sharpness: f64,
}

impl ProcessingStats {
    pub fn empty(status: RunStatus, cutoff_mode: CutoffMode) -> Self {
        Self {
            status,
            video_duration: 0.0,
            scenes_found: 0,
            avg_scene_duration: 0.0,
            threshold_used: 0.0,
            search_iterations: None,
            search_trace: Vec::new(),
            signal_truncated: false,
            scenes_dropped: 0,
            candidates_extracted: 0,
            cutoff_mode,
            sharpness_cutoff: None,
            accepted: 0,
            rejected_by_reason: RejectionCounts::default(),
            fallback_tier_used: None,
            min_sharpness: 0.0,
            avg_sharpness: 0.0,
            max_sharpness: 0.0,
        }
    }

    pub fn record_sharpness(&mut self, accepted: &[AcceptedFrame]) {
        if accepted.is_empty() {
            return;
        }
        let scores = accepted.iter().map(|f| f.sharpness);
        self.min_sharpness = scores.clone().fold(f64::INFINITY, f64::min);
        self.max_sharpness = scores.clone().fold(f64::NEG_INFINITY, f64::max);
        self.avg_sharpness = scores.sum::<f64>() / accepted.len() as f64;
    }
}

/// 一次运行的全部产出，被拒的帧也保留用于报告
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub accepted: Vec<AcceptedFrame>,
    pub rejected: Vec<RejectedFrame>,
    pub stats: ProcessingStats,
}

impl RunOutcome {
    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }
}

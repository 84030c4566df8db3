//! 关键帧选取 - 每个场景一张有代表性、清晰、不重复的帧
//!
//! 流水线：
//! 1. 变化信号 - 相邻帧的 HSV 内容差异
//! 2. 分割 - 固定阈值，或向目标数量自适应查找
//! 3. 采样 - 每个场景时间中点取一帧
//! 4. 质量门限 - 拉普拉斯清晰度，并剔除空白/淡入淡出
//! 5. 去重 - 64 位 DCT 感知哈希，先出现的保留
//!
//! [`GuaranteeEngine`] 给流水线加上逐级兜底，可解码的视频一定有结果

pub mod adaptive;
pub mod cancel;
pub mod candidate;
pub mod change_signal;
pub mod config;
pub mod cutoff;
pub mod deduplicator;
pub mod engine;
pub mod error;
pub mod frame;
pub mod manager;
pub mod phash;
pub mod quality;
pub mod report;
pub mod sampler;
pub mod segmenter;
pub mod source;

pub use adaptive::{AdaptiveSearch, SearchIteration, SearchOutcome};
pub use cancel::CancelToken;
pub use candidate::{
    AcceptedFrame, Candidate, FallbackTier, ProcessingStats, RejectedFrame, RejectionCounts,
    RejectionReason, RunOutcome, RunStatus,
};
pub use change_signal::{ChangeSignal, ContentDiff, SignalTrace};
pub use config::{CutoffMode, KeyframeConfig, SearchBounds, ValidityThresholds};
pub use cutoff::{CutoffPolicy, DynamicBaselineCutoff, FixedCutoff, PercentileCutoff};
pub use deduplicator::FrameDeduplicator;
pub use engine::{GuaranteeEngine, Selection};
pub use error::{KeyframeError, Result};
pub use frame::Frame;
pub use manager::{BatchStats, KeyframeManager};
pub use quality::{QualityScore, QualityScorer};
pub use report::{encode_jpeg, KeyframeReport, ReportFrame};
pub use sampler::FrameSampler;
pub use segmenter::{Scene, SceneSegmenter};
pub use source::{MemoryOpener, MemoryVideo, VideoDecoder, VideoInfo, VideoOpener};

/// 用给定配置对一个视频运行完整流水线
pub fn run(opener: &dyn VideoOpener, video_path: &str, config: KeyframeConfig) -> Result<RunOutcome> {
    GuaranteeEngine::with_config(config)?.run(opener, video_path)
}

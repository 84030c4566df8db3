//! 暴露给 Dart 的关键帧提取器

use crate::api::models::keyframes::{DecodedFrameData, ExtractedKeyframe, KeyframeExtraction};
use crate::core::keyframe::report::DEFAULT_JPEG_QUALITY;
use crate::core::keyframe::{
    BatchStats, Frame, KeyframeConfig, KeyframeError, KeyframeManager, KeyframeReport,
    MemoryOpener, MemoryVideo, ProcessingStats,
};
use flutter_rust_bridge::frb;
use log::{info, warn};
use std::sync::Mutex;

const MEMORY_PATH: &str = "memory://frames";

/// 关键帧提取器 - 每个场景一张清晰且不重复的帧
///
/// ```dart
/// final extractor = KeyframeExtractor.create();
/// final result = await extractor.extract(frames: decoded, frameRate: 30);
/// ```
#[frb(opaque)]
pub struct KeyframeExtractor {
    manager: KeyframeManager,
    last_stats: Mutex<Option<ProcessingStats>>,
}

impl KeyframeExtractor {
    #[frb(sync)]
    pub fn create() -> Self {
        crate::init_logging();
        info!("🎬 KeyframeExtractor: created");
        Self::from_manager(KeyframeManager::new())
    }

    /// 未知字段忽略，缺失字段取默认值
    #[frb(sync)]
    pub fn with_config_json(json: String) -> Result<Self, KeyframeError> {
        crate::init_logging();
        let config = KeyframeConfig::from_json(&json)?;
        info!("🎬 KeyframeExtractor: created with {:?}", config);
        Ok(Self::from_manager(KeyframeManager::with_config(config)?))
    }

    fn from_manager(manager: KeyframeManager) -> Self {
        Self {
            manager,
            last_stats: Mutex::new(None),
        }
    }

    /// 从完整解码的片段中选取关键帧
    #[frb]
    pub fn extract(
        &self,
        frames: Vec<DecodedFrameData>,
        frame_rate: f64,
    ) -> Result<KeyframeExtraction, KeyframeError> {
        let decoded = frames
            .into_iter()
            .enumerate()
            .map(|(i, f)| Frame::new(f.width, f.height, f.rgba, f.timestamp_ms, i as u64))
            .collect::<Result<Vec<_>, _>>()?;

        let mut opener = MemoryOpener::new();
        match MemoryVideo::new(decoded, frame_rate) {
            Ok(video) => opener.insert(MEMORY_PATH, video),
            // 不注册，运行结果为 UnreadableVideo
            Err(e) => warn!("⚠️ Rejected input clip: {}", e),
        }

        let outcome = self.manager.process_one(&opener, MEMORY_PATH)?;
        let report = KeyframeReport::with_jpeg(&outcome, DEFAULT_JPEG_QUALITY)?;
        let stats_json = serde_json::to_string(&report.stats)?;
        let status = serde_json::to_value(report.stats.status)?
            .as_str()
            .unwrap_or_default()
            .to_string();

        if let Ok(mut last) = self.last_stats.lock() {
            *last = Some(report.stats.clone());
        }

        let frames = report
            .frames
            .into_iter()
            .map(|f| ExtractedKeyframe {
                timestamp_ms: (f.timestamp * 1000.0).round() as u64,
                scene_id: f.scene_id as u32,
                sharpness: f.sharpness,
                fallback_tier: f.fallback_tier,
                width: f.width,
                height: f.height,
                jpeg_data: f.jpeg_data,
            })
            .collect();

        Ok(KeyframeExtraction {
            frames,
            status,
            stats_json,
        })
    }

    /// 最近一次 `extract` 的统计，JSON 格式
    #[frb(sync, getter)]
    pub fn last_stats_json(&self) -> Option<String> {
        let last = self.last_stats.lock().ok()?;
        last.as_ref().and_then(|s| serde_json::to_string(s).ok())
    }

    #[frb(sync, getter)]
    pub fn stats(&self) -> BatchStats {
        self.manager.get_stats()
    }

    /// 中止进行中及之后的提取，直到调用 `reset()`
    #[frb(sync)]
    pub fn cancel(&self) {
        self.manager.cancel_token().cancel()
    }

    #[frb(sync)]
    pub fn reset(&self) {
        self.manager.reset();
        if let Ok(mut last) = self.last_stats.lock() {
            *last = None;
        }
    }
}

impl Drop for KeyframeExtractor {
    fn drop(&mut self) {
        info!("🗑️ KeyframeExtractor: released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(count: u64) -> Vec<DecodedFrameData> {
        let rgba: Vec<u8> = (0..32u32 * 32)
            .flat_map(|p| {
                let v = if (p % 32 / 4 + p / 32 / 4) % 2 == 0 { 60 } else { 200 };
                [v, v, v, 255]
            })
            .collect();
        (0..count)
            .map(|n| DecodedFrameData {
                width: 32,
                height: 32,
                rgba: rgba.clone(),
                timestamp_ms: n * 100,
            })
            .collect()
    }

    #[test]
    fn test_extract_returns_jpeg_keyframe() {
        let extractor = KeyframeExtractor::create();
        let result = extractor.extract(clip(40), 10.0).unwrap();

        assert_eq!(result.frames.len(), 1);
        assert_eq!(result.frames[0].timestamp_ms, 2000);
        assert_eq!(&result.frames[0].jpeg_data[..2], &[0xFF, 0xD8]);
        assert!(result.status.starts_with("success"));
        assert!(extractor.last_stats_json().is_some());
        assert_eq!(extractor.stats().processed_videos, 1);
    }

    #[test]
    fn test_empty_clip_is_unreadable() {
        let extractor = KeyframeExtractor::create();
        let result = extractor.extract(Vec::new(), 30.0).unwrap();

        assert!(result.frames.is_empty());
        assert_eq!(result.status, "unreadable_video");
    }

    #[test]
    fn test_bad_buffer_is_rejected() {
        let extractor = KeyframeExtractor::create();
        let mut frames = clip(2);
        frames[1].rgba.truncate(10);

        let result = extractor.extract(frames, 10.0);
        assert!(matches!(result, Err(KeyframeError::InvalidFrame(_))));
    }

    #[test]
    fn test_config_json() {
        let extractor =
            KeyframeExtractor::with_config_json(r#"{"scene_threshold": 30.0}"#.into()).unwrap();
        assert_eq!(extractor.manager.engine().config().scene_threshold, 30.0);
        assert!(KeyframeExtractor::with_config_json("{".into()).is_err());
    }

    #[test]
    fn test_reset_clears_last_stats() {
        let extractor = KeyframeExtractor::create();
        extractor.extract(clip(10), 10.0).unwrap();
        extractor.reset();
        assert!(extractor.last_stats_json().is_none());
        assert_eq!(extractor.stats(), BatchStats::default());
    }

    #[test]
    fn test_extract_retries_after_cancel_and_reset() {
        let extractor = KeyframeExtractor::create();
        extractor.cancel();

        let err = extractor.extract(clip(20), 10.0).unwrap_err();
        assert!(err.is_transient());

        extractor.reset();
        let result = extractor.extract(clip(20), 10.0).unwrap();
        assert_eq!(result.frames.len(), 1);
    }
}

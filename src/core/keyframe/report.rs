//! 可序列化的运行摘要，以及选中帧的 JPEG 导出

use super::candidate::{AcceptedFrame, ProcessingStats, RunOutcome};
use super::error::Result;
use super::frame::Frame;
use image::{DynamicImage, ImageOutputFormat};
use serde::Serialize;
use std::io::Cursor;

pub const DEFAULT_JPEG_QUALITY: u8 = 90;

#[derive(Debug, Clone, Serialize)]
pub struct ReportFrame {
    pub timestamp: f64,
    pub scene_id: usize,
    pub scene_start: f64,
    pub scene_end: f64,
    pub sharpness: f64,
    pub is_valid_content: bool,
    /// 由兜底层级救回时为 1、2 或 3
    pub fallback_tier: Option<u8>,
    pub width: u32,
    pub height: u32,
    #[serde(skip)]
    pub jpeg_data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyframeReport {
    pub stats: ProcessingStats,
    pub frames: Vec<ReportFrame>,
}

impl KeyframeReport {
    /// 只含元数据，`jpeg_data` 为空
    pub fn from_outcome(outcome: &RunOutcome) -> Self {
        Self {
            stats: outcome.stats.clone(),
            frames: outcome.accepted.iter().map(Self::describe).collect(),
        }
    }

    /// 同 [`from_outcome`](Self::from_outcome)，并编码每一帧
    pub fn with_jpeg(outcome: &RunOutcome, quality: u8) -> Result<Self> {
        let mut report = Self::from_outcome(outcome);
        for (entry, accepted) in report.frames.iter_mut().zip(&outcome.accepted) {
            entry.jpeg_data = encode_jpeg(&accepted.frame, quality)?;
        }
        Ok(report)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn describe(frame: &AcceptedFrame) -> ReportFrame {
        ReportFrame {
            timestamp: frame.timestamp,
            scene_id: frame.source_scene.scene_id,
            scene_start: frame.source_scene.start_time,
            scene_end: frame.source_scene.end_time,
            sharpness: frame.sharpness,
            is_valid_content: frame.is_valid_content,
            fallback_tier: frame.fallback_tier.map(|t| t.level()),
            width: frame.frame.width,
            height: frame.frame.height,
            jpeg_data: Vec::new(),
        }
    }
}

/// RGBA 帧 → baseline JPEG，丢弃 alpha
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>> {
    let rgb = DynamicImage::ImageRgba8(frame.to_rgba_image()?).to_rgb8();
    let mut buffer = Cursor::new(Vec::new());
    rgb.write_to(&mut buffer, ImageOutputFormat::Jpeg(quality.clamp(1, 100)))?;
    Ok(buffer.into_inner())
}

use serde::{Deserialize, Serialize};

/// 宿主解码好的 RGBA 帧，按调用时给出的帧率等间隔排列
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodedFrameData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedKeyframe {
    pub timestamp_ms: u64,
    pub scene_id: u32,
    pub sharpness: f64,
    /// 来自兜底层级时为 1-3
    pub fallback_tier: Option<u8>,
    pub width: u32,
    pub height: u32,
    pub jpeg_data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyframeExtraction {
    pub frames: Vec<ExtractedKeyframe>,
    /// `RunStatus` 的 snake_case 名称
    pub status: String,
    /// 完整 `ProcessingStats` 的 JSON
    pub stats_json: String,
}

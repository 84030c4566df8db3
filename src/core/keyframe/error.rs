use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyframeError {
    #[error("Unreadable video: {0}")]
    UnreadableVideo(String),
    #[error("Frame unavailable at {timestamp:.3}s: {reason}")]
    FrameUnavailable { timestamp: f64, reason: String },
    #[error("Decode error at frame {frame_index}: {reason}")]
    DecodeError { frame_index: u64, reason: String },
    #[error("Invalid frame buffer: {0}")]
    InvalidFrame(String),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Run cancelled")]
    Cancelled,
}

impl KeyframeError {
    /// 临时性错误，重新运行同一视频即可重试
    pub fn is_transient(&self) -> bool {
        matches!(self, KeyframeError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, KeyframeError>;

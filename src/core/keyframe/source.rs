//! 流水线使用的解码能力
//!
//! 真正的解码不在本 crate 内。宿主要么基于自己的解码器实现 [`VideoDecoder`]，
//! 要么把解码好的帧放进 [`MemoryVideo`]。

use super::change_signal::ContentDiff;
use super::error::{KeyframeError, Result};
use super::frame::Frame;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    /// 秒
    pub duration: f64,
    pub frame_rate: f64,
    pub frame_count: u64,
}

impl VideoInfo {
    pub fn timestamp_of(&self, frame_index: u64) -> f64 {
        (frame_index as f64 / self.frame_rate).min(self.duration)
    }
}

/// 第 `frame_index - 1` 帧与第 `frame_index` 帧之间的差异
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalSample {
    pub frame_index: u64,
    pub score: f64,
}

pub type SignalStream<'a> = Box<dyn Iterator<Item = Result<SignalSample>> + 'a>;

/// 已打开的视频，一个解码器只属于一次运行
pub trait VideoDecoder {
    fn info(&self) -> VideoInfo;

    /// 解码离 `timestamp` (秒) 最近的帧
    fn decode_at(&mut self, timestamp: f64) -> Result<Frame>;

    /// 整条流的相邻帧差异扫描，每次调用都从第一帧重新开始
    fn stream_pairs(&mut self) -> SignalStream<'_>;
}

pub trait VideoOpener: Send + Sync {
    fn open(&self, video_path: &str) -> Result<Box<dyn VideoDecoder>>;
}

/// 内存中的宿主解码帧，按 `frame_rate` 等间隔排列
#[derive(Debug, Clone)]
pub struct MemoryVideo {
    frames: Arc<Vec<Frame>>,
    frame_rate: f64,
}

impl MemoryVideo {
    pub fn new(frames: Vec<Frame>, frame_rate: f64) -> Result<Self> {
        if frames.is_empty() {
            return Err(KeyframeError::UnreadableVideo("no frames".into()));
        }
        if !(frame_rate.is_finite() && frame_rate > 0.0) {
            return Err(KeyframeError::UnreadableVideo(format!(
                "invalid frame rate {}",
                frame_rate
            )));
        }
        debug!(
            "📼 MemoryVideo: {} frames @ {:.2}fps",
            frames.len(),
            frame_rate
        );
        Ok(Self {
            frames: Arc::new(frames),
            frame_rate,
        })
    }
}

impl VideoDecoder for MemoryVideo {
    fn info(&self) -> VideoInfo {
        let frame_count = self.frames.len() as u64;
        VideoInfo {
            duration: frame_count as f64 / self.frame_rate,
            frame_rate: self.frame_rate,
            frame_count,
        }
    }

    fn decode_at(&mut self, timestamp: f64) -> Result<Frame> {
        let info = self.info();
        if !(timestamp >= 0.0 && timestamp <= info.duration) {
            return Err(KeyframeError::FrameUnavailable {
                timestamp,
                reason: format!("outside [0, {:.3}]", info.duration),
            });
        }
        let index = ((timestamp * self.frame_rate).round() as usize).min(self.frames.len() - 1);
        Ok(self.frames[index].clone())
    }

    fn stream_pairs(&mut self) -> SignalStream<'_> {
        Box::new(MemorySignal {
            frames: self.frames.as_slice(),
            diff: ContentDiff::new(),
            next: 0,
        })
    }
}

struct MemorySignal<'a> {
    frames: &'a [Frame],
    diff: ContentDiff,
    next: usize,
}

impl Iterator for MemorySignal<'_> {
    type Item = Result<SignalSample>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.frames.len() {
            let index = self.next;
            self.next += 1;
            match self.diff.score(&self.frames[index]) {
                Ok(Some(score)) => {
                    return Some(Ok(SignalSample {
                        frame_index: index as u64,
                        score,
                    }))
                }
                Ok(None) => continue,
                Err(e) => {
                    // 第一次失败后停止
                    self.next = self.frames.len();
                    return Some(Err(KeyframeError::DecodeError {
                        frame_index: index as u64,
                        reason: e.to_string(),
                    }));
                }
            }
        }
        None
    }
}

/// 把视频路径解析为内存视频
#[derive(Debug, Clone, Default)]
pub struct MemoryOpener {
    videos: HashMap<String, MemoryVideo>,
}

impl MemoryOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, video_path: impl Into<String>, video: MemoryVideo) {
        self.videos.insert(video_path.into(), video);
    }
}

impl VideoOpener for MemoryOpener {
    fn open(&self, video_path: &str) -> Result<Box<dyn VideoDecoder>> {
        self.videos
            .get(video_path)
            .cloned()
            .map(|v| Box::new(v) as Box<dyn VideoDecoder>)
            .ok_or_else(|| KeyframeError::UnreadableVideo(format!("{}: not found", video_path)))
    }
}

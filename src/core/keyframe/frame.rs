use super::error::{KeyframeError, Result};
use image::{imageops, GrayImage, RgbaImage};
use std::time::Duration;

/// 解码后的视频帧 (RGBA，行优先)
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub timestamp: Duration,
    pub frame_number: u64,
}

impl Frame {
    pub fn new(
        width: u32,
        height: u32,
        data: Vec<u8>,
        timestamp_ms: u64,
        frame_number: u64,
    ) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || data.len() != expected {
            return Err(KeyframeError::InvalidFrame(format!(
                "{}x{} frame needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }

        Ok(Self {
            width,
            height,
            data,
            timestamp: Duration::from_millis(timestamp_ms),
            frame_number,
        })
    }

    /// 由单通道缓冲构建帧，亮度复制到 RGB
    pub fn from_luma(
        width: u32,
        height: u32,
        luma: &[u8],
        timestamp_ms: u64,
        frame_number: u64,
    ) -> Result<Self> {
        let rgba: Vec<u8> = luma.iter().flat_map(|&y| [y, y, y, 255]).collect();
        Self::new(width, height, rgba, timestamp_ms, frame_number)
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// BT.601 亮度，整数权重
    pub fn to_gray(&self) -> GrayImage {
        let mut gray = Vec::with_capacity(self.pixel_count());
        gray.extend(self.data.chunks_exact(4).map(|rgba| {
            ((rgba[0] as u32 * 299 + rgba[1] as u32 * 587 + rgba[2] as u32 * 114) / 1000) as u8
        }));
        GrayImage::from_raw(self.width, self.height, gray)
            .unwrap_or_else(|| GrayImage::new(self.width, self.height))
    }

    pub fn to_rgba_image(&self) -> Result<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data.clone()).ok_or_else(|| {
            KeyframeError::InvalidFrame(format!(
                "buffer does not match {}x{}",
                self.width, self.height
            ))
        })
    }

    pub fn resize_to(&self, target_width: u32, target_height: u32) -> Result<Frame> {
        let img = self.to_rgba_image()?;
        let resized = imageops::resize(
            &img,
            target_width,
            target_height,
            imageops::FilterType::Triangle,
        );

        Ok(Frame {
            width: target_width,
            height: target_height,
            data: resized.into_raw(),
            timestamp: self.timestamp,
            frame_number: self.frame_number,
        })
    }
}

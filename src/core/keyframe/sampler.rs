use super::candidate::Candidate;
use super::error::Result;
use super::segmenter::Scene;
use super::source::VideoDecoder;
use log::debug;

/// 每个场景取一帧，位置在场景时间中点
///
/// 靠近切点的帧最容易处在转场或运动模糊中，中点离两端都最远
pub struct FrameSampler;

impl FrameSampler {
    pub fn sample(decoder: &mut dyn VideoDecoder, scene: &Scene) -> Result<Candidate> {
        let timestamp = scene.midpoint();
        let frame = decoder.decode_at(timestamp)?;
        debug!(
            "🎞️ Scene {} [{:.2}s, {:.2}s) sampled at {:.2}s (frame {})",
            scene.scene_id, scene.start_time, scene.end_time, timestamp, frame.frame_number
        );
        Ok(Candidate::new(*scene, timestamp, frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::keyframe::error::KeyframeError;
    use crate::core::keyframe::frame::Frame;
    use crate::core::keyframe::source::MemoryVideo;

    fn video(frame_count: u64, fps: f64) -> MemoryVideo {
        let frames = (0..frame_count)
            .map(|i| {
                Frame::new(4, 4, vec![(i % 256) as u8; 64], (i as f64 * 1000.0 / fps) as u64, i)
                    .unwrap()
            })
            .collect();
        MemoryVideo::new(frames, fps).unwrap()
    }

    #[test]
    fn test_samples_midpoint() {
        let mut video = video(100, 10.0);
        let scene = Scene {
            scene_id: 0,
            start_time: 0.0,
            end_time: 10.0,
            start_frame: 0,
            end_frame: 100,
        };
        let candidate = FrameSampler::sample(&mut video, &scene).unwrap();

        assert_eq!(candidate.timestamp, 5.0);
        assert_eq!(candidate.frame.frame_number, 50);
        assert!(candidate.quality.is_none());
        assert!(candidate.perceptual_hash.is_none());
    }

    #[test]
    fn test_unavailable_frame_is_reported() {
        let mut video = video(10, 10.0);
        let scene = Scene {
            scene_id: 3,
            start_time: 20.0,
            end_time: 30.0,
            start_frame: 200,
            end_frame: 300,
        };
        let result = FrameSampler::sample(&mut video, &scene);
        assert!(matches!(result, Err(KeyframeError::FrameUnavailable { .. })));
    }
}

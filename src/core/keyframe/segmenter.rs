use super::change_signal::SignalTrace;
use super::source::VideoInfo;
use log::debug;
use serde::Serialize;

/// 连续的镜头区间，`[start_time, end_time)`，单位秒
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Scene {
    pub scene_id: usize,
    pub start_time: f64,
    pub end_time: f64,
    pub start_frame: u64,
    /// 不含
    pub end_frame: u64,
}

impl Scene {
    /// 退化但合法的分割：一个场景覆盖整个视频
    pub fn whole(info: &VideoInfo) -> Self {
        Self {
            scene_id: 0,
            start_time: 0.0,
            end_time: info.duration,
            start_frame: 0,
            end_frame: info.frame_count.max(1),
        }
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    pub fn midpoint(&self) -> f64 {
        (self.start_time + self.end_time) / 2.0
    }
}

/// 以给定灵敏度阈值把变化信号切成场景
pub struct SceneSegmenter {
    min_scene_len: u32,
}

impl SceneSegmenter {
    pub fn new(min_scene_len: u32) -> Self {
        Self { min_scene_len }
    }

    /// 分数超过 `threshold` 的样本处放置切点，前提是当前场景已满 `min_scene_len` 帧。
    /// 不会返回空列表
    pub fn segment(&self, trace: &SignalTrace, info: &VideoInfo, threshold: f64) -> Vec<Scene> {
        let end_frame = trace
            .truncated_at
            .unwrap_or(info.frame_count)
            .min(info.frame_count)
            .max(1);

        let mut cuts: Vec<u64> = Vec::new();
        let mut scene_start = 0u64;

        for sample in &trace.samples {
            // 帧号必须越过当前场景起点，乱序或重复的样本直接跳过
            if sample.frame_index <= scene_start || sample.frame_index >= end_frame {
                continue;
            }
            if sample.score > threshold
                && sample.frame_index - scene_start >= self.min_scene_len as u64
            {
                cuts.push(sample.frame_index);
                scene_start = sample.frame_index;
            }
        }

        if cuts.is_empty() && !trace.is_truncated() {
            return vec![Scene::whole(info)];
        }

        let end_time = if trace.is_truncated() {
            info.timestamp_of(end_frame)
        } else {
            info.duration
        };

        let mut bounds = Vec::with_capacity(cuts.len() + 2);
        bounds.push(0u64);
        bounds.extend(cuts);
        bounds.push(end_frame);

        let mut scenes: Vec<Scene> = Vec::with_capacity(bounds.len() - 1);
        for pair in bounds.windows(2) {
            let (start, end) = (pair[0], pair[1]);
            let start_time = info.timestamp_of(start);
            let scene_end_time = if end == end_frame {
                end_time
            } else {
                info.timestamp_of(end)
            };
            if start_time < scene_end_time {
                scenes.push(Scene {
                    scene_id: scenes.len(),
                    start_time,
                    end_time: scene_end_time,
                    start_frame: start,
                    end_frame: end,
                });
            }
        }

        debug!(
            "✂️ threshold {:.2} → {} scenes",
            threshold,
            scenes.len()
        );

        if scenes.is_empty() {
            vec![Scene::whole(info)]
        } else {
            scenes
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::keyframe::source::SignalSample;

    fn ten_second_info() -> VideoInfo {
        VideoInfo {
            duration: 10.0,
            frame_rate: 30.0,
            frame_count: 300,
        }
    }

    fn trace_with_spikes(frame_count: u64, spikes: &[(u64, f64)]) -> SignalTrace {
        let samples = (1..frame_count)
            .map(|frame_index| SignalSample {
                frame_index,
                score: spikes
                    .iter()
                    .find(|(i, _)| *i == frame_index)
                    .map(|(_, s)| *s)
                    .unwrap_or(1.0),
            })
            .collect();
        SignalTrace {
            samples,
            truncated_at: None,
        }
    }

    #[test]
    fn test_single_shot_is_whole_video() {
        let info = ten_second_info();
        let trace = trace_with_spikes(300, &[]);
        let scenes = SceneSegmenter::new(15).segment(&trace, &info, 27.0);

        assert_eq!(scenes.len(), 1);
        assert_eq!(scenes[0].start_time, 0.0);
        assert_eq!(scenes[0].end_time, 10.0);
        assert_eq!(scenes[0].midpoint(), 5.0);
    }

    #[test]
    fn test_infinite_threshold_never_cuts() {
        let info = ten_second_info();
        let trace = trace_with_spikes(300, &[(90, 80.0), (180, 90.0)]);
        let scenes = SceneSegmenter::new(15).segment(&trace, &info, f64::INFINITY);

        assert_eq!(scenes, vec![Scene::whole(&info)]);
    }

    #[test]
    fn test_cuts_are_ordered_and_cover_video() {
        let info = ten_second_info();
        let trace = trace_with_spikes(300, &[(90, 40.0), (180, 35.0)]);
        let scenes = SceneSegmenter::new(15).segment(&trace, &info, 27.0);

        assert_eq!(scenes.len(), 3);
        assert_eq!(scenes[0].end_frame, 90);
        assert_eq!(scenes[1].start_frame, 90);
        assert!((scenes[1].start_time - 3.0).abs() < 1e-9);
        assert_eq!(scenes[2].end_time, 10.0);
        for pair in scenes.windows(2) {
            assert_eq!(pair[0].end_time, pair[1].start_time);
            assert!(pair[0].start_time < pair[0].end_time);
        }
    }

    #[test]
    fn test_min_scene_len_suppresses_flicker() {
        let info = ten_second_info();
        let trace = trace_with_spikes(300, &[(90, 40.0), (95, 40.0)]);
        let scenes = SceneSegmenter::new(15).segment(&trace, &info, 27.0);

        assert_eq!(scenes.len(), 2);
        assert_eq!(scenes[1].start_frame, 90);
    }

    #[test]
    fn test_truncated_trace_closes_at_last_frame() {
        let info = ten_second_info();
        let mut trace = trace_with_spikes(150, &[(60, 50.0)]);
        trace.truncated_at = Some(150);
        let scenes = SceneSegmenter::new(15).segment(&trace, &info, 27.0);

        assert_eq!(scenes.len(), 2);
        assert_eq!(scenes[1].end_frame, 150);
        assert!((scenes[1].end_time - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_order_samples_are_skipped() {
        let info = ten_second_info();
        let samples = [(100, 60.0), (40, 90.0), (100, 90.0), (200, 70.0)]
            .iter()
            .map(|&(frame_index, score)| SignalSample { frame_index, score })
            .collect();
        let trace = SignalTrace {
            samples,
            truncated_at: None,
        };
        let scenes = SceneSegmenter::new(15).segment(&trace, &info, 27.0);

        let starts: Vec<u64> = scenes.iter().map(|s| s.start_frame).collect();
        assert_eq!(starts, vec![0, 100, 200]);
    }
}

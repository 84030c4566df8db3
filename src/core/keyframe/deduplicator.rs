use super::candidate::Candidate;
use super::phash::{hamming_distance, phash};
use log::{debug, info};

/// 被丢弃的候选归到了哪里
#[derive(Debug, Clone)]
pub struct Duplicate {
    pub candidate: Candidate,
    /// 匹配到的代表帧在保留列表中的下标
    pub kept_index: usize,
    pub distance: u32,
}

/// 每组相近指纹只保留第一帧
///
/// 保持输入顺序；候选按时间顺序到达，所以同一画面最早出现的保留。
/// 与每个已保留的代表帧比较，候选在几十到几百张时足够
pub struct FrameDeduplicator {
    hamming_bound: u32,
}

impl FrameDeduplicator {
    pub fn new() -> Self {
        Self::with_threshold(5)
    }

    pub fn with_threshold(hamming_bound: u32) -> Self {
        Self { hamming_bound }
    }

    /// 补齐缺失的指纹，再分成保留和重复两部分。距离等于上界也算重复
    pub fn deduplicate(&self, candidates: Vec<Candidate>) -> (Vec<Candidate>, Vec<Duplicate>) {
        let total = candidates.len();
        let mut kept: Vec<Candidate> = Vec::with_capacity(total);
        let mut duplicates = Vec::new();

        for mut candidate in candidates {
            let hash = *candidate
                .perceptual_hash
                .get_or_insert_with(|| phash(&candidate.frame));

            let matched = kept.iter().enumerate().find_map(|(i, k)| {
                let other = k.perceptual_hash?;
                let distance = hamming_distance(hash, other);
                (distance <= self.hamming_bound).then_some((i, distance))
            });

            match matched {
                Some((kept_index, distance)) => {
                    debug!(
                        "Frame @{:.2}s duplicate of @{:.2}s (distance={})",
                        candidate.timestamp, kept[kept_index].timestamp, distance
                    );
                    duplicates.push(Duplicate {
                        candidate,
                        kept_index,
                        distance,
                    });
                }
                None => kept.push(candidate),
            }
        }

        info!(
            "✓ Kept {}/{} frames ({} duplicates)",
            kept.len(),
            total,
            duplicates.len()
        );
        (kept, duplicates)
    }
}

impl Default for FrameDeduplicator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::keyframe::frame::Frame;
    use crate::core::keyframe::segmenter::Scene;

    fn create_candidate(timestamp: f64, hash: Option<u64>, fill: u8) -> Candidate {
        let scene = Scene {
            scene_id: 0,
            start_time: timestamp - 0.5,
            end_time: timestamp + 0.5,
            start_frame: 0,
            end_frame: 1,
        };
        let frame = Frame::new(32, 32, vec![fill; 32 * 32 * 4], (timestamp * 1000.0) as u64, 0)
            .unwrap();
        let mut c = Candidate::new(scene, timestamp, frame);
        c.perceptual_hash = hash;
        c
    }

    /// 8×8 grid of pseudo-random blocks, upscaled to 64×64.
    fn textured_candidate(timestamp: f64, seed: u32) -> Candidate {
        let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
        let blocks: Vec<u8> = (0..64)
            .map(|_| {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                (state >> 16) as u8
            })
            .collect();
        let luma: Vec<u8> = (0..64u32 * 64)
            .map(|p| {
                let (x, y) = (p % 64, p / 64);
                blocks[((y / 8) * 8 + x / 8) as usize]
            })
            .collect();
        let frame = Frame::from_luma(64, 64, &luma, (timestamp * 1000.0) as u64, 0).unwrap();
        let scene = Scene {
            scene_id: 0,
            start_time: 0.0,
            end_time: timestamp * 2.0,
            start_frame: 0,
            end_frame: 1,
        };
        Candidate::new(scene, timestamp, frame)
    }

    #[test]
    fn test_identical_fingerprints_keep_earliest() {
        let dedup = FrameDeduplicator::new();
        let (kept, dups) = dedup.deduplicate(vec![
            create_candidate(1.0, Some(0xABCD), 0),
            create_candidate(2.0, Some(0xABCD), 0),
        ]);

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].timestamp, 1.0);
        assert_eq!(dups.len(), 1);
        assert_eq!(dups[0].candidate.timestamp, 2.0);
        assert_eq!(dups[0].distance, 0);
    }

    #[test]
    fn test_bound_is_inclusive() {
        let dedup = FrameDeduplicator::with_threshold(5);
        let (kept, dups) = dedup.deduplicate(vec![
            create_candidate(1.0, Some(0), 0),
            create_candidate(2.0, Some(0b11111), 0),
        ]);
        assert_eq!(kept.len(), 1);
        assert_eq!(dups[0].distance, 5);
    }

    #[test]
    fn test_beyond_bound_is_kept() {
        let dedup = FrameDeduplicator::with_threshold(5);
        let (kept, dups) = dedup.deduplicate(vec![
            create_candidate(1.0, Some(0), 0),
            create_candidate(2.0, Some(0b111111), 0),
        ]);
        assert_eq!(kept.len(), 2);
        assert!(dups.is_empty());
    }

    #[test]
    fn test_compares_against_all_kept() {
        let dedup = FrameDeduplicator::with_threshold(2);
        let (kept, dups) = dedup.deduplicate(vec![
            create_candidate(1.0, Some(0), 0),
            create_candidate(2.0, Some(u64::MAX), 0),
            create_candidate(3.0, Some(1), 0),
        ]);
        assert_eq!(kept.len(), 2);
        assert_eq!(dups[0].kept_index, 0);
    }

    #[test]
    fn test_computes_missing_fingerprints() {
        let dedup = FrameDeduplicator::new();
        let (kept, dups) = dedup.deduplicate(vec![
            textured_candidate(1.0, 7),
            textured_candidate(2.0, 7),
            textured_candidate(3.0, 99),
        ]);
        assert_eq!(kept.len(), 2);
        assert_eq!(dups.len(), 1);
        assert!(kept.iter().all(|c| c.perceptual_hash.is_some()));
        assert_eq!(kept[1].timestamp, 3.0);
    }

    #[test]
    fn test_empty_input() {
        let (kept, dups) = FrameDeduplicator::new().deduplicate(vec![]);
        assert!(kept.is_empty());
        assert!(dups.is_empty());
    }
}

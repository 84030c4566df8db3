//! 阈值闭环调节
//!
//! 对分割阈值做二分查找，直到场景数落在 `target ± tolerance` 内。
//! 阈值越高场景越少：分得过多就抬高下界，过少就压低上界。
//! 迭代用完时返回见过的最接近结果，距离相同取场景更少的。

use super::change_signal::SignalTrace;
use super::config::SearchBounds;
use super::segmenter::{Scene, SceneSegmenter};
use super::source::VideoInfo;
use log::{debug, info};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchIteration {
    pub iteration: u32,
    pub threshold: f64,
    pub scene_count: usize,
    pub distance: usize,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub threshold: f64,
    pub scenes: Vec<Scene>,
    pub iterations: u32,
    pub converged: bool,
    pub trace: Vec<SearchIteration>,
}

#[derive(Debug, Clone)]
struct BestResult {
    threshold: f64,
    scenes: Vec<Scene>,
    distance: usize,
}

/// 单次查找的状态，返回时释放
#[derive(Debug, Clone)]
pub struct AdaptiveSearchState {
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub current_threshold: f64,
    pub iteration: u32,
    best_result: Option<BestResult>,
}

impl AdaptiveSearchState {
    fn new(bounds: &SearchBounds) -> Self {
        Self {
            lower_bound: bounds.min_threshold,
            upper_bound: bounds.max_threshold,
            current_threshold: (bounds.min_threshold + bounds.max_threshold) / 2.0,
            iteration: 0,
            best_result: None,
        }
    }

    /// 严格更接近，或距离相同但场景更少时才替换
    fn offer(&mut self, threshold: f64, scenes: &[Scene], distance: usize) {
        let better = match &self.best_result {
            None => true,
            Some(best) => {
                distance < best.distance
                    || (distance == best.distance && scenes.len() < best.scenes.len())
            }
        };
        if better {
            self.best_result = Some(BestResult {
                threshold,
                scenes: scenes.to_vec(),
                distance,
            });
        }
    }
}

pub struct AdaptiveSearch {
    target: usize,
    tolerance: usize,
    bounds: SearchBounds,
}

impl AdaptiveSearch {
    pub fn new(target: u32, tolerance: u32, bounds: SearchBounds) -> Self {
        Self {
            target: target as usize,
            tolerance: tolerance as usize,
            bounds,
        }
    }

    pub fn search(
        &self,
        segmenter: &SceneSegmenter,
        trace: &SignalTrace,
        info: &VideoInfo,
    ) -> SearchOutcome {
        info!(
            "🎯 Adaptive search: target {}±{} in [{:.1}, {:.1}]",
            self.target, self.tolerance, self.bounds.min_threshold, self.bounds.max_threshold
        );

        let mut state = AdaptiveSearchState::new(&self.bounds);
        let mut history = Vec::new();
        let mut converged = false;

        while state.iteration < self.bounds.max_iterations {
            state.current_threshold = (state.lower_bound + state.upper_bound) / 2.0;
            let threshold = state.current_threshold;
            let scenes = segmenter.segment(trace, info, threshold);
            let count = scenes.len();
            let distance = count.abs_diff(self.target);

            debug!(
                "Iteration {}: threshold={:.2} → {} scenes",
                state.iteration, threshold, count
            );
            history.push(SearchIteration {
                iteration: state.iteration,
                threshold,
                scene_count: count,
                distance,
            });
            state.offer(threshold, &scenes, distance);
            state.iteration += 1;

            if distance <= self.tolerance {
                converged = true;
                break;
            }

            if count > self.target {
                state.lower_bound = threshold;
            } else {
                state.upper_bound = threshold;
            }
        }

        let iterations = state.iteration;
        let (threshold, scenes) = match state.best_result {
            Some(best) => (best.threshold, best.scenes),
            None => {
                // max_iterations 已校验 > 0，这里仍给出合理结果
                let threshold = state.current_threshold;
                (threshold, segmenter.segment(trace, info, threshold))
            }
        };

        if converged {
            info!(
                "✅ Converged at threshold {:.2} ({} scenes, {} iterations)",
                threshold,
                scenes.len(),
                iterations
            );
        } else {
            info!(
                "⚠️ No convergence after {} iterations, closest: threshold {:.2} ({} scenes)",
                iterations,
                threshold,
                scenes.len()
            );
        }

        SearchOutcome {
            threshold,
            scenes,
            iterations,
            converged,
            trace: history,
        }
    }
}

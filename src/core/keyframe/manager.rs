//! 多视频批处理

use super::cancel::CancelToken;
use super::candidate::RunOutcome;
use super::config::KeyframeConfig;
use super::engine::GuaranteeEngine;
use super::error::Result;
use super::source::VideoOpener;
use log::{info, warn};
use rayon::prelude::*;
use std::sync::{Arc, Mutex};

/// 自创建或上次重置以来所有运行的计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub processed_videos: u64,
    pub accepted_frames: u64,
    pub fallback_runs: u64,
}

/// 并行处理互相独立的视频。每个视频有自己的解码器和流水线，
/// 只共享计数和取消标记
pub struct KeyframeManager {
    engine: GuaranteeEngine,
    cancel: CancelToken,
    threads: usize,
    processed_count: Arc<Mutex<u64>>,
    accepted_count: Arc<Mutex<u64>>,
    fallback_count: Arc<Mutex<u64>>,
}

impl KeyframeManager {
    pub fn new() -> Self {
        Self::from_engine(GuaranteeEngine::new())
    }

    pub fn with_config(config: KeyframeConfig) -> Result<Self> {
        Ok(Self::from_engine(GuaranteeEngine::with_config(config)?))
    }

    fn from_engine(engine: GuaranteeEngine) -> Self {
        Self {
            engine,
            cancel: CancelToken::new(),
            threads: num_cpus::get().clamp(1, 4),
            processed_count: Arc::new(Mutex::new(0)),
            accepted_count: Arc::new(Mutex::new(0)),
            fallback_count: Arc::new(Mutex::new(0)),
        }
    }

    pub fn engine(&self) -> &GuaranteeEngine {
        &self.engine
    }

    /// 本管理器发起的所有运行都会观察这个令牌
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn get_stats(&self) -> BatchStats {
        let read = |counter: &Arc<Mutex<u64>>| counter.lock().map(|c| *c).unwrap_or(0);
        BatchStats {
            processed_videos: read(&self.processed_count),
            accepted_frames: read(&self.accepted_count),
            fallback_runs: read(&self.fallback_count),
        }
    }

    /// 计数清零，并清除取消标记
    pub fn reset(&self) {
        self.cancel.clear();
        for counter in [&self.processed_count, &self.accepted_count, &self.fallback_count] {
            if let Ok(mut count) = counter.lock() {
                *count = 0;
            }
        }
    }

    pub fn process_one(&self, opener: &dyn VideoOpener, video_path: &str) -> Result<RunOutcome> {
        let outcome = self.engine.run_with_cancel(opener, video_path, &self.cancel)?;
        self.record(&outcome);
        Ok(outcome)
    }

    /// 结果按输入顺序返回。被取消的运行在对应位置得到 `Err(Cancelled)`，
    /// 其他视频不受影响
    pub fn process_batch(
        &self,
        opener: &dyn VideoOpener,
        video_paths: &[String],
    ) -> Vec<Result<RunOutcome>> {
        info!(
            "🎬 Batch: {} videos on {} threads",
            video_paths.len(),
            self.threads
        );

        let run_all = || -> Vec<Result<RunOutcome>> {
            video_paths
                .par_iter()
                .map(|path| self.process_one(opener, path))
                .collect()
        };

        let results = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
        {
            Ok(pool) => pool.install(run_all),
            Err(e) => {
                warn!("⚠️ Thread pool unavailable ({}), using global pool", e);
                run_all()
            }
        };

        let stats = self.get_stats();
        info!(
            "✓ Batch done: {} videos total, {} keyframes, {} with fallback",
            stats.processed_videos, stats.accepted_frames, stats.fallback_runs
        );
        results
    }

    fn record(&self, outcome: &RunOutcome) {
        if let Ok(mut count) = self.processed_count.lock() {
            *count += 1;
        }
        if let Ok(mut count) = self.accepted_count.lock() {
            *count += outcome.accepted.len() as u64;
        }
        if outcome.stats.fallback_tier_used.is_some() {
            if let Ok(mut count) = self.fallback_count.lock() {
                *count += 1;
            }
        }
    }
}

impl Default for KeyframeManager {
    fn default() -> Self {
        Self::new()
    }
}

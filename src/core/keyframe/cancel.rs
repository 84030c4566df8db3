use super::error::{KeyframeError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 共享的中止标记，克隆体观察同一个标记
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// 清除取消标记，之后的运行可以重试
    pub fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(KeyframeError::Cancelled)
        } else {
            Ok(())
        }
    }
}

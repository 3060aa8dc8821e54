//! 调用参数与重试策略

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::Voice;

/// 默认输出文件名（相对当前目录）
pub const DEFAULT_OUTPUT_FILE: &str = "output.mp3";

/// 单次调用参数
///
/// 对应一次 speak 调用，可逐项覆盖默认值
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakOptions {
    pub voice: Voice,
    pub output_path: PathBuf,
    /// 单个请求的超时
    pub timeout: Duration,
    /// 为 true 时逐片段进度以 info 级别输出，否则为 debug
    pub verbose: bool,
}

impl Default for SpeakOptions {
    fn default() -> Self {
        Self {
            voice: Voice::default(),
            output_path: PathBuf::from(DEFAULT_OUTPUT_FILE),
            timeout: Duration::from_secs(30),
            verbose: true,
        }
    }
}

impl SpeakOptions {
    pub fn with_voice(mut self, voice: Voice) -> Self {
        self.voice = voice;
        self
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// 有界指数退避重试策略
///
/// 第 n 次失败后等待 `min(initial_backoff * multiplier^(n-1), max_backoff)`，
/// 共尝试 `max_attempts` 次
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// 不重试，只尝试一次
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// 第 `attempt` 次尝试失败后的等待时间（attempt 从 1 开始）
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = secs.min(self.max_backoff.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }
}

/// 调度器配置
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// 最大并发请求数，0 表示使用可用 CPU 数
    pub max_concurrent: usize,
    pub retry: RetryPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 0,
            retry: RetryPolicy::default(),
        }
    }
}

impl DispatcherConfig {
    /// 实际的并发上限
    pub fn effective_concurrency(&self) -> usize {
        if self.max_concurrent > 0 {
            self.max_concurrent
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}

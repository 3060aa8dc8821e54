//! Application Layer - 应用层
//!
//! - Ports: 端口定义（TtsEngine, AudioOutput）
//! - ChunkFetcher: 单片段合成与重试
//! - SpeechDispatcher: 并发分发、有序重组、原子提交

/// 进度日志：verbose 时为 info，否则为 debug
macro_rules! progress {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            tracing::info!($($arg)+)
        } else {
            tracing::debug!($($arg)+)
        }
    };
}

pub mod dispatcher;
pub mod error;
pub mod fetcher;
pub mod options;
pub mod ports;

pub use dispatcher::SpeechDispatcher;
pub use error::SpeakError;
pub use fetcher::ChunkFetcher;
pub use options::{DispatcherConfig, RetryPolicy, SpeakOptions, DEFAULT_OUTPUT_FILE};

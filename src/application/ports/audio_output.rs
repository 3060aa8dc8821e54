//! Audio Output Port - 音频输出抽象
//!
//! 最终音频的提交：要么完整写入，要么目标文件保持不变

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 输出错误
#[derive(Debug, Error)]
pub enum AudioOutputError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),
}

/// Audio Output Port
#[async_trait]
pub trait AudioOutputPort: Send + Sync {
    /// 原子地写入完整音频，返回最终路径
    async fn commit(&self, path: &Path, audio: &[u8]) -> Result<PathBuf, AudioOutputError>;
}

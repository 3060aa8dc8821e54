//! 应用层错误定义
//!
//! 对外暴露的封闭错误集合

use std::path::PathBuf;
use thiserror::Error;

use super::ports::TtsError;

/// 合成失败
#[derive(Debug, Error)]
pub enum SpeakError {
    /// 不可重试的请求失败
    ///
    /// `failed_chunks` 为本次合成中所有失败片段的序号（升序）
    #[error("Failed to generate audio for chunk {chunk_index}: {cause}")]
    RequestFailed {
        chunk_index: usize,
        failed_chunks: Vec<usize>,
        cause: TtsError,
    },

    /// 重试次数耗尽
    #[error("Chunk {chunk_index} failed after {attempts} attempts: {cause}")]
    AllRetriesExhausted {
        chunk_index: usize,
        failed_chunks: Vec<usize>,
        attempts: u32,
        cause: TtsError,
    },

    /// 输出文件写入失败（目标文件未被修改）
    #[error("Failed to write {}: {cause}", path.display())]
    WriteFailed { path: PathBuf, cause: String },

    /// 调用方取消
    #[error("Operation cancelled")]
    Cancelled,
}

impl SpeakError {
    /// 失败片段的序号
    pub fn chunk_index(&self) -> Option<usize> {
        match self {
            Self::RequestFailed { chunk_index, .. }
            | Self::AllRetriesExhausted { chunk_index, .. } => Some(*chunk_index),
            Self::WriteFailed { .. } | Self::Cancelled => None,
        }
    }

    /// 所有失败片段的序号，首个即 [`chunk_index`](Self::chunk_index)
    pub fn failed_chunks(&self) -> &[usize] {
        match self {
            Self::RequestFailed { failed_chunks, .. }
            | Self::AllRetriesExhausted { failed_chunks, .. } => failed_chunks,
            Self::WriteFailed { .. } | Self::Cancelled => &[],
        }
    }

    pub(crate) fn request_failed(chunk_index: usize, cause: TtsError) -> Self {
        Self::RequestFailed {
            chunk_index,
            failed_chunks: vec![chunk_index],
            cause,
        }
    }

    pub(crate) fn retries_exhausted(chunk_index: usize, attempts: u32, cause: TtsError) -> Self {
        Self::AllRetriesExhausted {
            chunk_index,
            failed_chunks: vec![chunk_index],
            attempts,
            cause,
        }
    }

    /// 用本次合成的全部失败序号替换
    pub(crate) fn with_failed_chunks(mut self, indices: Vec<usize>) -> Self {
        if let Self::RequestFailed { failed_chunks, .. }
        | Self::AllRetriesExhausted { failed_chunks, .. } = &mut self
        {
            *failed_chunks = indices;
        }
        self
    }

    pub fn write_failed(path: impl Into<PathBuf>, cause: impl ToString) -> Self {
        Self::WriteFailed {
            path: path.into(),
            cause: cause.to_string(),
        }
    }
}

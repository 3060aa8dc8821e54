//! TTS Engine Port - TTS 合成引擎抽象
//!
//! 定义单句合成的抽象接口，具体实现在 infrastructure/adapters 层

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::domain::Voice;

/// TTS 错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TtsError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout")]
    Timeout,

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Empty audio response")]
    EmptyAudio,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Client error: {0}")]
    Client(String),
}

impl TtsError {
    /// 是否为可重试的临时错误
    ///
    /// 网络错误、超时、空响应、5xx、408 和 429 可重试；其余 4xx 和客户端错误直接失败
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout | Self::EmptyAudio => true,
            Self::Status { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            Self::InvalidResponse(_) | Self::Client(_) => false,
        }
    }
}

/// 单句合成请求
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    /// 片段序号（用于日志和追踪）
    pub chunk_index: usize,
    /// 要合成的句子
    pub text: String,
    pub voice: Voice,
    /// 单次请求超时
    pub timeout: Duration,
}

/// TTS Engine Port
///
/// 外部 TTS 服务的抽象接口。实现不做重试，重试由调用方负责
#[async_trait]
pub trait TtsEnginePort: Send + Sync {
    /// 合成一个句子，返回原始音频字节
    async fn synthesize(&self, request: SynthesisRequest) -> Result<Vec<u8>, TtsError>;
}

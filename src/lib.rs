//! speakfm - openai.fm 文本转语音客户端
//!
//! 架构设计: Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Voice: 音色
//! - Sentence Segmenter: 句子分割
//! - Utterance / ChunkCollection: 片段编号与有序收集
//!
//! 应用层 (application/):
//! - Ports: TtsEngine, AudioOutput
//! - ChunkFetcher: 单片段合成，有限次指数退避重试
//! - SpeechDispatcher: 有界并发分发、取消、有序重组、原子提交
//!
//! 基础设施层 (infrastructure/):
//! - Adapters: HttpTtsClient, FakeTtsClient, FileAudioOutput

use std::sync::Arc;

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use application::{SpeakError, SpeakOptions, SpeechDispatcher};
pub use config::{load_config, AppConfig};
pub use domain::Voice;

use application::ports::TtsError;
use infrastructure::adapters::{FileAudioOutput, HttpTtsClient};

/// 使用 HTTP 接口和文件输出创建调度器
pub fn http_dispatcher(config: &AppConfig) -> Result<SpeechDispatcher, TtsError> {
    let engine = Arc::new(HttpTtsClient::new(config.http_client_config())?);
    Ok(SpeechDispatcher::new(
        engine,
        Arc::new(FileAudioOutput::new()),
        config.dispatcher_config(),
    ))
}

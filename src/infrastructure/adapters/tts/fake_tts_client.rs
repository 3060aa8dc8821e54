//! Fake TTS Client - 用于测试的 TTS 客户端
//!
//! 不调用远端服务，默认把句子文本原样作为音频字节返回。
//! 可按句子配置延迟、响应内容和失败次数

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use crate::application::ports::{SynthesisRequest, TtsEnginePort, TtsError};

/// Fake TTS Client 配置
#[derive(Debug, Clone, Default)]
pub struct FakeTtsClientConfig {
    /// 每次请求的固定延迟
    pub latency: Duration,
}

/// 预设的失败
#[derive(Debug, Clone)]
struct ScriptedFailure {
    /// 剩余失败次数，`u32::MAX` 表示始终失败
    remaining: u32,
    error: TtsError,
}

/// Fake TTS Client
///
/// 确定性的假接口：相同输入总是得到相同输出
#[derive(Debug, Default)]
pub struct FakeTtsClient {
    config: FakeTtsClientConfig,
    delays: DashMap<String, Duration>,
    responses: DashMap<String, Vec<u8>>,
    failures: DashMap<String, ScriptedFailure>,
    calls: DashMap<String, u32>,
    total_calls: AtomicU32,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl FakeTtsClient {
    pub fn new(config: FakeTtsClientConfig) -> Self {
        tracing::debug!(latency_ms = config.latency.as_millis() as u64, "FakeTtsClient initialized");
        Self {
            config,
            ..Default::default()
        }
    }

    /// 回显客户端：音频字节等于句子文本
    pub fn echo() -> Self {
        Self::new(FakeTtsClientConfig::default())
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.config.latency = latency;
        self
    }

    /// 指定句子的额外延迟
    pub fn with_delay(self, text: &str, delay: Duration) -> Self {
        self.delays.insert(text.to_string(), delay);
        self
    }

    /// 指定句子的响应内容（可为空）
    pub fn with_response(self, text: &str, audio: Vec<u8>) -> Self {
        self.responses.insert(text.to_string(), audio);
        self
    }

    /// 指定句子的前 `times` 次请求失败
    pub fn with_failures(self, text: &str, times: u32, error: TtsError) -> Self {
        self.failures.insert(
            text.to_string(),
            ScriptedFailure {
                remaining: times,
                error,
            },
        );
        self
    }

    /// 某个句子被请求的次数
    pub fn calls_for(&self, text: &str) -> u32 {
        self.calls.get(text).map(|c| *c).unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.total_calls.load(Ordering::SeqCst)
    }

    /// 同时进行中的请求数峰值
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn take_failure(&self, text: &str) -> Option<TtsError> {
        let mut failure = self.failures.get_mut(text)?;
        if failure.remaining == 0 {
            return None;
        }
        if failure.remaining != u32::MAX {
            failure.remaining -= 1;
        }
        Some(failure.error.clone())
    }
}

/// 请求结束（含被取消）时减少进行中计数
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TtsEnginePort for FakeTtsClient {
    async fn synthesize(&self, request: SynthesisRequest) -> Result<Vec<u8>, TtsError> {
        *self.calls.entry(request.text.clone()).or_insert(0) += 1;
        self.total_calls.fetch_add(1, Ordering::SeqCst);

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        tracing::debug!(
            chunk_index = request.chunk_index,
            text_len = request.text.len(),
            voice = %request.voice,
            "FakeTtsClient: synthesizing"
        );

        let delay = self.config.latency
            + self
                .delays
                .get(&request.text)
                .map(|d| *d)
                .unwrap_or_default();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.take_failure(&request.text) {
            return Err(error);
        }

        Ok(self
            .responses
            .get(&request.text)
            .map(|r| r.value().clone())
            .unwrap_or_else(|| request.text.clone().into_bytes()))
    }
}

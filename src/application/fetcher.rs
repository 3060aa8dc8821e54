//! Chunk Fetcher - 单片段合成
//!
//! 调用 TTS 引擎合成一个片段，临时错误按指数退避有限次重试

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::error::SpeakError;
use super::options::{RetryPolicy, SpeakOptions};
use super::ports::{SynthesisRequest, TtsEnginePort, TtsError};
use crate::domain::{Chunk, ChunkResult};

/// 片段获取器
///
/// 只持有不可变的引擎句柄和重试策略，可在多个任务间共享
pub struct ChunkFetcher {
    engine: Arc<dyn TtsEnginePort>,
    retry: RetryPolicy,
}

impl ChunkFetcher {
    pub fn new(engine: Arc<dyn TtsEnginePort>, retry: RetryPolicy) -> Self {
        Self { engine, retry }
    }

    /// 获取一个片段的音频
    ///
    /// - 非空响应：返回 `(index, bytes)`
    /// - 空响应或临时错误：退避后重试，次数耗尽返回 `AllRetriesExhausted`
    /// - 其他错误：立即返回 `RequestFailed`
    /// - `cancel` 被触发：放弃进行中的请求或等待，返回 `Cancelled`
    pub async fn fetch(
        &self,
        chunk: &Chunk,
        options: &SpeakOptions,
        cancel: &CancellationToken,
    ) -> Result<ChunkResult, SpeakError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let request = SynthesisRequest {
                chunk_index: chunk.index,
                text: chunk.text.clone(),
                voice: options.voice,
                timeout: options.timeout,
            };

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SpeakError::Cancelled),
                result = self.engine.synthesize(request) => result,
            };

            let cause = match outcome {
                Ok(audio) if !audio.is_empty() => {
                    progress!(
                        options.verbose,
                        chunk_index = chunk.index,
                        attempt,
                        bytes = audio.len(),
                        "Chunk processed successfully"
                    );
                    return Ok(ChunkResult::new(chunk.index, audio));
                }
                Ok(_) => TtsError::EmptyAudio,
                Err(e) => e,
            };

            if !cause.is_transient() {
                tracing::warn!(
                    chunk_index = chunk.index,
                    attempt,
                    error = %cause,
                    "Chunk request failed"
                );
                return Err(SpeakError::request_failed(chunk.index, cause));
            }

            if attempt >= max_attempts {
                tracing::warn!(
                    chunk_index = chunk.index,
                    attempts = attempt,
                    error = %cause,
                    "Chunk retries exhausted"
                );
                return Err(SpeakError::retries_exhausted(chunk.index, attempt, cause));
            }

            let delay = self.retry.backoff_after(attempt);
            progress!(
                options.verbose,
                chunk_index = chunk.index,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %cause,
                "Chunk attempt failed, retrying"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SpeakError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::FakeTtsClient;
    use std::time::Duration;

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            multiplier: 2.0,
        }
    }

    fn chunk(index: usize, text: &str) -> Chunk {
        Chunk {
            index,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let engine = Arc::new(FakeTtsClient::echo());
        let fetcher = ChunkFetcher::new(engine.clone(), fast_retry(3));

        let result = fetcher
            .fetch(&chunk(2, "Hello."), &SpeakOptions::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result, ChunkResult::new(2, b"Hello.".to_vec()));
        assert_eq!(engine.calls_for("Hello."), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let engine = Arc::new(FakeTtsClient::echo().with_failures("Hi.", 2, TtsError::Timeout));
        let fetcher = ChunkFetcher::new(engine.clone(), fast_retry(3));

        let result = fetcher
            .fetch(&chunk(1, "Hi."), &SpeakOptions::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.audio, b"Hi.");
        assert_eq!(engine.calls_for("Hi."), 3);
    }

    #[tokio::test]
    async fn test_empty_body_exhausts_retries() {
        let engine = Arc::new(FakeTtsClient::echo().with_response("Silent.", Vec::new()));
        let fetcher = ChunkFetcher::new(engine.clone(), fast_retry(3));

        let err = fetcher
            .fetch(&chunk(4, "Silent."), &SpeakOptions::default(), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            SpeakError::AllRetriesExhausted {
                chunk_index,
                attempts,
                cause,
                ..
            } => {
                assert_eq!(chunk_index, 4);
                assert_eq!(attempts, 3);
                assert_eq!(cause, TtsError::EmptyAudio);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(engine.calls_for("Silent."), 3);
    }

    #[tokio::test]
    async fn test_non_transient_fails_immediately() {
        let rejected = TtsError::Status {
            status: 400,
            body: "bad voice".to_string(),
        };
        let engine = Arc::new(FakeTtsClient::echo().with_failures("Nope.", u32::MAX, rejected.clone()));
        let fetcher = ChunkFetcher::new(engine.clone(), fast_retry(5));

        let err = fetcher
            .fetch(&chunk(1, "Nope."), &SpeakOptions::default(), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            SpeakError::RequestFailed { chunk_index, cause, .. } => {
                assert_eq!(chunk_index, 1);
                assert_eq!(cause, rejected);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(engine.calls_for("Nope."), 1);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_backoff() {
        let engine = Arc::new(FakeTtsClient::echo().with_failures("Slow.", u32::MAX, TtsError::Timeout));
        let retry = RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_secs(60),
            max_backoff: Duration::from_secs(60),
            multiplier: 1.0,
        };
        let fetcher = ChunkFetcher::new(engine.clone(), retry);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            fetcher.fetch(&chunk(1, "Slow."), &SpeakOptions::default(), &cancel),
        )
        .await
        .expect("fetch should stop once cancelled")
        .unwrap_err();

        assert!(matches!(err, SpeakError::Cancelled));
        assert_eq!(engine.calls_for("Slow."), 1);
    }
}

//! Speech Dispatcher - 并发分发与有序重组
//!
//! 每个片段一个任务，由调度器持有的信号量限制并发；结果按到达顺序收集、
//! 按序号拼接。任一片段失败即取消其余片段，且不写入任何输出

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::error::SpeakError;
use super::fetcher::ChunkFetcher;
use super::options::{DispatcherConfig, SpeakOptions};
use super::ports::{AudioOutputPort, TtsEnginePort, TtsError};
use crate::domain::{ChunkCollection, CollectionError, Utterance};

/// 语音合成调度器
///
/// 信号量在多次调用间复用，同一调度器上的所有调用共享并发上限
pub struct SpeechDispatcher {
    fetcher: Arc<ChunkFetcher>,
    output: Arc<dyn AudioOutputPort>,
    permits: Arc<Semaphore>,
    concurrency: usize,
}

impl SpeechDispatcher {
    pub fn new(
        engine: Arc<dyn TtsEnginePort>,
        output: Arc<dyn AudioOutputPort>,
        config: DispatcherConfig,
    ) -> Self {
        let concurrency = config.effective_concurrency().min(Semaphore::MAX_PERMITS);
        tracing::debug!(concurrency, max_attempts = config.retry.max_attempts, "SpeechDispatcher created");

        Self {
            fetcher: Arc::new(ChunkFetcher::new(engine, config.retry)),
            output,
            permits: Arc::new(Semaphore::new(concurrency)),
            concurrency,
        }
    }

    /// 并发上限
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// 文本转语音并写入 `options.output_path`，返回写入的路径
    pub async fn speak(&self, text: &str, options: &SpeakOptions) -> Result<PathBuf, SpeakError> {
        self.speak_with_cancel(text, options, &CancellationToken::new())
            .await
    }

    /// 同 [`speak`](Self::speak)，`cancel` 被触发时中止所有进行中的请求
    pub async fn speak_with_cancel(
        &self,
        text: &str,
        options: &SpeakOptions,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, SpeakError> {
        let utterance = Utterance::from_text(text);
        progress!(
            options.verbose,
            chunks = utterance.len(),
            voice = %options.voice,
            "Text segmented"
        );

        let audio = self.synthesize(&utterance, options, cancel).await?;

        let path = self
            .output
            .commit(&options.output_path, &audio)
            .await
            .map_err(|e| SpeakError::write_failed(&options.output_path, e))?;

        progress!(
            options.verbose,
            path = %path.display(),
            bytes = audio.len(),
            "Audio saved"
        );
        Ok(path)
    }

    /// 合成全部片段并按序号拼接
    ///
    /// 失败时返回序号最小的失败片段对应的错误；被取消的兄弟片段不计为失败
    pub async fn synthesize(
        &self,
        utterance: &Utterance,
        options: &SpeakOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, SpeakError> {
        let siblings = cancel.child_token();
        let mut tasks = JoinSet::new();

        for chunk in utterance.chunks().iter().cloned() {
            let fetcher = self.fetcher.clone();
            let permits = self.permits.clone();
            let options = options.clone();
            let token = siblings.clone();

            tasks.spawn(async move {
                let index = chunk.index;

                // 持有 permit 直到任务完成
                let _permit = tokio::select! {
                    biased;
                    _ = token.cancelled() => return (index, Err(SpeakError::Cancelled)),
                    permit = permits.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return (index, Err(SpeakError::Cancelled)),
                    },
                };

                (index, fetcher.fetch(&chunk, &options, &token).await)
            });
        }

        let mut collection = ChunkCollection::new(utterance.len());
        let mut failures: Vec<SpeakError> = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            let (index, outcome) = match joined {
                Ok(done) => done,
                Err(e) if e.is_panic() => {
                    siblings.cancel();
                    std::panic::resume_unwind(e.into_panic());
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Chunk task aborted");
                    continue;
                }
            };

            match outcome {
                Ok(result) => {
                    if let Err(e) = collection.insert(result) {
                        tracing::error!(chunk_index = index, error = %e, "Discarding chunk result");
                    }
                }
                Err(SpeakError::Cancelled) => {}
                Err(err) => {
                    if !siblings.is_cancelled() {
                        tracing::warn!(
                            chunk_index = index,
                            error = %err,
                            "Chunk failed, cancelling remaining chunks"
                        );
                        siblings.cancel();
                    }
                    failures.push(err);
                }
            }
        }

        if !failures.is_empty() {
            failures.sort_by_key(|e| e.chunk_index());
            let failed: Vec<usize> = failures.iter().filter_map(SpeakError::chunk_index).collect();
            tracing::error!(failed_chunks = ?failed, "Synthesis aborted, no output written");
            return Err(failures.remove(0).with_failed_chunks(failed));
        }

        if cancel.is_cancelled() && !collection.is_complete() {
            tracing::info!(
                completed = collection.len(),
                total = utterance.len(),
                "Synthesis cancelled"
            );
            return Err(SpeakError::Cancelled);
        }

        collection.into_audio().map_err(|e| match e {
            CollectionError::Incomplete { missing } => SpeakError::request_failed(
                missing.first().copied().unwrap_or_default(),
                TtsError::InvalidResponse("no audio collected for chunk".to_string()),
            )
            .with_failed_chunks(missing),
            other => SpeakError::request_failed(0, TtsError::InvalidResponse(other.to_string())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::options::RetryPolicy;
    use crate::infrastructure::adapters::{FakeTtsClient, FileAudioOutput};
    use std::time::Duration;
    use tempfile::tempdir;

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            multiplier: 2.0,
        }
    }

    fn dispatcher(engine: Arc<FakeTtsClient>, max_concurrent: usize, retry: RetryPolicy) -> SpeechDispatcher {
        SpeechDispatcher::new(
            engine,
            Arc::new(FileAudioOutput::new()),
            DispatcherConfig {
                max_concurrent,
                retry,
            },
        )
    }

    #[tokio::test]
    async fn test_output_is_ordered_despite_slow_middle_chunk() {
        let engine = Arc::new(
            FakeTtsClient::echo().with_delay("B.", Duration::from_millis(80)),
        );
        let dispatcher = dispatcher(engine.clone(), 3, fast_retry(3));
        let dir = tempdir().unwrap();
        let options = SpeakOptions::default().with_output_path(dir.path().join("out.mp3"));

        let path = dispatcher.speak("A. B. C.", &options).await.unwrap();

        assert_eq!(path, dir.path().join("out.mp3"));
        assert_eq!(std::fs::read(&path).unwrap(), b"A.B.C.");
    }

    #[tokio::test]
    async fn test_chunk_three_completes_before_chunk_one() {
        let engine = Arc::new(
            FakeTtsClient::echo()
                .with_delay("One.", Duration::from_millis(100))
                .with_delay("Two.", Duration::from_millis(50)),
        );
        let dispatcher = dispatcher(engine.clone(), 4, fast_retry(3));
        let utterance = Utterance::from_text("One. Two. Three.");

        let audio = dispatcher
            .synthesize(&utterance, &SpeakOptions::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(audio.starts_with(b"One."));
        assert_eq!(audio, b"One.Two.Three.");
    }

    #[tokio::test]
    async fn test_each_chunk_fetched_exactly_once() {
        let engine = Arc::new(FakeTtsClient::echo());
        let dispatcher = dispatcher(engine.clone(), 2, fast_retry(3));
        let text = "First. Second! Third? Fourth. Fifth.";
        let utterance = Utterance::from_text(text);

        dispatcher
            .synthesize(&utterance, &SpeakOptions::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(engine.total_calls(), utterance.len() as u32);
        for chunk in utterance.chunks() {
            assert_eq!(engine.calls_for(&chunk.text), 1);
        }
    }

    #[tokio::test]
    async fn test_exhausted_chunk_writes_no_file() {
        let engine = Arc::new(
            FakeTtsClient::echo().with_failures("B.", u32::MAX, TtsError::Network("reset".into())),
        );
        let dispatcher = dispatcher(engine.clone(), 3, fast_retry(3));
        let dir = tempdir().unwrap();
        let output = dir.path().join("out.mp3");
        let options = SpeakOptions::default().with_output_path(&output);

        let err = dispatcher.speak("A. B. C.", &options).await.unwrap_err();

        match err {
            SpeakError::AllRetriesExhausted {
                chunk_index,
                attempts,
                ..
            } => {
                assert_eq!(chunk_index, 2);
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!output.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_failure_keeps_existing_file_untouched() {
        let engine = Arc::new(
            FakeTtsClient::echo().with_failures(
                "C.",
                u32::MAX,
                TtsError::Status {
                    status: 403,
                    body: "forbidden".into(),
                },
            ),
        );
        let dispatcher = dispatcher(engine, 3, fast_retry(3));
        let dir = tempdir().unwrap();
        let output = dir.path().join("out.mp3");
        std::fs::write(&output, b"previous").unwrap();

        let err = dispatcher
            .speak("A. B. C.", &SpeakOptions::default().with_output_path(&output))
            .await
            .unwrap_err();

        assert!(matches!(err, SpeakError::RequestFailed { chunk_index: 3, .. }));
        assert_eq!(std::fs::read(&output).unwrap(), b"previous");
    }

    #[tokio::test]
    async fn test_failure_cancels_slow_siblings() {
        let engine = Arc::new(
            FakeTtsClient::echo()
                .with_delay("Slow.", Duration::from_secs(30))
                .with_failures(
                    "Bad.",
                    u32::MAX,
                    TtsError::Status {
                        status: 400,
                        body: String::new(),
                    },
                ),
        );
        let dispatcher = dispatcher(engine, 2, fast_retry(3));
        let utterance = Utterance::from_text("Slow. Bad.");

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            dispatcher.synthesize(&utterance, &SpeakOptions::default(), &CancellationToken::new()),
        )
        .await
        .expect("siblings should be cancelled")
        .unwrap_err();

        assert_eq!(err.chunk_index(), Some(2));
    }

    #[tokio::test]
    async fn test_cancelled_siblings_are_not_reported() {
        let engine = Arc::new(
            FakeTtsClient::echo()
                .with_delay("X.", Duration::from_millis(300))
                .with_failures("X.", u32::MAX, TtsError::Client("x".into()))
                .with_failures("Y.", u32::MAX, TtsError::Client("y".into())),
        );
        let dispatcher = dispatcher(engine, 4, RetryPolicy::no_retry());
        let utterance = Utterance::from_text("Ok. X. Y.");

        let err = dispatcher
            .synthesize(&utterance, &SpeakOptions::default(), &CancellationToken::new())
            .await
            .unwrap_err();

        // X 在失败前已被取消，只报告 Y
        assert!(matches!(err, SpeakError::RequestFailed { chunk_index: 3, .. }));
        assert_eq!(err.failed_chunks(), &[3]);
    }

    #[tokio::test]
    async fn test_every_failed_chunk_is_reported() {
        let rejected = TtsError::Status {
            status: 400,
            body: "unsupported voice".into(),
        };
        let engine = Arc::new(
            FakeTtsClient::echo()
                .with_failures("A.", u32::MAX, rejected.clone())
                .with_failures("B.", u32::MAX, rejected.clone())
                .with_failures("C.", u32::MAX, rejected.clone()),
        );
        let dispatcher = dispatcher(engine.clone(), 4, RetryPolicy::no_retry());
        let dir = tempdir().unwrap();
        let output = dir.path().join("out.mp3");

        let err = dispatcher
            .speak("A. B. C.", &SpeakOptions::default().with_output_path(&output))
            .await
            .unwrap_err();

        assert_eq!(engine.total_calls(), 3);
        assert_eq!(err.chunk_index(), Some(1));
        assert_eq!(err.failed_chunks(), &[1, 2, 3]);
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_unwritable_output_maps_to_write_failed() {
        let engine = Arc::new(FakeTtsClient::echo());
        let dispatcher = dispatcher(engine, 2, fast_retry(3));
        let dir = tempdir().unwrap();
        let taken = dir.path().join("taken");
        std::fs::create_dir(&taken).unwrap();
        std::fs::write(taken.join("keep.txt"), b"x").unwrap();

        let err = dispatcher
            .speak("A. B.", &SpeakOptions::default().with_output_path(&taken))
            .await
            .unwrap_err();

        match err {
            SpeakError::WriteFailed { path, cause } => {
                assert_eq!(path, taken);
                assert!(!cause.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(std::fs::read(taken.join("keep.txt")).unwrap(), b"x");
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".part"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_caller_cancellation() {
        let engine = Arc::new(FakeTtsClient::echo().with_delay("Wait.", Duration::from_secs(30)));
        let dispatcher = dispatcher(engine, 2, fast_retry(3));
        let dir = tempdir().unwrap();
        let output = dir.path().join("out.mp3");
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = dispatcher
            .speak_with_cancel(
                "Fast. Wait.",
                &SpeakOptions::default().with_output_path(&output),
                &cancel,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, SpeakError::Cancelled));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_repeated_runs_are_byte_identical() {
        let engine = Arc::new(
            FakeTtsClient::echo()
                .with_delay("Beta!", Duration::from_millis(30))
                .with_response("Gamma?", vec![0xFF, 0xFB, 0x90, 0x00]),
        );
        let dispatcher = dispatcher(engine, 2, fast_retry(3));
        let dir = tempdir().unwrap();
        let text = "Alpha 😊. Beta! Gamma? Delta";

        let first = dispatcher
            .speak(text, &SpeakOptions::default().with_output_path(dir.path().join("1.mp3")))
            .await
            .unwrap();
        let second = dispatcher
            .speak(text, &SpeakOptions::default().with_output_path(dir.path().join("2.mp3")))
            .await
            .unwrap();

        assert_eq!(std::fs::read(first).unwrap(), std::fs::read(second).unwrap());
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let engine = Arc::new(FakeTtsClient::echo().with_latency(Duration::from_millis(20)));
        let dispatcher = dispatcher(engine.clone(), 2, fast_retry(3));
        let utterance = Utterance::from_text("a. b. c. d. e. f.");

        dispatcher
            .synthesize(&utterance, &SpeakOptions::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(dispatcher.concurrency(), 2);
        assert!(engine.peak_in_flight() <= 2);
        assert_eq!(engine.total_calls(), 6);
    }

    #[tokio::test]
    async fn test_empty_text_writes_empty_file() {
        let engine = Arc::new(FakeTtsClient::echo());
        let dispatcher = dispatcher(engine.clone(), 2, fast_retry(3));
        let dir = tempdir().unwrap();
        let output = dir.path().join("empty.mp3");

        let path = dispatcher
            .speak("   \n  ", &SpeakOptions::default().with_output_path(&output))
            .await
            .unwrap();

        assert!(std::fs::read(path).unwrap().is_empty());
        assert_eq!(engine.total_calls(), 0);
    }
}

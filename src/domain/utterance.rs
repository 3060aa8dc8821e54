//! Utterance / Chunk - 分段与结果收集
//!
//! 不变量:
//! - 每个 chunk 的序号从 1 开始连续递增
//! - 每个序号至多有一个结果
//! - 最终音频严格按序号升序拼接，不跳过任何序号

use std::collections::BTreeMap;
use thiserror::Error;

use super::sentence_segmenter::segment_sentences;

/// 单个句子片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 序号（从 1 开始）
    pub index: usize,
    pub text: String,
}

/// 一次输入文本对应的全部片段，创建后不可变
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Utterance {
    chunks: Vec<Chunk>,
}

impl Utterance {
    /// 分割文本并编号
    pub fn from_text(text: &str) -> Self {
        Self::from_sentences(segment_sentences(text))
    }

    pub fn from_sentences<I, S>(sentences: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let chunks = sentences
            .into_iter()
            .enumerate()
            .map(|(i, text)| Chunk {
                index: i + 1,
                text: text.into(),
            })
            .collect();
        Self { chunks }
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// 单个片段的合成结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkResult {
    pub index: usize,
    pub audio: Vec<u8>,
}

impl ChunkResult {
    pub fn new(index: usize, audio: Vec<u8>) -> Self {
        Self { index, audio }
    }
}

/// 结果收集错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectionError {
    #[error("Chunk {0} already has a result")]
    Duplicate(usize),

    #[error("Chunk {index} is outside 1..={expected}")]
    OutOfRange { index: usize, expected: usize },

    #[error("Missing chunks: {missing:?}")]
    Incomplete { missing: Vec<usize> },
}

/// 按序号缓存乱序到达的结果
#[derive(Debug)]
pub struct ChunkCollection {
    expected: usize,
    results: BTreeMap<usize, Vec<u8>>,
}

impl ChunkCollection {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            results: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, result: ChunkResult) -> Result<(), CollectionError> {
        if result.index == 0 || result.index > self.expected {
            return Err(CollectionError::OutOfRange {
                index: result.index,
                expected: self.expected,
            });
        }
        if self.results.contains_key(&result.index) {
            return Err(CollectionError::Duplicate(result.index));
        }
        self.results.insert(result.index, result.audio);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.results.len() == self.expected
    }

    pub fn missing(&self) -> Vec<usize> {
        (1..=self.expected)
            .filter(|i| !self.results.contains_key(i))
            .collect()
    }

    /// 按序号升序拼接全部音频
    pub fn into_audio(self) -> Result<Vec<u8>, CollectionError> {
        if !self.is_complete() {
            return Err(CollectionError::Incomplete {
                missing: self.missing(),
            });
        }

        let total = self.results.values().map(Vec::len).sum();
        let mut audio = Vec::with_capacity(total);
        for bytes in self.results.into_values() {
            audio.extend_from_slice(&bytes);
        }
        Ok(audio)
    }
}

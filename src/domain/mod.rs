//! Domain Layer - 领域层
//!
//! - Voice: 音色值对象
//! - Sentence Segmenter: 句子分割
//! - Utterance: 片段编号与结果收集

mod sentence_segmenter;
mod utterance;
mod voice;

pub use sentence_segmenter::segment_sentences;
pub use utterance::{Chunk, ChunkCollection, ChunkResult, CollectionError, Utterance};
pub use voice::{UnknownVoice, Voice};

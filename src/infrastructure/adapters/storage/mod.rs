//! Storage Adapter - 音频输出实现

mod file_output;

pub use file_output::FileAudioOutput;

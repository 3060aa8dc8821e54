//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod audio_output;
mod tts_engine;

pub use audio_output::{AudioOutputError, AudioOutputPort};
pub use tts_engine::{SynthesisRequest, TtsEnginePort, TtsError};

//! Voice - 音色值对象
//!
//! 远端接口支持的固定音色集合，原样透传给 TTS 服务

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 无法识别的音色名称
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown voice '{name}', expected one of: {}", Voice::names().join(", "))]
pub struct UnknownVoice {
    pub name: String,
}

/// 音色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    Alloy,
    Ash,
    Ballad,
    Coral,
    Echo,
    Fable,
    Onyx,
    Nova,
    Sage,
    #[default]
    Shimmer,
    Verse,
}

const ALL_VOICES: [Voice; 11] = [
    Voice::Alloy,
    Voice::Ash,
    Voice::Ballad,
    Voice::Coral,
    Voice::Echo,
    Voice::Fable,
    Voice::Onyx,
    Voice::Nova,
    Voice::Sage,
    Voice::Shimmer,
    Voice::Verse,
];

impl Voice {
    /// 所有可用音色
    pub fn all() -> &'static [Voice] {
        &ALL_VOICES
    }

    /// 所有音色的名称
    pub fn names() -> Vec<&'static str> {
        ALL_VOICES.iter().map(|v| v.as_str()).collect()
    }

    /// 发送给远端的标识
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alloy => "alloy",
            Self::Ash => "ash",
            Self::Ballad => "ballad",
            Self::Coral => "coral",
            Self::Echo => "echo",
            Self::Fable => "fable",
            Self::Onyx => "onyx",
            Self::Nova => "nova",
            Self::Sage => "sage",
            Self::Shimmer => "shimmer",
            Self::Verse => "verse",
        }
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Voice {
    type Err = UnknownVoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ALL_VOICES
            .iter()
            .copied()
            .find(|v| v.as_str() == wanted)
            .ok_or_else(|| UnknownVoice { name: s.to_string() })
    }
}

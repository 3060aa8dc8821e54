//! Configuration Types
//!
//! 定义所有配置结构体

use serde::{Deserialize, Deserializer};
use std::path::PathBuf;
use std::time::Duration;

use crate::application::{DispatcherConfig, RetryPolicy, SpeakOptions, DEFAULT_OUTPUT_FILE};
use crate::domain::Voice;
use crate::infrastructure::adapters::{HttpTtsClientConfig, RequestMethod, DEFAULT_PROMPT, DEFAULT_TTS_URL};

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// TTS 接口配置
    #[serde(default)]
    pub tts: TtsConfig,

    /// 重试配置
    #[serde(default)]
    pub retry: RetryConfig,

    /// 并发配置
    #[serde(default)]
    pub worker: WorkerConfig,

    /// 输出配置
    #[serde(default)]
    pub output: OutputConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

impl AppConfig {
    pub fn http_client_config(&self) -> HttpTtsClientConfig {
        HttpTtsClientConfig {
            url: self.tts.url.clone(),
            timeout_secs: self.tts.timeout_secs,
            method: self.tts.method,
            prompt: self.tts.prompt.clone(),
            vibe: self.tts.vibe.clone(),
        }
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            max_concurrent: self.worker.max_concurrent,
            retry: self.retry.policy(),
        }
    }

    /// 默认的单次调用参数
    pub fn speak_options(&self) -> SpeakOptions {
        SpeakOptions {
            voice: self.tts.voice,
            output_path: self.output.path.clone(),
            timeout: Duration::from_secs(self.tts.timeout_secs),
            verbose: self.output.verbose,
        }
    }
}

/// 大小写不敏感地解析音色
fn deserialize_voice<'de, D>(deserializer: D) -> Result<Voice, D::Error>
where
    D: Deserializer<'de>,
{
    let name = String::deserialize(deserializer)?;
    name.parse().map_err(serde::de::Error::custom)
}

/// TTS 接口配置
#[derive(Debug, Clone, Deserialize)]
pub struct TtsConfig {
    /// 接口地址
    #[serde(default = "default_tts_url")]
    pub url: String,

    /// 请求方式: post / get
    #[serde(default)]
    pub method: RequestMethod,

    /// 单个请求超时时间（秒）
    #[serde(default = "default_tts_timeout")]
    pub timeout_secs: u64,

    #[serde(default, deserialize_with = "deserialize_voice")]
    pub voice: Voice,

    /// 风格提示
    #[serde(default = "default_prompt")]
    pub prompt: String,

    #[serde(default = "default_vibe")]
    pub vibe: String,
}

fn default_tts_url() -> String {
    DEFAULT_TTS_URL.to_string()
}

fn default_tts_timeout() -> u64 {
    30
}

fn default_prompt() -> String {
    DEFAULT_PROMPT.to_string()
}

fn default_vibe() -> String {
    "null".to_string()
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            url: default_tts_url(),
            method: RequestMethod::default(),
            timeout_secs: default_tts_timeout(),
            voice: Voice::default(),
            prompt: default_prompt(),
            vibe: default_vibe(),
        }
    }
}

/// 重试配置
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// 每个片段的最大尝试次数（含首次）
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// 退避倍数
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_max_attempts() -> u32 {
    4
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8000
}

fn default_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            multiplier: self.multiplier,
        }
    }
}

/// 并发配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkerConfig {
    /// 最大并发请求数，0 表示使用可用 CPU 数
    #[serde(default)]
    pub max_concurrent: usize,
}

/// 输出配置
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// 输出文件路径（相对路径基于当前目录）
    #[serde(default = "default_output_path")]
    pub path: PathBuf,

    /// 是否输出逐片段进度
    #[serde(default = "default_verbose")]
    pub verbose: bool,
}

fn default_output_path() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_FILE)
}

fn default_verbose() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            verbose: default_verbose(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（speakfm.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["speakfm", "speakfm.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `SPEAKFM_`，层级分隔符 `__`）
/// 2. 配置文件（speakfm.toml 或 speakfm.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `SPEAKFM_TTS__VOICE=nova`
/// - `SPEAKFM_TTS__TIMEOUT_SECS=60`
/// - `SPEAKFM_WORKER__MAX_CONCURRENT=4`
/// - `SPEAKFM_OUTPUT__PATH=/tmp/speech.mp3`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    load_with_environment(config_path, environment())
}

/// 环境变量源，例如 `SPEAKFM_TTS__VOICE=nova` 对应 `tts.voice`
fn environment() -> Environment {
    Environment::with_prefix("SPEAKFM")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn load_with_environment(
    config_path: Option<&Path>,
    env: Environment,
) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 默认值（最低优先级）
    builder = builder
        .set_default("tts.url", crate::infrastructure::adapters::DEFAULT_TTS_URL)?
        .set_default("tts.method", "post")?
        .set_default("tts.timeout_secs", 30)?
        .set_default("tts.voice", "shimmer")?
        .set_default("tts.prompt", crate::infrastructure::adapters::DEFAULT_PROMPT)?
        .set_default("tts.vibe", "null")?
        .set_default("retry.max_attempts", 4)?
        .set_default("retry.initial_backoff_ms", 500)?
        .set_default("retry.max_backoff_ms", 8000)?
        .set_default("retry.multiplier", 2.0)?
        .set_default("worker.max_concurrent", 0)?
        .set_default("output.path", crate::application::DEFAULT_OUTPUT_FILE)?
        .set_default("output.verbose", true)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 配置文件
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量（最高优先级）
    builder = builder.add_source(env);

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.tts.url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "TTS URL cannot be empty".to_string(),
        ));
    }

    if config.tts.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "TTS timeout cannot be 0".to_string(),
        ));
    }

    if config.retry.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "retry.max_attempts must be at least 1".to_string(),
        ));
    }

    if !config.retry.multiplier.is_finite() || config.retry.multiplier < 1.0 {
        return Err(ConfigError::ValidationError(
            "retry.multiplier must be a finite number >= 1.0".to_string(),
        ));
    }

    if config.output.path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "Output path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::debug!("=== speakfm Configuration ===");
    tracing::debug!("TTS URL: {} ({:?})", config.tts.url, config.tts.method);
    tracing::debug!("TTS Timeout: {}s", config.tts.timeout_secs);
    tracing::debug!("Voice: {}", config.tts.voice);
    tracing::debug!(
        "Retry: {} attempts, backoff {}ms..{}ms x{}",
        config.retry.max_attempts,
        config.retry.initial_backoff_ms,
        config.retry.max_backoff_ms,
        config.retry.multiplier
    );
    tracing::debug!("Max Concurrent: {}", config.dispatcher_config().effective_concurrency());
    tracing::debug!("Output: {:?}", config.output.path);
    tracing::debug!("Log Level: {}", config.log.level);
    tracing::debug!("=============================");
}

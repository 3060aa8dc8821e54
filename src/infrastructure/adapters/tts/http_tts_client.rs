//! HTTP TTS Client - 调用 openai.fm TTS 接口
//!
//! 实现 TtsEnginePort trait
//!
//! 外部 TTS API:
//! POST https://www.openai.fm/api/generate
//! Request: input=...&prompt=...&voice=...&vibe=...  (form-urlencoded)
//! Response: audio/mpeg binary，失败时可能为空
//!
//! GET 方式使用相同字段作为 query 参数，并附带 `generation` 随机数

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, ORIGIN, REFERER, USER_AGENT};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::application::ports::{SynthesisRequest, TtsEnginePort, TtsError};

/// 默认 TTS 接口地址
pub const DEFAULT_TTS_URL: &str = "https://www.openai.fm/api/generate";

/// 默认风格提示
pub const DEFAULT_PROMPT: &str = "Standard clear voice.";

/// 错误响应体在错误信息中保留的最大字符数
const MAX_ERROR_BODY_CHARS: usize = 200;

/// 请求方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestMethod {
    /// form-urlencoded 请求体
    #[default]
    Post,
    /// query 参数 + generation 随机数
    Get,
}

impl std::str::FromStr for RequestMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "post" => Ok(Self::Post),
            "get" => Ok(Self::Get),
            other => Err(format!("Unknown request method: {}", other)),
        }
    }
}

/// 请求参数（POST 为表单，GET 为 query）
#[derive(Debug, Serialize)]
struct TtsFormPayload<'a> {
    input: &'a str,
    prompt: &'a str,
    voice: &'a str,
    vibe: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation: Option<String>,
}

/// HTTP TTS 客户端配置
#[derive(Debug, Clone)]
pub struct HttpTtsClientConfig {
    /// TTS 接口地址
    pub url: String,
    /// 默认请求超时时间（秒），单次请求可覆盖
    pub timeout_secs: u64,
    pub method: RequestMethod,
    /// 风格提示
    pub prompt: String,
    pub vibe: String,
}

impl Default for HttpTtsClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_TTS_URL.to_string(),
            timeout_secs: 30,
            method: RequestMethod::Post,
            prompt: DEFAULT_PROMPT.to_string(),
            vibe: "null".to_string(),
        }
    }
}

impl HttpTtsClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_method(mut self, method: RequestMethod) -> Self {
        self.method = method;
        self
    }
}

/// 固定的浏览器请求头
fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9,hi;q=0.8"));
    headers.insert("dnt", HeaderValue::from_static("1"));
    headers.insert(ORIGIN, HeaderValue::from_static("https://www.openai.fm"));
    headers.insert(REFERER, HeaderValue::from_static("https://www.openai.fm/"));
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        ),
    );
    headers
}

fn truncate_body(body: &str) -> String {
    let mut chars = body.chars();
    let head: String = chars.by_ref().take(MAX_ERROR_BODY_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

fn map_send_error(e: reqwest::Error) -> TtsError {
    if e.is_timeout() {
        TtsError::Timeout
    } else if e.is_connect() {
        TtsError::Network(format!("Cannot connect to TTS service: {}", e))
    } else if e.is_builder() {
        TtsError::Client(e.to_string())
    } else {
        TtsError::Network(e.to_string())
    }
}

/// HTTP TTS 客户端
///
/// 创建后不可变，通过 `Arc` 在所有片段任务间共享
pub struct HttpTtsClient {
    client: Client,
    config: HttpTtsClientConfig,
}

impl HttpTtsClient {
    /// 创建新的 HTTP TTS 客户端
    pub fn new(config: HttpTtsClientConfig) -> Result<Self, TtsError> {
        let client = Client::builder()
            .default_headers(default_headers())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TtsError::Client(e.to_string()))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl TtsEnginePort for HttpTtsClient {
    async fn synthesize(&self, request: SynthesisRequest) -> Result<Vec<u8>, TtsError> {
        let mut payload = TtsFormPayload {
            input: &request.text,
            prompt: &self.config.prompt,
            voice: request.voice.as_str(),
            vibe: &self.config.vibe,
            generation: None,
        };

        tracing::debug!(
            url = %self.config.url,
            method = ?self.config.method,
            chunk_index = request.chunk_index,
            text_len = request.text.len(),
            voice = %request.voice,
            "Sending TTS request"
        );

        let builder = match self.config.method {
            RequestMethod::Post => self.client.post(&self.config.url).form(&payload),
            RequestMethod::Get => {
                payload.generation = Some(uuid::Uuid::new_v4().to_string());
                self.client.get(&self.config.url).query(&payload)
            }
        };

        let response = builder
            .timeout(request.timeout)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TtsError::Status {
                status: status.as_u16(),
                body: truncate_body(&error_text),
            });
        }

        let audio_data = response
            .bytes()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TtsError::Timeout
                } else {
                    TtsError::Network(format!("Failed to read audio: {}", e))
                }
            })?
            .to_vec();

        if audio_data.is_empty() {
            return Err(TtsError::EmptyAudio);
        }

        tracing::debug!(
            chunk_index = request.chunk_index,
            audio_size = audio_data.len(),
            "TTS request completed"
        );

        Ok(audio_data)
    }
}

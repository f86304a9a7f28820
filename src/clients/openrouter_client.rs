/// OpenRouter API 客户端
///
/// 封装密钥校验、模型列表和 chat completion 三个远端调用。
/// 这一层只返回 `ApiError`，不关心题目格式。
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ApiError;

const AUTH_KEY_PATH: &str = "/auth/key";
const MODELS_PATH: &str = "/models";
const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";

/// chat completion 响应，只保留用到的字段
#[derive(Debug, Default, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub choices: Vec<ReplyChoice>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReplyChoice {
    #[serde(default)]
    pub message: Option<ReplyMessage>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReplyMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatReply {
    /// 第一个 choice 的消息内容
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.message.as_ref())
            .and_then(|message| message.content.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// OpenRouter 客户端
pub struct OpenRouterClient {
    http: reqwest::Client,
    base_url: String,
    app_url: String,
    app_title: String,
}

impl OpenRouterClient {
    /// 创建新的客户端
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ApiError::request_failed(config.api_base_url.clone(), e))?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            app_url: config.app_url.clone(),
            app_title: config.app_title.clone(),
        })
    }

    /// 校验 API Key
    ///
    /// 网络或解析失败都视为“无效”，不会向上抛错。
    pub async fn validate_api_key(&self, api_key: &str) -> bool {
        if api_key.trim().is_empty() {
            return false;
        }

        let url = self.url(AUTH_KEY_PATH);
        debug!("校验 API Key: GET {}", url);

        match self.http.get(&url).bearer_auth(api_key.trim()).send().await {
            Ok(response) => {
                let ok = response.status().is_success();
                debug!("API Key 校验返回 {}", response.status());
                ok
            }
            Err(e) => {
                warn!("API Key 校验请求失败: {}", e);
                false
            }
        }
    }

    /// 获取可选模型列表
    ///
    /// 任何失败都返回空列表，由调用方退回默认模型列表。
    pub async fn fetch_models(&self, api_key: &str) -> Vec<String> {
        match self.list_models(api_key).await {
            Ok(models) => {
                debug!("获取到 {} 个模型", models.len());
                models
            }
            Err(e) => {
                warn!("无法获取模型列表，使用默认列表: {}", e);
                Vec::new()
            }
        }
    }

    async fn list_models(&self, api_key: &str) -> Result<Vec<String>, ApiError> {
        let url = self.url(MODELS_PATH);
        let response = self
            .http
            .get(&url)
            .bearer_auth(api_key.trim())
            .send()
            .await
            .map_err(|e| ApiError::request_failed(MODELS_PATH, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::request_failed(MODELS_PATH, e))?;

        parse_models_body(status, &body)
    }

    /// 发送 chat completion 请求
    pub async fn chat_completion<T: Serialize + ?Sized>(
        &self,
        api_key: &str,
        request: &T,
    ) -> Result<ChatReply, ApiError> {
        let url = self.url(CHAT_COMPLETIONS_PATH);
        debug!("调用 chat completion: POST {}", url);

        let response = self
            .http
            .post(&url)
            .headers(self.caller_headers(api_key))
            .json(request)
            .send()
            .await
            .map_err(|e| ApiError::request_failed(CHAT_COMPLETIONS_PATH, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::request_failed(CHAT_COMPLETIONS_PATH, e))?;

        debug!("chat completion 返回 {}，响应体 {} 字节", status, body.len());
        parse_chat_body(status, &body)
    }

    /// 标识调用方的请求头
    fn caller_headers(&self, api_key: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", api_key.trim())) {
            headers.insert(AUTHORIZATION, value);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(value) = HeaderValue::from_str(&self.app_url) {
            headers.insert("http-referer", value);
        }
        if let Ok(value) = HeaderValue::from_str(&self.app_title) {
            headers.insert("x-title", value);
        }
        headers
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// 解析模型列表响应
fn parse_models_body(status: StatusCode, body: &str) -> Result<Vec<String>, ApiError> {
    if !status.is_success() {
        return Err(ApiError::BadStatus {
            endpoint: MODELS_PATH.to_string(),
            status: status.as_u16(),
            message: remote_error_message(body),
        });
    }

    let list: ModelList =
        serde_json::from_str(body).map_err(|e| ApiError::json_parse_failed(MODELS_PATH, e))?;
    Ok(list.data.into_iter().map(|m| m.id).collect())
}

/// 解析 chat completion 响应
///
/// 非 2xx，或者 2xx 但只有 `error` 没有 `choices` 的响应，都按错误处理，
/// 并带上远端给出的 `error.message`。
pub fn parse_chat_body(status: StatusCode, body: &str) -> Result<ChatReply, ApiError> {
    if !status.is_success() {
        return Err(ApiError::BadStatus {
            endpoint: CHAT_COMPLETIONS_PATH.to_string(),
            status: status.as_u16(),
            message: remote_error_message(body)
                .or_else(|| status.canonical_reason().map(|r| format!("API Error: {}", r))),
        });
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|e| ApiError::json_parse_failed(CHAT_COMPLETIONS_PATH, e))?;

    if value.get("choices").is_none() {
        if let Some(message) = remote_error_message(body) {
            return Err(ApiError::BadStatus {
                endpoint: CHAT_COMPLETIONS_PATH.to_string(),
                status: status.as_u16(),
                message: Some(message),
            });
        }
    }

    serde_json::from_value(value).map_err(|e| ApiError::json_parse_failed(CHAT_COMPLETIONS_PATH, e))
}

/// 提取 `{"error": {"message": ...}}` 中的错误信息
fn remote_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .map(|m| m.to_string())
}

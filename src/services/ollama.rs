//! Ollama 推理服务模块
//! 封装对本地 Ollama /api/generate 端点的调用，带有界重试

use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 短响应告警阈值（字符数）
/// 输出被截断时常见症状是响应过短，仅记录告警，不触发重试
const MIN_PLAUSIBLE_LEN: usize = 100;

/// Ollama 配置
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub url: String,
    pub model: String,
    pub max_retries: u32,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub num_predict: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434/api/generate".to_string(),
            model: "phi3:mini".to_string(),
            max_retries: 3,
            timeout_secs: 120,
            temperature: 0.7,
            num_predict: 2048,
        }
    }
}

impl OllamaConfig {
    /// 从环境变量读取配置，未设置的项使用默认值
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("OLLAMA_URL") {
            config.url = url;
        }
        if let Ok(model) = std::env::var("OLLAMA_MODEL") {
            config.model = model;
        }
        config
    }
}

/// 生成请求
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

/// 生成响应
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Ollama 客户端
#[derive(Clone)]
pub struct OllamaClient {
    config: OllamaConfig,
    http_client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            config,
            http_client,
        }
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// 推理补全，传输错误、超时、非 2xx 状态均计入重试
    /// 重试耗尽后返回终态错误，上层不再重试
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let mut last_error = String::new();

        for attempt in 1..=self.config.max_retries {
            log::info!(
                "Calling Ollama API (attempt {}/{})",
                attempt,
                self.config.max_retries
            );

            match self.try_generate(prompt).await {
                Ok(text) => {
                    log::info!("Ollama response length: {} characters", text.chars().count());
                    if text.chars().count() < MIN_PLAUSIBLE_LEN {
                        log::warn!("Response seems too short: {}", text);
                    }
                    return Ok(text);
                }
                Err(e) => {
                    log::error!("Ollama API error on attempt {}: {}", attempt, e);
                    last_error = e;
                }
            }
        }

        Err(AppError::BackendUnavailable(last_error))
    }

    async fn try_generate(&self, prompt: &str) -> std::result::Result<String, String> {
        let request = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.config.temperature,
                num_predict: self.config.num_predict,
            },
        };

        let response = self
            .http_client
            .post(&self.config.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| e.to_string())?
            .error_for_status()
            .map_err(|e| e.to_string())?
            .json::<GenerateResponse>()
            .await
            .map_err(|e| e.to_string())?;

        Ok(response.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OllamaConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.timeout_secs, 120);
        assert_eq!(config.num_predict, 2048);
        assert!(config.url.ends_with("/api/generate"));
    }

    #[test]
    fn test_request_serialization() {
        let request = GenerateRequest {
            model: "phi3:mini",
            prompt: "hello",
            stream: false,
            options: GenerateOptions {
                temperature: 0.7,
                num_predict: 2048,
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "phi3:mini");
        assert_eq!(value["stream"], false);
        assert_eq!(value["options"]["num_predict"], 2048);
    }

    #[test]
    fn test_response_tolerates_missing_field() {
        let response: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(response.response.is_empty());
    }
}

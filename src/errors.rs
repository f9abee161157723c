//! 错误类型模块
//! 统一的错误分类与 HTTP 状态码映射

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// 错误消息中原始模型输出的最大预览长度
pub const PREVIEW_LEN: usize = 200;

pub type Result<T> = std::result::Result<T, AppError>;

/// 服务级错误类型
#[derive(Debug)]
pub enum AppError {
    /// 推理后端重试耗尽，终态错误
    BackendUnavailable(String),
    /// 无法从模型输出恢复出结构化数据，附带原始输出预览
    Extraction { message: String, preview: String },
    /// 会话不存在
    NotFound(String),
    /// 请求参数非法（如题目下标越界）
    BadRequest(String),
}

impl AppError {
    /// 截断原始模型输出，避免错误消息无界增长
    pub fn extraction(message: impl Into<String>, raw: &str) -> Self {
        let preview: String = raw.chars().take(PREVIEW_LEN).collect();
        AppError::Extraction {
            message: message.into(),
            preview,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::BackendUnavailable(msg) => write!(f, "Ollama API error: {}", msg),
            AppError::Extraction { message, preview } => {
                write!(f, "{}. Response preview: {}", message, preview)
            }
            AppError::NotFound(msg) => write!(f, "{}", msg),
            AppError::BadRequest(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BackendUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Extraction { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("{}", self);
        }

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_preview_is_bounded() {
        let raw = "x".repeat(1000);
        let err = AppError::extraction("Failed to parse response as JSON", &raw);
        match err {
            AppError::Extraction { preview, .. } => assert_eq!(preview.chars().count(), PREVIEW_LEN),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_extraction_preview_multibyte_safe() {
        let raw = "题".repeat(500);
        let err = AppError::extraction("bad", &raw);
        match err {
            AppError::Extraction { preview, .. } => assert_eq!(preview.chars().count(), PREVIEW_LEN),
            _ => panic!("wrong variant"),
        }
    }
}

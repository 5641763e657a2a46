//! 核心响应处理模块

use serde::{Deserialize, Serialize};

/// 健康检查成功响应
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub timestamp: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "OK".to_string(),
            database: "connected".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// 带状态字段的错误响应（健康检查使用）
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

impl StatusResponse {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "ERROR".to_string(),
            message: message.into(),
        }
    }
}

/// 错误响应结构
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

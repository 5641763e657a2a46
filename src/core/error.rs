//! 核心错误处理模块

use std::time::Duration;

use crate::infrastructure::token::TokenError;

/// 类型擦除的底层错误（身份服务 SDK 返回此类错误）
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 计算身份缺少数据库认证所需角色时返回给调用方的固定提示
pub const PERMISSION_DENIED_MESSAGE: &str =
    "Permission denied: the caller's compute identity lacks the role needed to authenticate to the database.";

/// 核心错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 计算身份无权向数据库认证，不会自动重试
    #[error("{}", PERMISSION_DENIED_MESSAGE)]
    PermissionDenied,

    /// 生成认证令牌失败（非权限类）
    #[error("failed to generate database auth token: {0}")]
    Auth(#[source] BoxError),

    /// 建立或校验物理连接失败
    #[error("database connection failed: {0}")]
    Connection(#[source] sqlx::Error),

    /// 查询执行失败
    #[error("database query failed: {0}")]
    Query(#[source] sqlx::Error),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

impl AppError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, AppError::PermissionDenied)
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::PermissionDenied => AppError::PermissionDenied,
            TokenError::Service(source) => AppError::Auth(source),
        }
    }
}

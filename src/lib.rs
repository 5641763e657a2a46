//! # 学生记录服务
//!
//! 提供健康检查与学生记录只读列表两个 HTTP 接口。
//! 数据库使用 IAM 短期令牌认证，连接由 [`infrastructure::database::ConnectionManager`]
//! 统一获取、校验、复用与释放。

pub mod app;
pub mod core;
pub mod infrastructure;

pub use crate::app::{create_routes, AppState};
pub use crate::core::error::AppError;
pub use crate::infrastructure::config::AppConfig;
pub use crate::infrastructure::database::{ConnectionFactory, ConnectionManager, DbConnection};
pub use crate::infrastructure::token::{AuthToken, TokenError, TokenProvider, TokenRequest};

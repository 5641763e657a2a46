//! 核心层：错误类型、响应结构与中间件

pub mod error;
pub mod middleware;
pub mod model;
pub mod response;

//! 跨层共享的数据模型

use serde::{Deserialize, Serialize};

/// 学生记录
///
/// 对应 `students(id, name, email)` 表；id 列可以是 INT、INT UNSIGNED 或 BIGINT，
/// 查询时统一转换为有符号 BIGINT。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Student {
    pub id: i64,
    pub name: String,
    pub email: String,
}

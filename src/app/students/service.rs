//! 学生查询服务

use std::sync::Arc;

use super::model::Student;
use crate::core::error::AppError;
use crate::infrastructure::database::ConnectionManager;

#[derive(Clone)]
pub struct StudentService {
    db: Arc<ConnectionManager>,
}

impl StudentService {
    pub fn new(db: Arc<ConnectionManager>) -> Self {
        Self { db }
    }

    /// 读取全部学生记录，无论查询成功与否都归还连接
    pub async fn list_students(&self) -> Result<Vec<Student>, AppError> {
        let mut conn = self.db.acquire().await?;
        let result = conn.fetch_students().await;
        self.db.release(conn).await;
        result
    }
}

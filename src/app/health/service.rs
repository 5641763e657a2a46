//! 健康检查服务

use std::sync::Arc;

use crate::core::error::AppError;
use crate::infrastructure::database::ConnectionManager;

#[derive(Clone)]
pub struct HealthService {
    db: Arc<ConnectionManager>,
}

impl HealthService {
    pub fn new(db: Arc<ConnectionManager>) -> Self {
        Self { db }
    }

    /// 取得连接并完成一次往返
    pub async fn check(&self) -> Result<(), AppError> {
        let mut conn = self.db.acquire().await?;
        let result = conn.round_trip().await;
        self.db.release(conn).await;
        result
    }
}

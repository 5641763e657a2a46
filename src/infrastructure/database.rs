//! 数据库基础设施
//!
//! 数据库密码是有效期很短的 IAM 令牌，因此不使用通用连接池：
//! 空闲连接保存在一个有上限的集合中，每次复用前都做存活检查，
//! 只有在没有可用空闲连接时才申请新令牌并建立新连接。

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::config::DatabaseConfig;
use super::token::{AuthToken, TokenProvider, TokenRequest};
use crate::core::error::AppError;
use crate::core::model::Student;

/// 一个已认证的数据库会话
#[async_trait]
pub trait DbConnection: Send {
    /// 存活检查，不执行业务查询
    async fn is_live(&mut self) -> bool;

    /// 健康检查使用的最小往返
    async fn round_trip(&mut self) -> Result<(), AppError>;

    async fn fetch_students(&mut self) -> Result<Vec<Student>, AppError>;

    async fn close(self: Box<Self>) -> Result<(), AppError>;
}

/// 使用给定令牌作为密码建立物理连接
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn connect(
        &self,
        config: &DatabaseConfig,
        token: &AuthToken,
    ) -> Result<Box<dyn DbConnection>, AppError>;
}

pub struct ConnectionManager {
    config: DatabaseConfig,
    tokens: Arc<dyn TokenProvider>,
    factory: Arc<dyn ConnectionFactory>,
    idle: Mutex<Vec<Box<dyn DbConnection>>>,
    tokens_issued: AtomicUsize,
    /// drain 之后为 true，之后归还的连接直接关闭
    closed: AtomicBool,
}

impl ConnectionManager {
    pub fn new(
        config: DatabaseConfig,
        tokens: Arc<dyn TokenProvider>,
        factory: Arc<dyn ConnectionFactory>,
    ) -> Self {
        let capacity = config.max_idle_connections;
        Self {
            config,
            tokens,
            factory,
            idle: Mutex::new(Vec::with_capacity(capacity)),
            tokens_issued: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// 获取一个可用连接
    ///
    /// 优先复用存活的空闲连接（不申请新令牌）；失效的空闲连接被丢弃。
    /// 空闲集合为空时申请新令牌并建立新连接。
    pub async fn acquire(&self) -> Result<Box<dyn DbConnection>, AppError> {
        loop {
            // 先出队再释放锁，存活检查不持有锁
            let candidate = self.idle.lock().await.pop();
            let Some(mut conn) = candidate else {
                break;
            };

            if conn.is_live().await {
                debug!("Reusing idle database connection");
                return Ok(conn);
            }

            debug!("Discarding dead idle database connection");
            close_quietly(conn).await;
        }

        self.open().await
    }

    /// 归还连接，存活且未超过空闲上限时放回空闲集合，否则关闭
    pub async fn release(&self, mut conn: Box<dyn DbConnection>) {
        if self.closed.load(Ordering::Acquire) {
            debug!("Connection manager is drained, closing released connection");
            close_quietly(conn).await;
            return;
        }

        if !conn.is_live().await {
            debug!("Released connection is no longer live, closing it");
            close_quietly(conn).await;
            return;
        }

        let rejected = {
            let mut idle = self.idle.lock().await;
            // drain 在持锁时置位，这里在锁内再次确认
            if !self.closed.load(Ordering::Acquire)
                && idle.len() < self.config.max_idle_connections
            {
                idle.push(conn);
                None
            } else {
                Some(conn)
            }
        };

        if let Some(conn) = rejected {
            debug!(
                max_idle = self.config.max_idle_connections,
                "Idle pool is full, closing released connection"
            );
            close_quietly(conn).await;
        }
    }

    /// 关闭全部空闲连接，返回关闭的数量
    ///
    /// 之后归还的连接不再进入空闲集合。
    pub async fn drain(&self) -> usize {
        let drained: Vec<_> = {
            let mut idle = self.idle.lock().await;
            self.closed.store(true, Ordering::Release);
            idle.drain(..).collect()
        };
        let count = drained.len();
        for conn in drained {
            close_quietly(conn).await;
        }
        info!("Closed {} idle database connection(s)", count);
        count
    }

    pub async fn idle_count(&self) -> usize {
        self.idle.lock().await.len()
    }

    /// 累计申请过的令牌数量
    pub fn tokens_issued(&self) -> usize {
        self.tokens_issued.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    async fn open(&self) -> Result<Box<dyn DbConnection>, AppError> {
        let timeout = self.config.connect_timeout();
        let result = tokio::time::timeout(timeout, async {
            let request = TokenRequest::from_config(&self.config);
            self.tokens_issued.fetch_add(1, Ordering::Relaxed);
            let token = self.tokens.get_token(&request).await?;
            self.factory.connect(&self.config, &token).await
        })
        .await;

        match result {
            Ok(Ok(conn)) => {
                debug!(
                    host = %self.config.host,
                    user = %self.config.user,
                    "Opened new database connection"
                );
                Ok(conn)
            }
            Ok(Err(err)) => {
                warn!("Failed to open database connection: {}", err);
                Err(err)
            }
            Err(_) => {
                warn!("Opening database connection timed out after {:?}", timeout);
                Err(AppError::Timeout {
                    operation: "opening a database connection",
                    after: timeout,
                })
            }
        }
    }
}

async fn close_quietly(conn: Box<dyn DbConnection>) {
    if let Err(err) = conn.close().await {
        debug!("Ignoring error while closing database connection: {}", err);
    }
}

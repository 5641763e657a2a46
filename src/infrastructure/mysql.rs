//! 基于 sqlx 的 MySQL 连接实现

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlDatabaseError, MySqlSslMode};
use sqlx::{ConnectOptions, Connection};

use super::config::DatabaseConfig;
use super::database::{ConnectionFactory, DbConnection};
use super::token::AuthToken;
use crate::core::error::AppError;
use crate::core::model::Student;

/// ER_ACCESS_DENIED_ERROR
const MYSQL_ACCESS_DENIED: u16 = 1045;

/// id 统一转换为有符号 BIGINT，INT / INT UNSIGNED / BIGINT 列都能解码为 i64
const LIST_STUDENTS_SQL: &str =
    "SELECT CAST(id AS SIGNED) AS id, name, email FROM students ORDER BY id";

#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlConnectionFactory;

impl MySqlConnectionFactory {
    pub fn new() -> Self {
        Self
    }

    fn connect_options(config: &DatabaseConfig, token: &AuthToken) -> MySqlConnectOptions {
        // IAM 令牌必须通过明文认证插件发送，因此连接必须加密
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(token.expose())
            .database(&config.name)
            .enable_cleartext_plugin(true)
            .ssl_mode(ssl_mode_for(config));

        match &config.ssl_ca {
            Some(ca) => options.ssl_ca(ca),
            None => options,
        }
    }
}

#[async_trait]
impl ConnectionFactory for MySqlConnectionFactory {
    async fn connect(
        &self,
        config: &DatabaseConfig,
        token: &AuthToken,
    ) -> Result<Box<dyn DbConnection>, AppError> {
        let conn = Self::connect_options(config, token)
            .connect()
            .await
            .map_err(classify_connect_error)?;
        Ok(Box::new(MySqlSession { conn }))
    }
}

/// 配置了 CA 时校验服务端证书，否则只要求加密
fn ssl_mode_for(config: &DatabaseConfig) -> MySqlSslMode {
    if config.ssl_ca.is_some() {
        MySqlSslMode::VerifyCa
    } else {
        MySqlSslMode::Required
    }
}

fn is_access_denied(number: u16) -> bool {
    number == MYSQL_ACCESS_DENIED
}

fn classify_connect_error(err: sqlx::Error) -> AppError {
    let access_denied = err
        .as_database_error()
        .and_then(|db| db.try_downcast_ref::<MySqlDatabaseError>())
        .map(|db| is_access_denied(db.number()))
        .unwrap_or(false);

    if access_denied {
        AppError::PermissionDenied
    } else {
        AppError::Connection(err)
    }
}

pub struct MySqlSession {
    conn: MySqlConnection,
}

#[async_trait]
impl DbConnection for MySqlSession {
    async fn is_live(&mut self) -> bool {
        self.conn.ping().await.is_ok()
    }

    async fn round_trip(&mut self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&mut self.conn)
            .await
            .map_err(AppError::Query)?;
        Ok(())
    }

    async fn fetch_students(&mut self) -> Result<Vec<Student>, AppError> {
        sqlx::query_as::<_, Student>(LIST_STUDENTS_SQL)
            .fetch_all(&mut self.conn)
            .await
            .map_err(AppError::Query)
    }

    async fn close(self: Box<Self>) -> Result<(), AppError> {
        self.conn.close().await.map_err(AppError::Connection)
    }
}

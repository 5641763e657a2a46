//! 配置基础设施
//!
//! 所有配置在进程启动时从环境变量读取一次，之后不可变。

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// 服务配置结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP 服务配置
    pub server: ServerConfig,
    /// 数据库连接配置
    pub database: DatabaseConfig,
    /// 日志配置
    pub logging: LoggingConfig,
}

/// HTTP 服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 绑定地址
    pub bind_address: String,
    /// 监听端口
    pub port: u16,
    /// 单个请求超时时间（秒）
    pub request_timeout_secs: u64,
    /// 收到停止信号后等待在途请求完成的时间（秒）
    pub shutdown_timeout_secs: u64,
}

/// 数据库连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    /// IAM 认证使用的数据库用户
    pub user: String,
    pub region: String,
    /// 空闲连接上限
    pub max_idle_connections: usize,
    /// 获取令牌 + 建立连接的总超时（秒）
    pub connect_timeout_secs: u64,
    /// RDS CA 证书路径，设置后校验服务端证书
    pub ssl_ca: Option<PathBuf>,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别 (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 5005,
            request_timeout_secs: 30,
            shutdown_timeout_secs: 10,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 3306,
            name: String::new(),
            user: String::new(),
            region: String::new(),
            max_idle_connections: 5,
            connect_timeout_secs: 10,
            ssl_ca: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                var: "BIND_ADDRESS".to_string(),
                value: self.bind_address.clone(),
                expected: "an IP address".to_string(),
            })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl DatabaseConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {var}: expected {expected}")]
    InvalidValue {
        var: String,
        value: String,
        expected: String,
    },
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl AppConfig {
    /// 从进程环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 通过任意键查找函数加载配置，空字符串视为未设置
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let server_defaults = ServerConfig::default();
        let db_defaults = DatabaseConfig::default();

        let server = ServerConfig {
            bind_address: get("BIND_ADDRESS").unwrap_or(server_defaults.bind_address),
            port: parse_or("PORT", get("PORT"), server_defaults.port, "a TCP port")?,
            request_timeout_secs: parse_or(
                "REQUEST_TIMEOUT_SECS",
                get("REQUEST_TIMEOUT_SECS"),
                server_defaults.request_timeout_secs,
                "a number of seconds",
            )?,
            shutdown_timeout_secs: parse_or(
                "SHUTDOWN_TIMEOUT_SECS",
                get("SHUTDOWN_TIMEOUT_SECS"),
                server_defaults.shutdown_timeout_secs,
                "a number of seconds",
            )?,
        };

        let database = DatabaseConfig {
            host: get("DB_HOST").ok_or(ConfigError::Missing("DB_HOST"))?,
            port: parse_or("DB_PORT", get("DB_PORT"), db_defaults.port, "a TCP port")?,
            name: get("DB_NAME").ok_or(ConfigError::Missing("DB_NAME"))?,
            user: get("DB_USER").ok_or(ConfigError::Missing("DB_USER"))?,
            region: get("AWS_REGION")
                .or_else(|| get("AWS_DEFAULT_REGION"))
                .ok_or(ConfigError::Missing("AWS_REGION"))?,
            max_idle_connections: parse_or(
                "DB_MAX_IDLE_CONNECTIONS",
                get("DB_MAX_IDLE_CONNECTIONS"),
                db_defaults.max_idle_connections,
                "a non-negative integer",
            )?,
            connect_timeout_secs: parse_or(
                "DB_CONNECT_TIMEOUT_SECS",
                get("DB_CONNECT_TIMEOUT_SECS"),
                db_defaults.connect_timeout_secs,
                "a number of seconds",
            )?,
            ssl_ca: get("DB_SSL_CA").map(PathBuf::from),
        };

        let logging = LoggingConfig {
            level: get("LOG_LEVEL")
                .map(|l| l.to_lowercase())
                .unwrap_or_else(|| LoggingConfig::default().level),
        };

        let config = AppConfig {
            server,
            database,
            logging,
        };
        config.validate()?;
        Ok(config)
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("PORT must be greater than 0".to_string()));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "REQUEST_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }
        if self.database.port == 0 {
            return Err(ConfigError::Validation("DB_PORT must be greater than 0".to_string()));
        }
        if self.database.connect_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "DB_CONNECT_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::InvalidValue {
                var: "LOG_LEVEL".to_string(),
                value: self.logging.level.clone(),
                expected: format!("one of {:?}", valid_levels),
            });
        }

        Ok(())
    }

    /// 启动时打印生效配置（不含任何凭据）
    pub fn log_summary(&self) {
        info!(
            "Database target: {}@{}:{}/{} (region {}, max idle {}, connect timeout {}s, tls {})",
            self.database.user,
            self.database.host,
            self.database.port,
            self.database.name,
            self.database.region,
            self.database.max_idle_connections,
            self.database.connect_timeout_secs,
            if self.database.ssl_ca.is_some() { "verify-ca" } else { "required" },
        );
        info!(
            "HTTP server: {}:{} (request timeout {}s)",
            self.server.bind_address, self.server.port, self.server.request_timeout_secs
        );
    }
}

fn parse_or<T: std::str::FromStr>(
    var: &str,
    raw: Option<String>,
    default: T,
    expected: &str,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            var: var.to_string(),
            value,
            expected: expected.to_string(),
        }),
    }
}

//! 数据库认证令牌
//!
//! 每次建立新连接前都向身份服务申请一个短期令牌（约 15 分钟有效），
//! 令牌只作为本次连接的密码使用，不缓存、不持久化、不写日志。

use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_credential_types::provider::error::CredentialsError;
use aws_sdk_rds::auth_token::{AuthTokenGenerator, Config as AuthTokenConfig};
use aws_sdk_rds::config::Region;
use std::error::Error as StdError;
use std::fmt;
use tracing::debug;

use super::config::DatabaseConfig;
use crate::core::error::{BoxError, PERMISSION_DENIED_MESSAGE};

/// 身份服务只以文本形式暴露时，用于识别权限类失败的信号
const PERMISSION_SIGNALS: [&str; 5] = [
    "access denied",
    "accessdenied",
    "credentials",
    "permission",
    "not authorized",
];

/// 令牌作用域
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    pub host: String,
    pub port: u16,
    pub principal: String,
    pub region: String,
}

impl TokenRequest {
    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            principal: config.user.clone(),
            region: config.region.clone(),
        }
    }
}

/// 短期数据库认证令牌
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// 令牌明文，仅用于作为连接密码
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("{}", PERMISSION_DENIED_MESSAGE)]
    PermissionDenied,
    #[error("{0}")]
    Service(#[source] BoxError),
}

impl TokenError {
    /// 将身份服务返回的错误归类为权限失败或一般认证失败
    ///
    /// 优先按 SDK 的凭据错误类型判断；只有类型无法识别时才检查错误链文本。
    pub fn classify(err: BoxError) -> Self {
        if is_permission_failure(err.as_ref()) {
            TokenError::PermissionDenied
        } else {
            TokenError::Service(err)
        }
    }
}

fn is_permission_failure(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(credentials) = e.downcast_ref::<CredentialsError>() {
            return matches!(
                credentials,
                CredentialsError::CredentialsNotLoaded(_) | CredentialsError::ProviderError(_)
            );
        }
        let text = e.to_string().to_lowercase();
        if PERMISSION_SIGNALS.iter().any(|signal| text.contains(signal)) {
            return true;
        }
        current = e.source();
    }
    false
}

/// 令牌提供者
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn get_token(&self, request: &TokenRequest) -> Result<AuthToken, TokenError>;
}

/// 基于 RDS IAM 认证签名的令牌提供者
pub struct RdsTokenProvider {
    sdk_config: SdkConfig,
}

impl RdsTokenProvider {
    pub fn new(sdk_config: SdkConfig) -> Self {
        Self { sdk_config }
    }

    /// 使用默认凭据链加载 SDK 配置
    pub async fn load(region: &str) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        Self::new(sdk_config)
    }
}

#[async_trait]
impl TokenProvider for RdsTokenProvider {
    async fn get_token(&self, request: &TokenRequest) -> Result<AuthToken, TokenError> {
        let config = AuthTokenConfig::builder()
            .hostname(request.host.clone())
            .port(request.port.into())
            .username(request.principal.clone())
            .region(Region::new(request.region.clone()))
            .build()
            .map_err(|e| TokenError::Service(e.into()))?;

        let token = AuthTokenGenerator::new(config)
            .auth_token(&self.sdk_config)
            .await
            .map_err(|e| TokenError::classify(e.into()))?;

        debug!(
            host = %request.host,
            user = %request.principal,
            "Generated database auth token"
        );
        Ok(AuthToken::new(token.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn boxed(msg: &str) -> BoxError {
        Box::new(io::Error::new(io::ErrorKind::Other, msg.to_string()))
    }

    #[test]
    fn test_classify_text_signals() {
        for msg in [
            "AccessDenied: User is not allowed to call rds-db:connect",
            "Access denied for user 'app'@'10.0.0.1'",
            "Could not load credentials from any providers",
            "missing permission on instance profile",
        ] {
            assert!(
                matches!(TokenError::classify(boxed(msg)), TokenError::PermissionDenied),
                "{msg}"
            );
        }
    }

    #[test]
    fn test_classify_other_errors_unchanged() {
        let err = TokenError::classify(boxed("dns error: failed to lookup address"));
        match err {
            TokenError::Service(source) => {
                assert_eq!(source.to_string(), "dns error: failed to lookup address")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_classify_structured_credentials_error() {
        let err = TokenError::classify(Box::new(CredentialsError::not_loaded("no profile")));
        assert!(matches!(err, TokenError::PermissionDenied));

        // 超时属于传输失败，即使文本中包含 "credentials"
        let err = TokenError::classify(Box::new(CredentialsError::provider_timed_out(
            std::time::Duration::from_secs(5),
        )));
        assert!(matches!(err, TokenError::Service(_)));
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = AuthToken::new("host:3306/?Action=connect&X-Amz-Signature=abc");
        assert_eq!(format!("{token:?}"), "AuthToken(<redacted>)");
        assert!(token.expose().contains("X-Amz-Signature"));
    }

    #[test]
    fn test_request_from_config() {
        let config = DatabaseConfig {
            host: "db.example".to_string(),
            user: "iam_user".to_string(),
            region: "us-west-2".to_string(),
            ..DatabaseConfig::default()
        };
        let request = TokenRequest::from_config(&config);
        assert_eq!(request.port, 3306);
        assert_eq!(request.principal, "iam_user");
        assert_eq!(request.region, "us-west-2");
    }
}

//! 健康检查处理器

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use tracing::{error, warn};

use crate::app::AppState;
use crate::core::error::AppError;
use crate::core::response::{HealthResponse, StatusResponse};

/// 健康检查接口的错误响应，500 时带上失败原因
#[derive(Debug)]
pub struct HealthError(pub AppError);

impl From<AppError> for HealthError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for HealthError {
    fn into_response(self) -> Response {
        let (status, body) = if self.0.is_permission_denied() {
            warn!("Health check rejected: {}", self.0);
            (StatusCode::FORBIDDEN, StatusResponse::error(self.0.to_string()))
        } else {
            error!("Health check failed: {}", self.0);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                StatusResponse::error(format!("Health check failed: {}", self.0)),
            )
        };

        (status, Json(body)).into_response()
    }
}

pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, HealthError> {
    state.health_service.check().await?;
    Ok(Json(HealthResponse::ok()))
}

//! 学生列表处理器

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use tracing::{error, warn};

use super::model::Student;
use crate::app::AppState;
use crate::core::error::{AppError, PERMISSION_DENIED_MESSAGE};
use crate::core::response::ErrorResponse;

/// 不向调用方暴露驱动错误原文
pub const LIST_FAILED_MESSAGE: &str = "Failed to retrieve student data.";

/// 学生列表接口的错误响应
#[derive(Debug)]
pub struct StudentsError(pub AppError);

impl From<AppError> for StudentsError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for StudentsError {
    fn into_response(self) -> Response {
        let (status, message) = if self.0.is_permission_denied() {
            warn!("Student listing rejected: {}", self.0);
            (StatusCode::FORBIDDEN, PERMISSION_DENIED_MESSAGE)
        } else {
            error!("Student listing failed: {}", self.0);
            (StatusCode::INTERNAL_SERVER_ERROR, LIST_FAILED_MESSAGE)
        };

        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

pub async fn list_students(
    State(state): State<AppState>,
) -> Result<Json<Vec<Student>>, StudentsError> {
    let students = state.student_service.list_students().await?;
    Ok(Json(students))
}

//! 应用层：路由与共享状态

pub mod health;
pub mod students;

use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::core::middleware::request_logging_middleware;
use crate::infrastructure::database::ConnectionManager;
use health::service::HealthService;
use students::service::StudentService;

#[derive(Clone)]
pub struct AppState {
    pub health_service: HealthService,
    pub student_service: StudentService,
}

impl AppState {
    pub fn new(db: Arc<ConnectionManager>) -> Self {
        Self {
            health_service: HealthService::new(db.clone()),
            student_service: StudentService::new(db),
        }
    }
}

/// 创建路由
pub fn create_routes(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(health::handler::health_check))
        .route("/students", get(students::handler::list_students))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(request_logging_middleware))
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .with_state(state)
}

//! 测试用的令牌提供者与数据库替身
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use student_api::app::students::model::Student;
use student_api::infrastructure::config::DatabaseConfig;
use student_api::{
    AppError, AuthToken, ConnectionFactory, ConnectionManager, DbConnection, TokenError,
    TokenProvider, TokenRequest,
};

/// 计数并可注入失败的令牌提供者
#[derive(Default)]
pub struct FakeTokenProvider {
    calls: AtomicUsize,
    failure: Mutex<Option<String>>,
}

impl FakeTokenProvider {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 之后的每次调用都以给定文本的底层错误失败
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }
}

#[async_trait]
impl TokenProvider for FakeTokenProvider {
    async fn get_token(&self, request: &TokenRequest) -> Result<AuthToken, TokenError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let failure = self.failure.lock().unwrap().clone();
        if let Some(message) = failure {
            let source = io::Error::new(io::ErrorKind::Other, message);
            return Err(TokenError::classify(Box::new(source)));
        }
        Ok(AuthToken::new(format!(
            "{}:{}/?Action=connect&DBUser={}&X-Amz-Signature=sig{}",
            request.host, request.port, request.principal, n
        )))
    }
}

pub enum ConnectFailure {
    AccessDenied,
    Refused,
}

/// 模拟的数据库服务端
#[derive(Default)]
pub struct FakeDatabase {
    students: Mutex<Vec<Student>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
    dead: Mutex<HashSet<usize>>,
    connect_failure: Mutex<Option<ConnectFailure>>,
    connect_delay: Mutex<Option<Duration>>,
    query_failure: AtomicBool,
    last_password: Mutex<Option<String>>,
}

impl FakeDatabase {
    pub fn seed(&self, students: Vec<Student>) {
        *self.students.lock().unwrap() = students;
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// 让目前所有已建立的连接失效（模拟令牌过期或服务端断开）
    pub fn kill_all(&self) {
        let opened = self.opened();
        self.dead.lock().unwrap().extend(0..opened);
    }

    pub fn fail_connects(&self, failure: ConnectFailure) {
        *self.connect_failure.lock().unwrap() = Some(failure);
    }

    pub fn delay_connects(&self, delay: Duration) {
        *self.connect_delay.lock().unwrap() = Some(delay);
    }

    pub fn fail_queries(&self) {
        self.query_failure.store(true, Ordering::SeqCst);
    }

    pub fn last_password(&self) -> Option<String> {
        self.last_password.lock().unwrap().clone()
    }

    fn is_dead(&self, id: usize) -> bool {
        self.dead.lock().unwrap().contains(&id)
    }
}

pub struct FakeConnection {
    id: usize,
    db: Arc<FakeDatabase>,
}

#[async_trait]
impl DbConnection for FakeConnection {
    async fn is_live(&mut self) -> bool {
        !self.db.is_dead(self.id)
    }

    async fn round_trip(&mut self) -> Result<(), AppError> {
        if self.db.is_dead(self.id) {
            return Err(AppError::Query(sqlx::Error::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "MySQL server has gone away",
            ))));
        }
        Ok(())
    }

    async fn fetch_students(&mut self) -> Result<Vec<Student>, AppError> {
        if self.db.query_failure.load(Ordering::SeqCst) {
            return Err(AppError::Query(sqlx::Error::Protocol(
                "Table 'school.students' doesn't exist".to_string(),
            )));
        }
        Ok(self.db.students.lock().unwrap().clone())
    }

    async fn close(self: Box<Self>) -> Result<(), AppError> {
        self.db.closed.fetch_add(1, Ordering::SeqCst);
        if self.db.is_dead(self.id) {
            return Err(AppError::Connection(sqlx::Error::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "broken pipe",
            ))));
        }
        Ok(())
    }
}

pub struct FakeFactory {
    db: Arc<FakeDatabase>,
}

#[async_trait]
impl ConnectionFactory for FakeFactory {
    async fn connect(
        &self,
        _config: &DatabaseConfig,
        token: &AuthToken,
    ) -> Result<Box<dyn DbConnection>, AppError> {
        let delay = *self.db.connect_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        *self.db.last_password.lock().unwrap() = Some(token.expose().to_string());

        let failure = match &*self.db.connect_failure.lock().unwrap() {
            Some(ConnectFailure::AccessDenied) => Some(AppError::PermissionDenied),
            Some(ConnectFailure::Refused) => Some(AppError::Connection(sqlx::Error::Io(
                io::Error::new(io::ErrorKind::ConnectionRefused, "Connection refused (os error 111)"),
            ))),
            None => None,
        };
        if let Some(err) = failure {
            return Err(err);
        }

        let id = self.db.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeConnection {
            id,
            db: self.db.clone(),
        }))
    }
}

pub struct Harness {
    pub manager: Arc<ConnectionManager>,
    pub tokens: Arc<FakeTokenProvider>,
    pub db: Arc<FakeDatabase>,
}

pub fn database_config(max_idle: usize) -> DatabaseConfig {
    DatabaseConfig {
        host: "students.cluster-test.us-east-1.rds.amazonaws.com".to_string(),
        name: "school".to_string(),
        user: "app_iam".to_string(),
        region: "us-east-1".to_string(),
        max_idle_connections: max_idle,
        connect_timeout_secs: 1,
        ..DatabaseConfig::default()
    }
}

pub fn harness(max_idle: usize) -> Harness {
    let tokens = Arc::new(FakeTokenProvider::default());
    let db = Arc::new(FakeDatabase::default());
    let factory = Arc::new(FakeFactory { db: db.clone() });
    let manager = Arc::new(ConnectionManager::new(
        database_config(max_idle),
        tokens.clone(),
        factory,
    ));
    Harness {
        manager,
        tokens,
        db,
    }
}

pub fn seeded_students() -> Vec<Student> {
    [
        (1, "Alice Johnson", "alice@example.com"),
        (2, "Bob Smith", "bob@example.com"),
        (3, "Charlie Brown", "charlie@example.com"),
        (4, "Diana Prince", "diana@example.com"),
        (5, "Eve Wilson", "eve@example.com"),
    ]
    .into_iter()
    .map(|(id, name, email)| Student {
        id,
        name: name.to_string(),
        email: email.to_string(),
    })
    .collect()
}

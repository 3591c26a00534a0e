//! 데이터 모듈 오류 타입.

use thiserror::Error;

/// 데이터 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 잘못된 설정 (생성 시점에 즉시 실패)
    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    /// Rate governor 소비자 태스크가 종료됨
    #[error("Rate governor is closed")]
    GovernorClosed,

    /// Governor를 통해 실행된 작업이 panic으로 종료됨
    #[error("Admitted task panicked")]
    TaskPanicked,

    /// HTTP 전송 오류
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider가 실패 코드를 반환함
    #[error("Provider error [{code}]: {message}")]
    Provider { code: i64, message: String },

    /// 응답 디코딩 오류 (잘못된 envelope, 값 형식 오류)
    #[error("Decode error: {0}")]
    Decode(String),

    /// 응답 필드가 선언된 스키마와 맞지 않음
    #[error("Schema mismatch for {table}: {reason}")]
    SchemaMismatch { table: &'static str, reason: String },

    /// 데이터베이스 연결 오류
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// 쿼리 실행 오류
    #[error("Query error: {0}")]
    QueryError(String),

    /// 데이터 쓰기 오류 (트랜잭션 롤백됨)
    #[error("Write error: {0}")]
    WriteError(String),

    /// 연결 풀 소진
    #[error("Connection pool exhausted")]
    PoolExhausted,
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => DataError::PoolExhausted,
            sqlx::Error::Io(e) => DataError::ConnectionError(e.to_string()),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().unwrap_or_default();
                // 23xxx: PostgreSQL 무결성 제약 조건 위반
                if code.starts_with("23") {
                    DataError::WriteError(db_err.message().to_string())
                } else {
                    DataError::QueryError(db_err.message().to_string())
                }
            }
            _ => DataError::QueryError(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for DataError {
    fn from(err: reqwest::Error) -> Self {
        DataError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DataError>;

//! 환경변수 기반 설정 모듈.

use crate::error::CollectorError;
use crate::Result;
use std::time::Duration;
use tushare_data::provider::DEFAULT_API_URL;
use tushare_data::{DatabaseConfig, RateLimitConfig, DEFAULT_UPSERT_CHUNK_SIZE};

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 데이터베이스 설정
    pub database: DatabaseConfig,
    /// Tushare Pro 설정
    pub tushare: TushareConfig,
    /// 동기화 설정
    pub sync: SyncConfig,
    /// 데몬 모드 설정
    pub daemon: DaemonConfig,
}

/// Tushare Pro 접속 설정
#[derive(Clone)]
pub struct TushareConfig {
    /// API 토큰
    pub token: String,
    /// API 엔드포인트
    pub api_url: String,
    /// HTTP 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// 구간당 최대 호출 수
    pub rate_limit_capacity: u32,
    /// 호출 한도 구간 (초)
    pub rate_limit_interval_secs: u64,
}

// 토큰은 로그에 남기지 않음
impl std::fmt::Debug for TushareConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TushareConfig")
            .field("token", &"***")
            .field("api_url", &self.api_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("rate_limit_capacity", &self.rate_limit_capacity)
            .field("rate_limit_interval_secs", &self.rate_limit_interval_secs)
            .finish()
    }
}

/// 동기화 설정
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// 그룹당 동시 작업 수
    pub parallelism: usize,
    /// upsert 청크 크기 (행)
    pub upsert_chunk_size: usize,
}

/// 데몬 모드 설정
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// 워크플로우 실행 주기 (분 단위)
    pub interval_minutes: u64,
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = required_var("DATABASE_URL")?;
        let token = required_var("TUSHARE_TOKEN")?;

        let mut database = DatabaseConfig::new(database_url);
        database.schema = std::env::var("DATABASE_SCHEMA")
            .ok()
            .filter(|s| !s.is_empty());
        database.max_connections = env_var_parse("DB_MAX_CONNECTIONS", database.max_connections);

        Ok(Self {
            database,
            tushare: TushareConfig {
                token,
                api_url: std::env::var("TUSHARE_API_URL")
                    .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
                timeout_secs: env_var_parse("HTTP_TIMEOUT_SECS", 30),
                rate_limit_capacity: env_var_parse("RATE_LIMIT_CAPACITY", 200),
                rate_limit_interval_secs: env_var_parse("RATE_LIMIT_INTERVAL_SECS", 60),
            },
            sync: SyncConfig {
                parallelism: env_var_parse("SYNC_PARALLELISM", 2),
                upsert_chunk_size: env_var_parse("UPSERT_CHUNK_SIZE", DEFAULT_UPSERT_CHUNK_SIZE),
            },
            daemon: DaemonConfig {
                interval_minutes: env_var_parse("DAEMON_INTERVAL_MINUTES", 60),
            },
        })
    }
}

impl TushareConfig {
    /// HTTP 요청 타임아웃을 Duration으로 반환
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Rate governor 설정
    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig::new(
            self.rate_limit_capacity,
            Duration::from_secs(self.rate_limit_interval_secs),
        )
    }
}

impl DaemonConfig {
    /// 워크플로우 실행 주기를 Duration으로 반환
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }
}

fn required_var(key: &str) -> Result<String> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CollectorError::Config(format!("{} 환경변수가 설정되지 않았습니다", key)))
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용)
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

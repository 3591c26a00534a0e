//! Tushare 시장 데이터 접근 및 저장.
//!
//! 이 crate는 다음을 제공합니다:
//! - 요청 속도 제한 (`RateGovernor`, 토큰 버킷 + FIFO 큐)
//! - Tushare Pro 클라이언트 (`TushareClient`)
//! - 스키마 기반 레코드 디코딩 (`RecordBatch`)
//! - PostgreSQL 저장소 및 트랜잭션 배치 upsert

pub mod error;
pub mod model;
pub mod provider;
pub mod rate_limit;
pub mod record;
pub mod schema;
pub mod storage;

pub use error::{DataError, Result};
pub use model::{Dataset, Instrument, ListStatus};
pub use rate_limit::{RateGovernor, RateLimitConfig, TokenBucket};
pub use record::{format_ts_date, parse_ts_date, FieldValue, Record, RecordBatch};
pub use schema::{ColumnDef, ColumnKind, TableSchema, ADJ_FACTOR, DAILY, STOCK_BASIC, TRADE_CAL};

// Provider 재내보내기
pub use provider::{HttpTransport, MarketDataSource, ProviderTransport, SeriesQuery, TushareClient};

// 저장소 재내보내기
pub use storage::{
    BatchUpsertWriter, Database, DatabaseConfig, PgSyncStore, SyncStore,
    DEFAULT_UPSERT_CHUNK_SIZE,
};
